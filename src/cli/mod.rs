//! Support code for the `gym` command-line client: argument parsing, logging setup,
//! command execution against a `SessionManager`, and result rendering.

mod args;
mod commands;
mod output;

pub use args::{parse_args, usage, CliArgs, Command, ParseOutcome};
pub use commands::run_command;
pub use output::{render_table, render_table_width, render_value};

use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins; otherwise `fallback`, or `debug` when verbose.
pub fn init_logging(fallback: &str, verbose: bool) {
    let wanted = if verbose { "debug" } else { fallback };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(wanted))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}
