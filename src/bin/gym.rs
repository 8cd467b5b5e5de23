//!
//! gym CLI binary
//! --------------
//! Command-line client for the gym REST API. Every run restores the persisted
//! session first (expired access tokens are refreshed), then executes one command.

use std::env;

use anyhow::{Context, Result};
use tracing::{info, warn};

use gymsession::cli::{init_logging, parse_args, run_command, usage, ParseOutcome};
use gymsession::config::ClientConfig;
use gymsession::session::SessionManager;

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let cli = match parse_args(&args) {
        Ok(ParseOutcome::Run(a)) => a,
        Ok(ParseOutcome::Help) => {
            println!("{}", usage(&program));
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!("{}", usage(&program));
            std::process::exit(2);
        }
    };

    let mut cfg = match &cli.config {
        Some(p) => ClientConfig::from_file(p).with_context(|| format!("failed to load config {}", p.display()))?,
        None => ClientConfig::from_env(),
    };
    if let Some(api) = &cli.api { cfg.api_base = api.clone(); }
    if let Some(tf) = &cli.token_file { cfg.token_file = Some(tf.clone()); }
    if cfg.token_file.is_none() {
        cfg.token_file = ClientConfig::default_token_file();
    }

    init_logging(&cfg.log_filter, cli.verbose);
    if cfg.token_file.is_none() {
        warn!(target: "gym", "no HOME or XDG_CONFIG_HOME; the session will not outlive this run");
    }
    info!(target: "gym", "gym starting: api_base='{}', token_file={:?}", cfg.api_base, cfg.token_file);

    let session = SessionManager::from_config(&cfg).context("invalid client configuration")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    rt.block_on(async {
        session.bootstrap().await;
        let out = run_command(&session, &cli.command, cli.json).await?;
        println!("{}", out);
        Ok::<(), anyhow::Error>(())
    })
}
