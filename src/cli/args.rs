use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Logout,
    WhoAmI,
    Status,
    Refresh,
    Register { username: String, email: String, password: String },
    Courses,
    Schedules,
    Plans,
    Orders,
    Get { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub api: Option<String>,
    pub token_file: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub verbose: bool,
    pub json: bool,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Run(CliArgs),
    Help,
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} [--api <url>] [--token-file <path>] [--config <file>] [--json] [-v] <command> [args]\n\n\
         Commands:\n  login <username> <password>            sign in and persist the session\n  \
         logout                                 revoke and forget the stored session\n  \
         whoami                                 show the signed-in user\n  \
         status                                 show session state and token expiry\n  \
         refresh                                exchange the refresh token for a new access token\n  \
         register <username> <email> <password> create an account (does not sign in)\n  \
         courses | schedules | plans | orders   list resources\n  \
         get <path>                             GET any API path with the session's token\n\n\
         Environment:\n  GYM_API_BASE, GYM_TOKEN_FILE, GYM_STORAGE_KEY, GYM_LOG, RUST_LOG"
    )
}

fn take_value(args: &[String], i: usize, flag: &str) -> Result<String, String> {
    args.get(i + 1).cloned().ok_or_else(|| format!("{} requires a value", flag))
}

pub fn parse_args(args: &[String]) -> Result<ParseOutcome, String> {
    let mut api = None;
    let mut token_file = None;
    let mut config = None;
    let mut verbose = false;
    let mut json = false;
    let mut rest: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api" => { api = Some(take_value(args, i, "--api")?); i += 2; continue; }
            "--token-file" => { token_file = Some(PathBuf::from(take_value(args, i, "--token-file")?)); i += 2; continue; }
            "--config" => { config = Some(PathBuf::from(take_value(args, i, "--config")?)); i += 2; continue; }
            "--json" => { json = true; i += 1; continue; }
            "-v" | "--verbose" => { verbose = true; i += 1; continue; }
            "-h" | "--help" => return Ok(ParseOutcome::Help),
            other => { rest.push(other.to_string()); i += 1; }
        }
    }

    let Some((name, params)) = rest.split_first() else {
        return Err("missing command".to_string());
    };
    let want = |n: usize| -> Result<(), String> {
        if params.len() == n { Ok(()) } else { Err(format!("{} expects {} argument(s), got {}", name, n, params.len())) }
    };
    let command = match name.as_str() {
        "login" => { want(2)?; Command::Login { username: params[0].clone(), password: params[1].clone() } }
        "logout" => { want(0)?; Command::Logout }
        "whoami" => { want(0)?; Command::WhoAmI }
        "status" => { want(0)?; Command::Status }
        "refresh" => { want(0)?; Command::Refresh }
        "register" => {
            want(3)?;
            Command::Register { username: params[0].clone(), email: params[1].clone(), password: params[2].clone() }
        }
        "courses" => { want(0)?; Command::Courses }
        "schedules" => { want(0)?; Command::Schedules }
        "plans" => { want(0)?; Command::Plans }
        "orders" => { want(0)?; Command::Orders }
        "get" => { want(1)?; Command::Get { path: params[0].clone() } }
        unk => return Err(format!("unknown command: {}", unk)),
    };
    Ok(ParseOutcome::Run(CliArgs { api, token_file, config, verbose, json, command }))
}
