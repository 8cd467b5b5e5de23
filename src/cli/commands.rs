use anyhow::{anyhow, Context, Result};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use super::args::Command;
use super::output::render_value;
use crate::api::ApiRequest;
use crate::session::SessionManager;

/// Run one command against an already bootstrapped session and return the text to print.
pub async fn run_command(session: &SessionManager, command: &Command, force_json: bool) -> Result<String> {
    match command {
        Command::Login { username, password } => {
            let user = session
                .login(username, password)
                .await
                .map_err(|e| anyhow!(session.auth_error().unwrap_or_else(|| e.to_string())))?;
            Ok(format!("signed in as {} ({})", user.username, user.role))
        }
        Command::Logout => {
            let had = session.is_authenticated() || session.stored_tokens().is_some();
            session.logout().await;
            Ok(if had { "signed out".to_string() } else { "no active session".to_string() })
        }
        Command::WhoAmI => {
            let user = session.current_user().ok_or_else(|| anyhow!("not signed in"))?;
            Ok(render_value(&serde_json::to_value(&user)?, true))
        }
        Command::Status => Ok(status_text(session)),
        Command::Refresh => {
            let stored = session.stored_tokens().ok_or_else(|| anyhow!("no stored session to refresh"))?;
            if session.refresh(&stored.refresh).await {
                Ok("access token refreshed".to_string())
            } else {
                Err(anyhow!("refresh failed; session cleared"))
            }
        }
        Command::Register { username, email, password } => {
            let created = session
                .register(&json!({"username": username, "email": email, "password": password}))
                .await
                .map_err(|e| anyhow!(session.auth_error().unwrap_or_else(|| e.to_string())))?;
            let name = created.get("username").and_then(Value::as_str).unwrap_or(username);
            Ok(format!("registered {}; run `login` to sign in", name))
        }
        Command::Courses => list(session.gym().courses(&[]).await, force_json),
        Command::Schedules => list(session.gym().course_schedules(&[]).await, force_json),
        Command::Plans => list(session.gym().membership_plans().await, force_json),
        Command::Orders => list(session.gym().orders(&[]).await, force_json),
        Command::Get { path } => {
            let body = session
                .authorized()
                .request(ApiRequest::get(path.as_str()), "Request failed.")
                .await
                .with_context(|| format!("GET {}", path))?;
            Ok(render_value(&body, force_json))
        }
    }
}

fn list(result: crate::error::AppResult<Value>, force_json: bool) -> Result<String> {
    let body = result?;
    Ok(render_value(&body, force_json))
}

fn status_text(session: &SessionManager) -> String {
    let state = session.snapshot();
    let mut lines = vec![format!("phase: {:?}", state.phase())];
    if let Some(u) = &state.current_user {
        lines.push(format!("user: {} (id {}, role {})", u.username, u.id, u.role));
    }
    if let Some(t) = &state.tokens {
        match t.access_claims() {
            Ok(c) => {
                let when = Utc
                    .timestamp_opt(c.exp, 0)
                    .single()
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|| c.exp.to_string());
                lines.push(format!("access expires: {} ({}s left)", when, c.seconds_left(session.now())));
            }
            Err(e) => lines.push(format!("access token unreadable: {}", e)),
        }
    }
    if let Some(err) = &state.auth_error {
        lines.push(format!("last error: {}", err));
    }
    lines.join("\n")
}
