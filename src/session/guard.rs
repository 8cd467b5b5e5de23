//! Route guards: decide whether a protected page may render for the current session.

use super::state::SessionState;

pub const LOGIN_PATH: &str = "/login";
pub const ADMIN_LOGIN_PATH: &str = "/admin/login";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Bootstrap or an auth call is in flight; show a placeholder.
    Loading,
    Allow,
    Redirect(&'static str),
}

pub fn private_route(state: &SessionState) -> GuardDecision {
    if state.is_loading {
        return GuardDecision::Loading;
    }
    if !state.is_authenticated {
        return GuardDecision::Redirect(LOGIN_PATH);
    }
    GuardDecision::Allow
}

pub fn admin_route(state: &SessionState) -> GuardDecision {
    if state.is_loading {
        return GuardDecision::Loading;
    }
    if !state.is_authenticated {
        return GuardDecision::Redirect(ADMIN_LOGIN_PATH);
    }
    match &state.current_user {
        Some(u) if u.is_admin() => GuardDecision::Allow,
        _ => GuardDecision::Redirect(HOME_PATH),
    }
}
