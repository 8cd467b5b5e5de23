use serde::Serialize;

use super::tokens::TokenPair;
use super::user::User;

/// Coarse lifecycle phase derived from a state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Anonymous,
    Loading,
    Authenticated,
}

/// In-memory session state. `tokens` mirrors the persisted record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    pub current_user: Option<User>,
    #[serde(skip)]
    pub tokens: Option<TokenPair>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub auth_error: Option<String>,
}

impl SessionState {
    /// Starts loading: bootstrap has not run yet.
    pub(crate) fn initial() -> Self { Self { is_loading: true, ..Default::default() } }

    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Loading
        } else if self.is_authenticated {
            Phase::Authenticated
        } else {
            Phase::Anonymous
        }
    }

    pub(crate) fn authenticate(&mut self, tokens: TokenPair, user: User) {
        self.tokens = Some(tokens);
        self.current_user = Some(user);
        self.is_authenticated = true;
    }

    /// User and tokens are dropped together, never one without the other.
    pub(crate) fn reset_anonymous(&mut self) {
        self.tokens = None;
        self.current_user = None;
        self.is_authenticated = false;
    }

    pub fn role_name(&self) -> Option<&str> { self.current_user.as_ref().map(|u| u.role.as_str()) }
}
