//! Client-side session lifecycle for the gym API.
//! `SessionManager` owns the state; the other sub-modules hold the types it works with.

mod clock;
mod guard;
mod manager;
mod notify;
mod state;
mod tokens;
mod user;

pub use clock::{Clock, FixedClock, SystemClock};
pub use guard::{admin_route, private_route, GuardDecision, ADMIN_LOGIN_PATH, HOME_PATH, LOGIN_PATH};
pub use manager::{normalize_field_errors, SessionManager, SessionManagerBuilder};
pub use notify::{LogNotifier, NoticeLevel, Notifier};
pub use state::{Phase, SessionState};
pub use tokens::{auth_header, clear_tokens, decode_access_claims, load_tokens, save_tokens, AccessClaims, TokenPair};
pub use user::{Role, User};
