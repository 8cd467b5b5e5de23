use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::notify::{LogNotifier, NoticeLevel, Notifier};
use super::state::SessionState;
use super::tokens::{self, TokenPair};
use super::user::User;
use crate::api::{ApiClient, AuthorizedClient, GymApi};
use crate::config::{ClientConfig, DEFAULT_STORAGE_KEY};
use crate::error::{server_message, AppError, AppResult};
use crate::storage::{MemoryStore, SharedStore};

const LOGIN_FAILED: &str = "Login failed. Please check credentials.";
const REGISTER_FAILED: &str = "Registration failed. Please try again.";
const PROFILE_FAILED: &str = "Failed to update profile.";
const SESSION_EXPIRED: &str = "Session expired. Please log in again.";
const NETWORK_FAILED: &str = "Unable to reach the server. Please try again.";

#[derive(Debug, Deserialize)]
struct LoginPayload {
    user: User,
    access: String,
    refresh: String,
}

struct Inner {
    api: ApiClient,
    store: SharedStore,
    key: String,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    state: RwLock<SessionState>,
    // One auth-mutating operation at a time.
    gate: tokio::sync::Mutex<()>,
}

/// Owner of the authentication state and the only writer of the persisted token record.
///
/// Construct once at startup and hand clones to consumers; clones share state.
/// Operations: [`bootstrap`](Self::bootstrap), [`login`](Self::login),
/// [`refresh`](Self::refresh), [`logout`](Self::logout), [`register`](Self::register)
/// and [`update_profile`](Self::update_profile). They are serialised against each other.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

pub struct SessionManagerBuilder {
    api: ApiClient,
    store: Option<SharedStore>,
    key: String,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl SessionManagerBuilder {
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn storage_key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = key.into();
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn build(self) -> SessionManager {
        SessionManager {
            inner: Arc::new(Inner {
                api: self.api,
                store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
                key: self.key,
                clock: self.clock,
                notifier: self.notifier,
                state: RwLock::new(SessionState::initial()),
                gate: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

/// Raises `is_loading` for its lifetime.
struct LoadingGuard<'a> {
    state: &'a RwLock<SessionState>,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a RwLock<SessionState>) -> Self {
        state.write().is_loading = true;
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) { self.state.write().is_loading = false; }
}

impl SessionManager {
    pub fn builder(api: ApiClient) -> SessionManagerBuilder {
        SessionManagerBuilder {
            api,
            store: None,
            key: DEFAULT_STORAGE_KEY.to_string(),
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn from_config(cfg: &ClientConfig) -> AppResult<Self> {
        cfg.validate()?;
        let api = ApiClient::from_config(cfg)?;
        Ok(Self::builder(api).store(cfg.open_store()).storage_key(cfg.storage_key.clone()).build())
    }

    // ---- read-only accessors ----

    pub fn snapshot(&self) -> SessionState { self.inner.state.read().clone() }

    pub fn is_authenticated(&self) -> bool { self.inner.state.read().is_authenticated }

    pub fn is_loading(&self) -> bool { self.inner.state.read().is_loading }

    pub fn current_user(&self) -> Option<User> { self.inner.state.read().current_user.clone() }

    pub fn tokens(&self) -> Option<TokenPair> { self.inner.state.read().tokens.clone() }

    pub fn auth_error(&self) -> Option<String> { self.inner.state.read().auth_error.clone() }

    pub fn clear_auth_error(&self) { self.inner.state.write().auth_error = None; }

    /// Token pair as currently persisted; absent or malformed records read as `None`.
    pub fn stored_tokens(&self) -> Option<TokenPair> { tokens::load_tokens(self.inner.store.as_ref(), &self.inner.key) }

    /// `Authorization` value built from storage, for collaborators building their own requests.
    pub fn auth_header(&self) -> Option<String> { tokens::auth_header(self.inner.store.as_ref(), &self.inner.key) }

    pub fn api(&self) -> &ApiClient { &self.inner.api }

    pub fn store(&self) -> &SharedStore { &self.inner.store }

    pub fn storage_key(&self) -> &str { &self.inner.key }

    pub fn now(&self) -> i64 { self.inner.clock.now() }

    pub fn authorized(&self) -> AuthorizedClient { AuthorizedClient::new(self.clone()) }

    pub fn gym(&self) -> GymApi { GymApi::new(self.authorized()) }

    fn notify(&self, level: NoticeLevel, message: &str) { self.inner.notifier.notify(level, message); }

    // ---- bootstrap ----

    /// Restore the persisted session at startup. Never fails: any problem ends in an
    /// anonymous state with `auth_error` set. Returns the resulting snapshot.
    pub async fn bootstrap(&self) -> SessionState {
        let _gate = self.inner.gate.lock().await;
        {
            let _loading = LoadingGuard::begin(&self.inner.state);
            if let Err(e) = self.bootstrap_inner().await {
                warn!("session.bootstrap failed: {}", e);
                self.logout_inner().await;
                self.inner.state.write().auth_error = Some(user_message(&e, SESSION_EXPIRED));
            }
        }
        self.snapshot()
    }

    async fn bootstrap_inner(&self) -> AppResult<()> {
        let Some(stored) = self.stored_tokens() else {
            debug!("session.bootstrap no stored session");
            self.inner.state.write().reset_anonymous();
            return Ok(());
        };
        let claims = stored.access_claims()?;
        let now = self.inner.clock.now();
        if claims.is_expired(now) {
            debug!("session.bootstrap access expired exp={} now={}", claims.exp, now);
            if self.refresh_inner(&stored.refresh).await {
                return Ok(());
            }
            return Err(AppError::refresh_invalid("refresh_failed", SESSION_EXPIRED));
        }
        self.inner.state.write().tokens = Some(stored.clone());
        self.inner.api.set_bearer(&stored.access);
        let user = self.fetch_current_user().await?;
        info!("session.bootstrap restored user={} expires_in={}s", user.username, claims.seconds_left(now));
        self.inner.state.write().authenticate(stored, user);
        Ok(())
    }

    async fn fetch_current_user(&self) -> AppResult<User> {
        let body = self.inner.api.get("/users/me/").await?.into_result("Failed to load current user.")?;
        Ok(serde_json::from_value(body)?)
    }

    // ---- login ----

    /// Exchange credentials for tokens. On failure the previous session (if any) is
    /// untouched and `auth_error` carries the server's message.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<User> {
        let _gate = self.inner.gate.lock().await;
        let _loading = LoadingGuard::begin(&self.inner.state);
        self.inner.state.write().auth_error = None;
        match self.login_inner(username, password).await {
            Ok(user) => {
                info!("session.login user={} role={}", user.username, user.role);
                self.notify(NoticeLevel::Success, "Login successful!");
                Ok(user)
            }
            Err(e) => {
                warn!("session.login failed user={}: {}", username, e);
                let msg = user_message(&e, LOGIN_FAILED);
                self.inner.state.write().auth_error = Some(msg.clone());
                self.notify(NoticeLevel::Error, &msg);
                Err(e)
            }
        }
    }

    async fn login_inner(&self, username: &str, password: &str) -> AppResult<User> {
        let resp = self
            .inner
            .api
            .post("/auth/login/", json!({"username": username, "password": password}))
            .await?;
        if !resp.is_success() {
            let message = server_message(&resp.body).unwrap_or_else(|| LOGIN_FAILED.to_string());
            return Err(AppError::credential("login_rejected".to_string(), message));
        }
        let payload: LoginPayload = serde_json::from_value(resp.body)?;
        let pair = TokenPair::new(payload.access, payload.refresh);
        // Persist before the in-memory state flips to authenticated.
        tokens::save_tokens(self.inner.store.as_ref(), &self.inner.key, &pair)?;
        self.inner.api.set_bearer(&pair.access);
        self.inner.state.write().authenticate(pair, payload.user.clone());
        Ok(payload.user)
    }

    // ---- refresh ----

    /// Obtain a new access token. The refresh token is kept as is. Any failure tears the
    /// session down; the return value says whether the session survived.
    pub async fn refresh(&self, refresh_token: &str) -> bool {
        let _gate = self.inner.gate.lock().await;
        let _loading = LoadingGuard::begin(&self.inner.state);
        self.refresh_inner(refresh_token).await
    }

    /// Recover from a 401 on a request that carried `sent_access`. Runs under the same gate
    /// as the other operations. When the stored pair has changed since the request was
    /// sent (a login or another refresh finished meanwhile) nothing is refreshed and the
    /// current pair is reported usable; only a still-current pair is refreshed.
    pub async fn refresh_if_current(&self, sent_access: &str) -> bool {
        let _gate = self.inner.gate.lock().await;
        let Some(stored) = self.stored_tokens() else {
            return false;
        };
        if stored.access != sent_access {
            debug!("session.refresh skipped: stored access token changed since the request was sent");
            return true;
        }
        let _loading = LoadingGuard::begin(&self.inner.state);
        self.refresh_inner(&stored.refresh).await
    }

    async fn refresh_inner(&self, refresh_token: &str) -> bool {
        match self.try_refresh(refresh_token).await {
            Ok(()) => true,
            Err(e) => {
                warn!("session.refresh failed: {}", e);
                self.logout_inner().await;
                self.inner.state.write().auth_error = Some(SESSION_EXPIRED.to_string());
                false
            }
        }
    }

    async fn try_refresh(&self, refresh_token: &str) -> AppResult<()> {
        let resp = self.inner.api.post("/token/refresh/", json!({"refresh": refresh_token})).await?;
        if !resp.is_success() {
            let message = server_message(&resp.body).unwrap_or_else(|| format!("refresh rejected with HTTP {}", resp.status));
            return Err(AppError::refresh_invalid("refresh_rejected".to_string(), message));
        }
        let access = resp
            .body
            .get("access")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::decode("refresh_response", "refresh response has no access token"))?;
        let pair = TokenPair::new(access, refresh_token);
        tokens::save_tokens(self.inner.store.as_ref(), &self.inner.key, &pair)?;
        self.inner.state.write().tokens = Some(pair.clone());
        self.inner.api.set_bearer(&pair.access);
        let user = self.fetch_current_user().await?;
        info!("session.refresh ok user={}", user.username);
        self.inner.state.write().authenticate(pair, user);
        Ok(())
    }

    // ---- logout ----

    /// Revoke the refresh token server-side (best effort) and clear all local session
    /// state. Safe to call when already logged out.
    pub async fn logout(&self) {
        let _gate = self.inner.gate.lock().await;
        let _loading = LoadingGuard::begin(&self.inner.state);
        self.logout_inner().await;
    }

    async fn logout_inner(&self) {
        let stored = self.stored_tokens().or_else(|| self.tokens());
        let had_session = stored.is_some() || self.inner.state.read().current_user.is_some();
        if let Some(t) = &stored {
            match self.inner.api.post("/auth/logout/", json!({"refresh": t.refresh})).await {
                Ok(resp) if resp.is_success() => debug!("session.logout server revoked refresh token"),
                Ok(resp) => warn!("session.logout server rejected revoke: HTTP {}", resp.status),
                Err(e) => warn!("session.logout revoke request failed: {}", e),
            }
        }
        if let Err(e) = tokens::clear_tokens(self.inner.store.as_ref(), &self.inner.key) {
            warn!("session.logout could not clear persisted tokens: {}", e);
        }
        self.inner.state.write().reset_anonymous();
        self.inner.api.clear_bearer();
        if had_session {
            info!("session.logout done");
            self.notify(NoticeLevel::Info, "Logged out.");
        }
    }

    // ---- register ----

    /// Create an account. Does not sign in; call [`login`](Self::login) afterwards.
    /// Returns the created user object.
    pub async fn register<T: Serialize + ?Sized>(&self, data: &T) -> AppResult<Value> {
        let body = serde_json::to_value(data)?;
        let _gate = self.inner.gate.lock().await;
        let _loading = LoadingGuard::begin(&self.inner.state);
        self.inner.state.write().auth_error = None;
        let result = match self.inner.api.post("/auth/register/", body).await {
            Ok(resp) if resp.is_success() => {
                // Tokens the server may include are deliberately not kept.
                let created = match resp.body {
                    Value::Object(mut m) if m.contains_key("user") => m.remove("user").unwrap_or(Value::Null),
                    other => other,
                };
                Ok(created)
            }
            Ok(resp) => {
                let message = normalize_field_errors(&resp.body).unwrap_or_else(|| REGISTER_FAILED.to_string());
                Err(AppError::credential("registration_rejected".to_string(), message))
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(created) => {
                info!("session.register ok");
                self.notify(NoticeLevel::Success, "Registration successful! Please login to continue.");
                Ok(created)
            }
            Err(e) => {
                warn!("session.register failed: {}", e);
                let msg = user_message(&e, REGISTER_FAILED);
                self.inner.state.write().auth_error = Some(msg.clone());
                self.notify(NoticeLevel::Error, &msg);
                Err(e)
            }
        }
    }

    // ---- profile ----

    /// PATCH the signed-in user's record and replace `current_user` with the response.
    pub async fn update_profile<T: Serialize + ?Sized>(&self, data: &T) -> AppResult<User> {
        let body = serde_json::to_value(data)?;
        let _gate = self.inner.gate.lock().await;
        let user_id = self.inner.state.read().current_user.as_ref().map(|u| u.id);
        let Some(user_id) = user_id else {
            return Err(AppError::not_authenticated("no_current_user", "Sign in before updating the profile."));
        };
        let _loading = LoadingGuard::begin(&self.inner.state);
        let result: AppResult<User> = async {
            let resp = self.inner.api.patch(&format!("/users/{}/", user_id), body).await?;
            if !resp.is_success() {
                let message = resp
                    .body
                    .get("detail")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| PROFILE_FAILED.to_string());
                return Err(AppError::http(resp.status, format!("http_{}", resp.status), message));
            }
            Ok(serde_json::from_value::<User>(resp.body)?)
        }
        .await;
        match result {
            Ok(user) => {
                self.inner.state.write().current_user = Some(user.clone());
                self.notify(NoticeLevel::Success, "Profile updated successfully!");
                Ok(user)
            }
            Err(e) => {
                warn!("session.update_profile failed user_id={}: {}", user_id, e);
                self.notify(NoticeLevel::Error, &user_message(&e, PROFILE_FAILED));
                Err(e)
            }
        }
    }
}

/// Text suitable for `auth_error`: server messages pass through, transport and
/// decoding problems collapse to generic wording.
fn user_message(e: &AppError, fallback: &str) -> String {
    match e {
        AppError::Transport { .. } => NETWORK_FAILED.to_string(),
        AppError::Decode { .. } | AppError::Storage { .. } | AppError::Internal { .. } | AppError::Config { .. } => {
            fallback.to_string()
        }
        other => other.message().to_string(),
    }
}

/// Flatten a field-error body (`{"field": ["msg", ..], ..}`) into one sentence list.
/// Messages under `non_field_errors`, `detail` or `error` are shown without a prefix.
pub fn normalize_field_errors(body: &Value) -> Option<String> {
    let parts: Vec<String> = match body {
        Value::Object(map) => map
            .iter()
            .filter_map(|(field, v)| {
                let msg = first_message(v)?;
                Some(match field.as_str() {
                    "non_field_errors" | "detail" | "error" => msg,
                    _ => format!("{}: {}", field, msg),
                })
            })
            .collect(),
        Value::Array(_) | Value::String(_) => first_message(body).into_iter().collect(),
        _ => Vec::new(),
    };
    if parts.is_empty() {
        None
    } else {
        Some(parts.iter().map(|p| p.trim_end_matches('.')).collect::<Vec<_>>().join(". "))
    }
}

fn first_message(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => items.iter().find_map(first_message),
        Value::Object(map) => map.values().find_map(first_message),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_are_joined() {
        let body = json!({
            "username": ["A user with that username already exists."],
            "email": ["Enter a valid email address.", "second"],
            "non_field_errors": ["Passwords do not match."]
        });
        assert_eq!(
            normalize_field_errors(&body).unwrap(),
            "email: Enter a valid email address. Passwords do not match. username: A user with that username already exists"
        );
    }

    #[test]
    fn field_errors_edge_shapes() {
        assert_eq!(normalize_field_errors(&json!({"detail": "Server down"})).unwrap(), "Server down");
        assert_eq!(normalize_field_errors(&json!(["only one"])).unwrap(), "only one");
        assert!(normalize_field_errors(&json!({})).is_none());
        assert!(normalize_field_errors(&json!({"password": []})).is_none());
        assert!(normalize_field_errors(&Value::Null).is_none());
        assert_eq!(
            normalize_field_errors(&json!({"profile": {"phone": ["Too long."]}})).unwrap(),
            "profile: Too long"
        );
    }

    #[test]
    fn user_message_hides_transport_detail() {
        let e = AppError::transport("transport_error", "tcp connect error: refused");
        assert_eq!(user_message(&e, LOGIN_FAILED), NETWORK_FAILED);
        let e = AppError::decode("decode_error", "missing field `user`");
        assert_eq!(user_message(&e, LOGIN_FAILED), LOGIN_FAILED);
        let e = AppError::credential("login_rejected", "Invalid credentials");
        assert_eq!(user_message(&e, LOGIN_FAILED), "Invalid credentials");
    }
}
