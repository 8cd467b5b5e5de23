use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::storage::KeyValueStore;

/// Access/refresh token pair as issued by `/auth/login/` and persisted under one key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new<A: Into<String>, R: Into<String>>(access: A, refresh: R) -> Self {
        Self { access: access.into(), refresh: refresh.into() }
    }

    pub fn bearer(&self) -> String { format!("Bearer {}", self.access) }

    pub fn access_claims(&self) -> AppResult<AccessClaims> { decode_access_claims(&self.access) }
}

// Tokens never show up in logs or panics.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &redact(&self.access))
            .field("refresh", &redact(&self.refresh))
            .finish()
    }
}

fn redact(t: &str) -> String {
    if t.len() <= 8 { "***".to_string() } else { format!("{}***", t.chars().take(4).collect::<String>()) }
}

/// Claims read from the access token payload. The signature is not checked here;
/// the server remains the authority, the client only needs `exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Expiry in seconds since the epoch.
    pub exp: i64,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
}

impl AccessClaims {
    /// A token whose `exp` equals `now` is already expired.
    pub fn is_expired(&self, now: i64) -> bool { now >= self.exp }

    pub fn seconds_left(&self, now: i64) -> i64 { (self.exp - now).max(0) }
}

pub fn decode_access_claims(access: &str) -> AppResult<AccessClaims> {
    let mut parts = access.split('.');
    let (Some(_header), Some(payload), Some(_sig), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return Err(AppError::decode("jwt_format", "access token is not a three-part JWT"));
    };
    let trimmed = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE.decode(payload))
        .map_err(|e| AppError::decode("jwt_payload".to_string(), format!("access token payload is not base64url: {}", e)))?;
    serde_json::from_slice::<AccessClaims>(&bytes)
        .map_err(|e| AppError::decode("jwt_claims".to_string(), format!("access token claims unreadable: {}", e)))
}

/// Read the persisted pair. Absent, unreadable, or malformed records all read as `None`.
pub fn load_tokens(store: &dyn KeyValueStore, key: &str) -> Option<TokenPair> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("tokens.load failed key={} error={}", key, e);
            return None;
        }
    };
    match serde_json::from_str::<TokenPair>(&raw) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("tokens.load ignoring malformed record key={} error={}", key, e);
            None
        }
    }
}

pub fn save_tokens(store: &dyn KeyValueStore, key: &str, tokens: &TokenPair) -> AppResult<()> {
    let raw = serde_json::to_string(tokens)?;
    store.set(key, &raw)?;
    Ok(())
}

pub fn clear_tokens(store: &dyn KeyValueStore, key: &str) -> AppResult<()> {
    store.remove(key)?;
    Ok(())
}

/// `Authorization` header value for the persisted access token, if any.
pub fn auth_header(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    load_tokens(store, key).map(|t| t.bearer())
}

#[cfg(test)]
pub(crate) fn make_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"token_type":"access","exp":{},"user_id":1}}"#, exp));
    format!("{}.{}.sig", header, payload)
}
