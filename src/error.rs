//! Unified client error model and mapping helpers.
//! Every session operation and authorized request reports failures through [`AppError`];
//! the variant tells the caller how the session reacted (kept, refreshed, or torn down).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

use crate::storage::StorageError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Login or registration rejected by the server. Session state is left as it was.
    Credential { code: String, message: String },
    /// Access token found expired by its decoded claim.
    TokenExpired { code: String, message: String },
    /// Refresh token rejected; the session has been torn down.
    RefreshInvalid { code: String, message: String },
    /// Operation requires an authenticated session.
    NotAuthenticated { code: String, message: String },
    /// Any other non-2xx response.
    Http { status: u16, code: String, message: String },
    Transport { code: String, message: String },
    Decode { code: String, message: String },
    Storage { code: String, message: String },
    Config { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Credential { code, .. }
            | AppError::TokenExpired { code, .. }
            | AppError::RefreshInvalid { code, .. }
            | AppError::NotAuthenticated { code, .. }
            | AppError::Http { code, .. }
            | AppError::Transport { code, .. }
            | AppError::Decode { code, .. }
            | AppError::Storage { code, .. }
            | AppError::Config { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Credential { message, .. }
            | AppError::TokenExpired { message, .. }
            | AppError::RefreshInvalid { message, .. }
            | AppError::NotAuthenticated { message, .. }
            | AppError::Http { message, .. }
            | AppError::Transport { message, .. }
            | AppError::Decode { message, .. }
            | AppError::Storage { message, .. }
            | AppError::Config { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn credential<S: Into<String>>(code: S, msg: S) -> Self { AppError::Credential { code: code.into(), message: msg.into() } }
    pub fn token_expired<S: Into<String>>(code: S, msg: S) -> Self { AppError::TokenExpired { code: code.into(), message: msg.into() } }
    pub fn refresh_invalid<S: Into<String>>(code: S, msg: S) -> Self { AppError::RefreshInvalid { code: code.into(), message: msg.into() } }
    pub fn not_authenticated<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotAuthenticated { code: code.into(), message: msg.into() } }
    pub fn http<S: Into<String>>(status: u16, code: S, msg: S) -> Self { AppError::Http { status, code: code.into(), message: msg.into() } }
    pub fn transport<S: Into<String>>(code: S, msg: S) -> Self { AppError::Transport { code: code.into(), message: msg.into() } }
    pub fn decode<S: Into<String>>(code: S, msg: S) -> Self { AppError::Decode { code: code.into(), message: msg.into() } }
    pub fn storage<S: Into<String>>(code: S, msg: S) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// HTTP status carried by the error, when it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool { self.status() == Some(401) }

    /// Build an error from a failed response. The message comes from the body's `error`
    /// field, then `detail`, then `fallback`.
    pub fn from_response(status: u16, body: &Value, fallback: &str) -> Self {
        let message = server_message(body).unwrap_or_else(|| fallback.to_string());
        AppError::Http { status, code: format!("http_{}", status), message }
    }
}

/// Human-readable message a DRF-style backend puts in an error body.
pub fn server_message(body: &Value) -> Option<String> {
    ["error", "detail"]
        .iter()
        .filter_map(|k| body.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Array(items) => items.iter().find_map(|i| i.as_str().map(|s| s.to_string())),
            _ => None,
        })
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport { code: "transport_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode { code: "decode_error".into(), message: err.to_string() }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage { code: "storage_error".into(), message: err.to_string() }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_prefers_error_then_detail() {
        let body = json!({"error": "Invalid username or password", "detail": "Authentication failed"});
        let e = AppError::from_response(401, &body, "fallback");
        assert_eq!(e.message(), "Invalid username or password");
        assert_eq!(e.status(), Some(401));
        assert!(e.is_unauthorized());

        let e = AppError::from_response(400, &json!({"detail": "Invalid credentials"}), "fallback");
        assert_eq!(e.message(), "Invalid credentials");
        assert_eq!(e.code_str(), "http_400");
    }

    #[test]
    fn message_falls_back_when_body_is_silent() {
        let e = AppError::from_response(500, &json!({"unexpected": 1}), "Login failed.");
        assert_eq!(e.message(), "Login failed.");
        let e = AppError::from_response(502, &Value::Null, "Login failed.");
        assert_eq!(e.message(), "Login failed.");
        let e = AppError::from_response(400, &json!({"detail": "   "}), "Login failed.");
        assert_eq!(e.message(), "Login failed.");
    }

    #[test]
    fn display_and_serde_tagging() {
        let e = AppError::refresh_invalid("refresh_rejected", "Session expired");
        assert_eq!(e.to_string(), "refresh_rejected: Session expired");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "refresh_invalid");
        assert!(AppError::credential("c", "m").status().is_none());
    }
}
