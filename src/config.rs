//! Client configuration: where the REST backend lives and where the session is persisted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::storage::{FileStore, MemoryStore, SharedStore};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_STORAGE_KEY: &str = "tokens";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to, e.g. `http://host:8000/api`.
    #[serde(default = "ClientConfig::default_api_base")]
    pub api_base: String,
    /// JSON file holding persisted session records. `None` keeps them in memory.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    /// Storage key of the serialized token pair.
    #[serde(default = "ClientConfig::default_storage_key")]
    pub storage_key: String,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "ClientConfig::default_log_filter")]
    pub log_filter: String,
}

impl ClientConfig {
    fn default_api_base() -> String { DEFAULT_API_BASE.to_string() }
    fn default_storage_key() -> String { DEFAULT_STORAGE_KEY.to_string() }
    fn default_log_filter() -> String { "info".to_string() }

    /// Defaults overridden by `GYM_API_BASE`, `GYM_TOKEN_FILE`, `GYM_STORAGE_KEY` and `GYM_LOG`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("GYM_API_BASE") { cfg.api_base = v; }
        if let Ok(v) = std::env::var("GYM_TOKEN_FILE") {
            if !v.trim().is_empty() { cfg.token_file = Some(PathBuf::from(v)); }
        }
        if let Ok(v) = std::env::var("GYM_STORAGE_KEY") { cfg.storage_key = v; }
        if let Ok(v) = std::env::var("GYM_LOG") { cfg.log_filter = v; }
        cfg
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::config("config_read".to_string(), format!("{}: {}", path.display(), e)))?;
        let cfg: ClientConfig = serde_json::from_str(&text)
            .map_err(|e| AppError::config("config_parse".to_string(), format!("{}: {}", path.display(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.api_url()?;
        if self.storage_key.trim().is_empty() {
            return Err(AppError::config("storage_key", "storage key must not be empty"));
        }
        Ok(())
    }

    /// Parsed base URL without a trailing slash.
    pub fn api_url(&self) -> AppResult<Url> {
        let trimmed = self.api_base.trim_end_matches('/');
        let url = Url::parse(trimmed)
            .map_err(|e| AppError::config("api_base".to_string(), format!("invalid base URL '{}': {}", self.api_base, e)))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::config("api_base".to_string(), format!("base URL must be http(s): '{}'", self.api_base)));
        }
        Ok(url)
    }

    /// Per-user session file: `$XDG_CONFIG_HOME/gym/session.json`, else
    /// `$HOME/.config/gym/session.json`. `None` when neither variable is set.
    pub fn default_token_file() -> Option<PathBuf> {
        Self::token_file_under(std::env::var_os("XDG_CONFIG_HOME"), std::env::var_os("HOME"))
    }

    fn token_file_under(xdg: Option<std::ffi::OsString>, home: Option<std::ffi::OsString>) -> Option<PathBuf> {
        let base = match xdg.filter(|v| !v.is_empty()) {
            Some(x) => PathBuf::from(x),
            None => PathBuf::from(home.filter(|v| !v.is_empty())?).join(".config"),
        };
        Some(base.join("gym").join("session.json"))
    }

    /// Storage backend implied by `token_file`.
    pub fn open_store(&self) -> SharedStore {
        match &self.token_file {
            Some(p) => Arc::new(FileStore::new(p)),
            None => Arc::new(MemoryStore::new()),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: Self::default_api_base(),
            token_file: None,
            storage_key: Self::default_storage_key(),
            log_filter: Self::default_log_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_partial_file() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.api_base, "http://localhost:8000/api");
        assert_eq!(cfg.storage_key, "tokens");
        assert!(cfg.validate().is_ok());

        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("gym.json");
        std::fs::write(&p, r#"{"api_base":"https://gym.example.com/api/","token_file":"/tmp/t.json"}"#).unwrap();
        let cfg = ClientConfig::from_file(&p).unwrap();
        assert_eq!(cfg.api_url().unwrap().as_str(), "https://gym.example.com/api");
        assert_eq!(cfg.storage_key, "tokens");
        assert_eq!(cfg.token_file, Some(PathBuf::from("/tmp/t.json")));
    }

    #[test]
    fn rejects_bad_base_and_empty_key() {
        let cfg = ClientConfig { api_base: "not a url".into(), ..Default::default() };
        assert!(matches!(cfg.validate(), Err(AppError::Config { .. })));
        let cfg = ClientConfig { api_base: "ftp://host/api".into(), ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = ClientConfig { storage_key: " ".into(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_token_file_is_per_user() {
        let p = ClientConfig::token_file_under(None, Some("/home/alice".into())).unwrap();
        assert_eq!(p, PathBuf::from("/home/alice/.config/gym/session.json"));
        let p = ClientConfig::token_file_under(Some("/xdg".into()), Some("/home/alice".into())).unwrap();
        assert_eq!(p, PathBuf::from("/xdg/gym/session.json"));
        let p = ClientConfig::token_file_under(Some("".into()), Some("/home/bob".into())).unwrap();
        assert!(p.starts_with("/home/bob/.config"));
        assert!(ClientConfig::token_file_under(None, None).is_none());
        assert!(!p.starts_with(std::env::temp_dir()));
    }
}
