//!
//! gymsession storage module
//! -------------------------
//! Persistent client storage: a synchronous key-value store that survives process
//! restarts. The session layer keeps one record in it (by default under `"tokens"`)
//! holding the JSON-serialized token pair.
//!
//! Two implementations are provided:
//! - `MemoryStore`: process-local map, used by tests and when no token file is configured.
//! - `FileStore`: a single JSON object file on disk, rewritten atomically on every change.
//!
//! Only the `SessionManager` writes the token record. Other readers (for example the
//! header builder in `session::tokens`) must tolerate the key being absent.

use std::sync::Arc;

use thiserror::Error;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage file {path} is not a JSON object: {reason}")]
    Corrupt { path: String, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Synchronous key-value storage surviving reloads.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Shared handle used by the session layer and its readers.
pub type SharedStore = Arc<dyn KeyValueStore>;

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> { (**self).get(key) }
    fn set(&self, key: &str, value: &str) -> StorageResult<()> { (**self).set(key, value) }
    fn remove(&self, key: &str) -> StorageResult<()> { (**self).remove(key) }
}
