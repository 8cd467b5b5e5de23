use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use super::{KeyValueStore, StorageError, StorageResult};

/// Key-value store backed by one JSON object file.
///
/// Every read goes to disk so a second process sharing the file observes the latest
/// write. Writes land in a fresh owner-only `<file>.<pid>.tmp` and are then renamed over
/// the target, so the record is never readable by other local users.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.display().to_string(), source }
    }

    fn read_map(&self) -> StorageResult<Map<String, Value>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if text.trim().is_empty() { return Ok(Map::new()); }
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(m)) => Ok(m),
            Ok(other) => Err(StorageError::Corrupt {
                path: self.path.display().to_string(),
                reason: format!("expected object, found {}", json_kind(&other)),
            }),
            Err(e) => Err(StorageError::Corrupt { path: self.path.display().to_string(), reason: e.to_string() }),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                create_private_dir(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let text = serde_json::to_string_pretty(map).map_err(|e| StorageError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(format!(".{}.tmp", std::process::id()));
        let tmp = PathBuf::from(tmp);
        let mut file = match open_private(&tmp) {
            Ok(f) => f,
            // Left behind by a crashed writer with our pid; never follow or reuse it.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                fs::remove_file(&tmp).map_err(|e| self.io_err(e))?;
                open_private(&tmp).map_err(|e| self.io_err(e))?
            }
            Err(e) => return Err(self.io_err(e)),
        };
        let written = file.write_all(text.as_bytes()).and_then(|_| file.sync_all());
        drop(file);
        if let Err(e) = written.and_then(|_| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(self.io_err(e));
        }
        debug!("storage.write path={} keys={}", self.path.display(), map.len());
        Ok(())
    }
}

/// New file readable by the owner only. Fails if anything, including a symlink, already
/// sits at `path`.
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
}

fn create_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _g = self.lock.lock();
        let map = self.read_map()?;
        Ok(map.get(key).and_then(|v| v.as_str()).map(|s| s.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _g = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let _g = self.lock.lock();
        let mut map = self.read_map()?;
        if map.remove(key).is_none() { return Ok(()); }
        self.write_map(&map)
    }
}
