//! JSON file persistence backend.
//!
//! The file holds one JSON object mapping storage keys to records, the same
//! shape as a browser extension's storage area.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::{Map, Value};

use fc_core::{PersistenceBackend, StorageError};

pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last modification time, if the file exists.
    pub async fn modified(&self) -> Option<SystemTime> {
        tokio::fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .ok()
    }

    async fn read_object(&self) -> Result<Option<Map<String, Value>>, String> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("'{}': {}", self.path.display(), e)),
        };
        match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(format!("'{}' does not hold a JSON object", self.path.display())),
            Err(e) => Err(format!("'{}': {}", self.path.display(), e)),
        }
    }
}

impl PersistenceBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let map = self.read_object().await.map_err(StorageError::Read)?;
        Ok(map.and_then(|mut map| map.remove(key)))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        // Refuse to clobber a file we cannot parse.
        let mut map = self
            .read_object()
            .await
            .map_err(StorageError::Write)?
            .unwrap_or_default();
        map.insert(key.to_string(), value);

        let text = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| StorageError::Write(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| StorageError::Write(format!("'{}': {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StorageError::Write(format!("'{}': {}", self.path.display(), e)))
    }
}

#[cfg(test)]
pub(crate) fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("fc-cli-{}-{}-{}.json", name, std::process::id(), nanos))
}
