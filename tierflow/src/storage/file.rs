//! File-backed key-value store.
//!
//! Each key maps to a single JSON file inside a root directory. Keys are
//! sanitized into filenames, so `tierflow.behavior` lands in
//! `<root>/tierflow.behavior.json`.

use std::path::{Path, PathBuf};

use super::{BoxFuture, KeyValueStore, StorageError};

/// File-backed [`KeyValueStore`] provider.
///
/// Writes are whole-file replacements; there is no partial update. The root
/// directory is created lazily on first write.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store under the platform data directory
    /// (e.g. `~/.local/share/tierflow` on Linux).
    pub fn in_data_dir() -> Result<Self, StorageError> {
        let base = dirs::data_dir()
            .ok_or_else(|| StorageError::Unavailable("no platform data directory".to_string()))?;
        Ok(Self::new(base.join("tierflow")))
    }

    /// The root directory documents are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are dot-namespaced identifiers; anything else is flattened
        // so a key can never escape the root directory.
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{safe}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, StorageError>> {
        let path = self.path_for(key);
        Box::pin(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => Ok(Some(contents)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StorageError::Io(e)),
            }
        })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'_, Result<(), StorageError>> {
        let path = self.path_for(key);
        let root = self.root.clone();
        Box::pin(async move {
            tokio::fs::create_dir_all(&root).await?;
            tokio::fs::write(&path, value).await?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let path = self.path_for(key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StorageError::Io(e)),
            }
        })
    }
}
