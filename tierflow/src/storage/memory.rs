//! In-memory key-value store for tests and ephemeral sessions.

use dashmap::DashMap;

use super::{BoxFuture, KeyValueStore, StorageError};

/// In-memory [`KeyValueStore`] provider.
///
/// Backed by a concurrent map; contents vanish with the process. Useful as
/// the injected store in tests and for hosts that opt out of persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, StorageError>> {
        let value = self.entries.get(key).map(|v| v.clone());
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'_, Result<(), StorageError>> {
        self.entries.insert(key.to_string(), value);
        Box::pin(async move { Ok(()) })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let existed = self.entries.remove(key).is_some();
        Box::pin(async move { Ok(existed) })
    }
}
