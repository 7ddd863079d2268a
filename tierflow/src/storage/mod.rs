//! Key-value persistence port and providers.
//!
//! Engine state that survives a session (behavior history, alert rules,
//! the alert log) is serialized as versioned JSON under namespaced keys
//! through the [`KeyValueStore`] trait. Hosts inject a provider; tests use
//! [`MemoryStore`], production typically uses [`FileStore`].
//!
//! Persistence is best-effort: writers fire-and-forget and log failures,
//! they never block or fail the calling path.

mod file;
mod memory;
mod versioned;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use versioned::{decode_versioned, encode_versioned, VersionedRecord};

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error from a file-backed provider.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage location could not be resolved.
    #[error("Storage location unavailable: {0}")]
    Unavailable(String),

    /// Provider-specific error.
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Generic key-value persistence interface.
///
/// Keys are namespaced strings (e.g. `tierflow.behavior`), values are JSON
/// documents. The interface is intentionally minimal; versioning and
/// serialization opinions live in the [`versioned`] helpers, not in
/// providers.
///
/// # Dyn Compatibility
///
/// Uses `Pin<Box<dyn Future>>` for async methods so managers can hold an
/// `Arc<dyn KeyValueStore>` without generics spreading through the engine.
pub trait KeyValueStore: Send + Sync {
    /// Retrieve the raw document stored under `key`.
    ///
    /// Returns `Ok(None)` if the key has never been written.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, StorageError>>;

    /// Store `value` under `key`, replacing any previous document.
    fn set(&self, key: &str, value: String) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Remove the document stored under `key`.
    ///
    /// Returns `Ok(true)` if the key existed.
    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StorageError>>;
}

/// Namespaced key for persisted behavior history.
pub const KEY_BEHAVIOR: &str = "tierflow.behavior";

/// Namespaced key for persisted alert rules.
pub const KEY_ALERT_RULES: &str = "tierflow.alert-rules";

/// Namespaced key for the persisted alert log.
pub const KEY_ALERT_LOG: &str = "tierflow.alert-log";
