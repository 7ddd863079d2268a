//! Engine-level error type.

use std::fmt;

use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::transport::TransportError;

/// Errors that can occur while starting or driving the engine.
#[derive(Debug)]
pub enum EngineError {
    /// The transport could not be constructed.
    Transport(TransportError),

    /// The configuration file is unusable.
    Config(ConfigError),

    /// The persistence store failed during bootstrap.
    Storage(StorageError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Transport(e) => write!(f, "Transport error: {}", e),
            EngineError::Config(e) => write!(f, "Configuration error: {}", e),
            EngineError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Transport(e) => Some(e),
            EngineError::Config(e) => Some(e),
            EngineError::Storage(e) => Some(e),
        }
    }
}

impl From<TransportError> for EngineError {
    fn from(e: TransportError) -> Self {
        EngineError::Transport(e)
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e)
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}
