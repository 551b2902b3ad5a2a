//! Cache error types
//!
//! This module defines error types for cache operations.

use thiserror::Error;

/// Cache error types
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache name cannot be used (empty or not filesystem safe)
    #[error("Invalid cache name: {0}")]
    InvalidName(String),
    /// I/O error (for disk cache)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}
