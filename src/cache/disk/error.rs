//! Error types for disk cache operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiskCacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DiskCacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiskCacheError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

// Conversion to CacheError
impl From<DiskCacheError> for crate::cache::CacheError {
    fn from(err: DiskCacheError) -> Self {
        match err {
            DiskCacheError::Io(e) => crate::cache::CacheError::IoError(e),
            DiskCacheError::Serialization(e) => {
                crate::cache::CacheError::SerializationError(e.to_string())
            }
        }
    }
}
