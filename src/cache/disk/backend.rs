//! Backend trait for filesystem operations

use super::error::DiskCacheError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Abstraction over filesystem operations used by the disk caches and the
/// upload queue
#[async_trait]
pub trait DiskBackend: Send + Sync {
    /// Read entire file contents
    async fn read_file(&self, path: &Path) -> Result<Bytes, DiskCacheError>;

    /// Write file contents atomically (using temp file + rename)
    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), DiskCacheError>;

    /// Delete a file. Deleting a missing file succeeds.
    async fn delete_file(&self, path: &Path) -> Result<(), DiskCacheError>;

    /// Create directory and all parent directories
    async fn create_dir_all(&self, path: &Path) -> Result<(), DiskCacheError>;

    /// Remove a directory tree. Returns false if it did not exist.
    async fn remove_dir_all(&self, path: &Path) -> Result<bool, DiskCacheError>;

    /// Get file size in bytes
    async fn file_size(&self, path: &Path) -> Result<u64, DiskCacheError>;

    /// List all entries in a directory
    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, DiskCacheError>;

    /// List the subdirectories of a directory
    async fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>, DiskCacheError>;
}
