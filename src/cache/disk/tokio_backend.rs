//! Tokio-based filesystem backend (portable, works on all platforms)

use super::backend::DiskBackend;
use super::error::DiskCacheError;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Portable filesystem backend using tokio::fs
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFsBackend;

impl TokioFsBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Temp file next to `path`, unique per write so concurrent writers of
/// sibling files never share one
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        "{}.{}.tmp",
        file_name,
        uuid::Uuid::new_v4().simple()
    ))
}

#[async_trait]
impl DiskBackend for TokioFsBackend {
    async fn read_file(&self, path: &Path) -> Result<Bytes, DiskCacheError> {
        let data = tokio::fs::read(path).await?;
        Ok(Bytes::from(data))
    }

    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), DiskCacheError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(path);
        if let Err(e) = tokio::fs::write(&temp_path, &data).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<(), DiskCacheError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), DiskCacheError> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<bool, DiskCacheError> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn file_size(&self, path: &Path) -> Result<u64, DiskCacheError> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(metadata.len())
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, DiskCacheError> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.path());
        }
        Ok(entries)
    }

    async fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>, DiskCacheError> {
        let mut dirs = Vec::new();
        let mut dir = match tokio::fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TokioFsBackend::new();
        let path = dir.path().join("nested").join("file.data");

        backend
            .write_file_atomic(&path, Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(backend.read_file(&path).await.unwrap().as_ref(), b"hello");
        assert_eq!(backend.file_size(&path).await.unwrap(), 5);

        // No temp files are left behind
        let entries = backend.read_dir(path.parent().unwrap()).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TokioFsBackend::new();
        assert!(backend.delete_file(&dir.path().join("missing")).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_dir_all_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TokioFsBackend::new();
        let sub = dir.path().join("cache-a");
        backend.create_dir_all(&sub).await.unwrap();

        assert!(backend.remove_dir_all(&sub).await.unwrap());
        assert!(!backend.remove_dir_all(&sub).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_dirs_skips_files_and_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TokioFsBackend::new();
        backend.create_dir_all(&dir.path().join("a")).await.unwrap();
        backend
            .write_file_atomic(&dir.path().join("file.txt"), Bytes::from_static(b"x"))
            .await
            .unwrap();

        let dirs = backend.list_dirs(dir.path()).await.unwrap();
        assert_eq!(dirs, vec![dir.path().join("a")]);

        let missing = backend.list_dirs(&dir.path().join("nope")).await.unwrap();
        assert!(missing.is_empty());
    }
}
