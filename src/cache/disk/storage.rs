//! Registry of disk caches: one directory per cache name under a root

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::backend::DiskBackend;
use super::disk_cache::DiskCache;
use super::tokio_backend::TokioFsBackend;
use crate::cache::traits::validate_cache_name;
use crate::cache::{Cache, CacheError, CacheStorage};

pub struct DiskCacheStorage {
    root: PathBuf,
    backend: Arc<dyn DiskBackend>,
    opened: RwLock<HashMap<String, Arc<DiskCache>>>,
}

impl DiskCacheStorage {
    /// Storage rooted at `root` using the tokio filesystem backend
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_backend(root, Arc::new(TokioFsBackend::new()))
    }

    pub fn with_backend(root: impl Into<PathBuf>, backend: Arc<dyn DiskBackend>) -> Self {
        Self {
            root: root.into(),
            backend,
            opened: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, CacheError> {
        validate_cache_name(name)?;
        let existing = self.opened.read().get(name).cloned();
        if let Some(cache) = existing {
            return Ok(cache);
        }

        let cache =
            Arc::new(DiskCache::open(name, &self.root.join(name), self.backend.clone()).await?);

        // Another task may have opened it meanwhile; keep the first one
        let cache = self
            .opened
            .write()
            .entry(name.to_string())
            .or_insert(cache)
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        if validate_cache_name(name).is_err() {
            return Ok(false);
        }
        if self.opened.read().contains_key(name) {
            return Ok(true);
        }
        match tokio::fs::metadata(self.root.join(name)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        validate_cache_name(name)?;
        let was_open = self.opened.write().remove(name).is_some();
        let removed = self.backend.remove_dir_all(&self.root.join(name)).await?;
        Ok(was_open || removed)
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut names: Vec<String> = self
            .backend
            .list_dirs(&self.root)
            .await?
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()))
            .filter(|name| validate_cache_name(name).is_ok())
            .map(|name| name.to_string())
            .collect();

        for name in self.opened.read().keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        names.sort();
        Ok(names)
    }
}
