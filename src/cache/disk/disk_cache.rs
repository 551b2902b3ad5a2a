//! Main DiskCache implementation
//!
//! An entry is a body file `<hash>.<generation>.data` plus `<hash>.meta`
//! naming that generation. A put writes a new body file first and then
//! replaces the metadata, so readers see either the old entry or the new
//! one, never a mix. The superseded body is removed after the swap.

use crate::cache::stats::CacheStatsTracker;
use crate::cache::{Cache, CacheEntry, CacheError, CacheKey, CacheStats};
use crate::response::HttpResponse;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::backend::DiskBackend;
use super::index::CacheIndex;
use super::types::EntryMetadata;
use super::utils::{data_path, key_to_hash, meta_path, new_generation};

/// Reads that race a replacing put retry this many times
const MAX_READ_ATTEMPTS: usize = 3;

/// One named cache stored under `<root>/<name>/entries/`
pub struct DiskCache {
    name: String,
    entries_dir: PathBuf,
    backend: Arc<dyn DiskBackend>,
    index: CacheIndex,
    stats: CacheStatsTracker,
    /// Serializes metadata commits so disk and index agree on the winner
    commit: Mutex<()>,
}

impl DiskCache {
    /// Open (or create) the cache directory and rebuild its index
    pub async fn open(
        name: impl Into<String>,
        cache_dir: &Path,
        backend: Arc<dyn DiskBackend>,
    ) -> Result<Self, CacheError> {
        let entries_dir = cache_dir.join("entries");
        backend.create_dir_all(&entries_dir).await?;
        let index = CacheIndex::rebuild_from_dir(&entries_dir, backend.as_ref()).await?;

        let name = name.into();
        tracing::debug!(
            cache = %name,
            entries = index.entry_count(),
            size_bytes = index.total_size(),
            "Opened disk cache"
        );

        Ok(Self {
            name,
            entries_dir,
            backend,
            index,
            stats: CacheStatsTracker::new(),
            commit: Mutex::new(()),
        })
    }

    fn body_path(&self, metadata: &EntryMetadata) -> PathBuf {
        data_path(
            &self.entries_dir,
            &key_to_hash(&metadata.cache_key),
            &metadata.generation,
        )
    }

    async fn delete_body(&self, metadata: &EntryMetadata) {
        if let Err(e) = self.backend.delete_file(&self.body_path(metadata)).await {
            tracing::warn!(
                cache = %self.name,
                key = %metadata.cache_key,
                error = %e,
                "Failed to remove superseded cache body"
            );
        }
    }

    async fn remove_entry(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let _commit = self.commit.lock().await;
        let removed = self.index.remove(key);
        self.backend
            .delete_file(&meta_path(&self.entries_dir, &key_to_hash(key)))
            .await?;
        match removed {
            Some(metadata) => {
                self.backend.delete_file(&self.body_path(&metadata)).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl Cache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        for _ in 0..MAX_READ_ATTEMPTS {
            let Some(metadata) = self.index.get(key) else {
                self.stats.increment_misses();
                return Ok(None);
            };

            match self.backend.read_file(&self.body_path(&metadata)).await {
                Ok(body) => {
                    self.stats.increment_hits();
                    return Ok(Some(CacheEntry {
                        response: HttpResponse::new(metadata.status, metadata.headers, body),
                        stored_at: metadata.stored_at,
                    }));
                }
                Err(e) if e.is_not_found() => {
                    // Replaced by a newer put: read that one instead
                    let current = self.index.get(key);
                    if current
                        .as_ref()
                        .is_some_and(|c| c.generation != metadata.generation)
                    {
                        continue;
                    }
                    // Deleted behind our back; forget it
                    if current.is_some() {
                        self.index.remove(key);
                    }
                    self.stats.increment_misses();
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.stats.increment_misses();
        Ok(None)
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        let hash = key_to_hash(&key);
        let metadata = EntryMetadata {
            cache_key: key.clone(),
            generation: new_generation(),
            status: entry.response.status,
            headers: entry.response.headers.clone(),
            size_bytes: entry.response.body.len() as u64,
            stored_at: entry.stored_at,
        };
        let meta_json = serde_json::to_vec(&metadata)?;

        let body_path = self.body_path(&metadata);
        self.backend
            .write_file_atomic(&body_path, entry.response.body.clone())
            .await?;

        let previous = {
            let _commit = self.commit.lock().await;
            if let Err(e) = self
                .backend
                .write_file_atomic(&meta_path(&self.entries_dir, &hash), Bytes::from(meta_json))
                .await
            {
                let _ = self.backend.delete_file(&body_path).await;
                return Err(e.into());
            }
            self.index.insert(key, metadata)
        };

        if let Some(previous) = previous {
            self.delete_body(&previous).await;
        }
        self.stats.increment_insertions();
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.remove_entry(key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        for key in self.index.keys() {
            self.remove_entry(&key).await?;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self
            .stats
            .snapshot(self.index.total_size(), self.index.entry_count() as u64))
    }
}
