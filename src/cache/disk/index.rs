//! Cache index management

use super::backend::DiskBackend;
use super::error::DiskCacheError;
use super::types::EntryMetadata;
use super::utils::{data_path, key_to_hash};
use crate::cache::CacheKey;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe in-memory index of cached entries
#[derive(Default)]
pub struct CacheIndex {
    entries: RwLock<HashMap<CacheKey, EntryMetadata>>,
    total_size: AtomicU64,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<EntryMetadata> {
        self.entries.read().get(key).cloned()
    }

    /// Insert or replace an entry, keeping the size total exact.
    /// Returns the replaced entry.
    pub fn insert(&self, key: CacheKey, metadata: EntryMetadata) -> Option<EntryMetadata> {
        let size = metadata.size_bytes;
        let previous = self.entries.write().insert(key, metadata);
        if let Some(ref previous) = previous {
            self.total_size
                .fetch_sub(previous.size_bytes, Ordering::SeqCst);
        }
        self.total_size.fetch_add(size, Ordering::SeqCst);
        previous
    }

    pub fn remove(&self, key: &CacheKey) -> Option<EntryMetadata> {
        let removed = self.entries.write().remove(key);
        if let Some(ref metadata) = removed {
            self.total_size
                .fetch_sub(metadata.size_bytes, Ordering::SeqCst);
        }
        removed
    }

    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::SeqCst)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.total_size.store(0, Ordering::SeqCst);
    }

    /// Rebuild the index by scanning an entries directory
    ///
    /// An entry is indexed when its `.meta` parses and the body generation
    /// it names exists. Body files no metadata refers to, unusable metadata
    /// and leftover `.tmp` files from interrupted writes are deleted.
    pub async fn rebuild_from_dir<B: DiskBackend + ?Sized>(
        entries_dir: &Path,
        backend: &B,
    ) -> Result<Self, DiskCacheError> {
        let index = Self::new();

        let files = match backend.read_dir(entries_dir).await {
            Ok(files) => files,
            Err(e) if e.is_not_found() => return Ok(index),
            Err(e) => return Err(e),
        };

        let mut data_files = HashSet::new();
        let mut meta_files = HashMap::new();

        for file_path in files {
            let Some(filename) = file_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if filename.ends_with(".tmp") {
                let _ = backend.delete_file(&file_path).await;
            } else if filename.ends_with(".data") {
                data_files.insert(file_path.clone());
            } else if let Some(hash) = filename.strip_suffix(".meta") {
                meta_files.insert(hash.to_string(), file_path.clone());
            }
        }

        let mut referenced = HashSet::new();
        for (hash, meta_path) in &meta_files {
            let metadata = match backend.read_file(meta_path).await {
                Ok(bytes) => serde_json::from_slice::<EntryMetadata>(&bytes).ok(),
                Err(_) => None,
            };
            // The file name must match the key it claims to hold, and the
            // body it names must be there
            let usable = metadata.and_then(|metadata| {
                let body = data_path(entries_dir, hash, &metadata.generation);
                (key_to_hash(&metadata.cache_key) == *hash && data_files.contains(&body))
                    .then_some((metadata, body))
            });
            match usable {
                Some((metadata, body)) => {
                    index.insert(metadata.cache_key.clone(), metadata);
                    referenced.insert(body);
                }
                None => {
                    tracing::warn!(path = %meta_path.display(), "Dropping unusable cache metadata");
                    let _ = backend.delete_file(meta_path).await;
                }
            }
        }

        for path in data_files.difference(&referenced) {
            let _ = backend.delete_file(path).await;
        }

        Ok(index)
    }
}
