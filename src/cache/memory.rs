//! Memory cache implementation
//!
//! - `MemoryCache`: one named cache backed by moka, size-bounded, no TTL
//! - `MemoryCacheStorage`: registry of memory caches
//!
//! Entries never expire by time: a cached response stays valid until its
//! cache is deleted at version rollover. moka may still evict under the size
//! bound, which only costs a network round trip later.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::entry::{CacheEntry, CacheKey};
use super::error::CacheError;
use super::stats::{CacheStats, CacheStatsTracker};
use super::traits::{validate_cache_name, Cache, CacheStorage};

/// MemoryCache wraps moka for our Cache trait
pub struct MemoryCache {
    name: String,
    cache: moka::future::Cache<CacheKey, CacheEntry>,
    stats: CacheStatsTracker,
}

impl MemoryCache {
    pub fn new(name: impl Into<String>, max_size_bytes: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_size_bytes)
            .weigher(|_key, entry: &CacheEntry| {
                u32::try_from(entry.size_bytes()).unwrap_or(u32::MAX)
            })
            .build();

        Self {
            name: name.into(),
            cache,
            stats: CacheStatsTracker::new(),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => {
                self.stats.increment_hits();
                Ok(Some(entry))
            }
            None => {
                self.stats.increment_misses();
                Ok(None)
            }
        }
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        self.cache.insert(key, entry).await;
        self.stats.increment_insertions();
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        self.cache.run_pending_tasks().await;
        Ok(self
            .stats
            .snapshot(self.cache.weighted_size(), self.cache.entry_count()))
    }
}

/// Registry of moka-backed caches
pub struct MemoryCacheStorage {
    caches: RwLock<HashMap<String, Arc<MemoryCache>>>,
    max_size_bytes: u64,
}

impl MemoryCacheStorage {
    /// `max_size_bytes` bounds each cache separately
    pub fn new(max_size_bytes: u64) -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            max_size_bytes,
        }
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, CacheError> {
        validate_cache_name(name)?;
        if let Some(cache) = self.caches.read().get(name) {
            return Ok(cache.clone());
        }
        let mut caches = self.caches.write();
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(name, self.max_size_bytes)))
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.caches.read().contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.caches.write().remove(name).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
