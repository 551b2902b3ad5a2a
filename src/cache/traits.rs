//! Cache trait definitions
//!
//! `Cache` is one named response cache; `CacheStorage` owns the set of named
//! caches and is what the agent deletes from during version rollover.

use async_trait::async_trait;
use std::sync::Arc;

use super::entry::{CacheEntry, CacheKey};
use super::error::CacheError;
use super::stats::CacheStats;

/// One named response cache
#[async_trait]
pub trait Cache: Send + Sync {
    /// Name this cache was opened under
    fn name(&self) -> &str;

    /// Get a cache entry by key
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry, overwriting any existing entry for the key
    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError>;

    /// Delete a cache entry by key
    /// Returns true if the entry was deleted, false if it didn't exist
    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<(), CacheError>;

    /// Get cache statistics
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}

/// Registry of named caches
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a cache, creating it if needed. Opening the same name twice
    /// returns handles to the same cache.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, CacheError>;

    /// Whether a cache with this name exists
    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// Delete a cache and all its entries
    /// Returns true if the cache existed
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Names of all existing caches
    async fn keys(&self) -> Result<Vec<String>, CacheError>;
}

/// Reject names that cannot be used as a directory name
pub(crate) fn validate_cache_name(name: &str) -> Result<(), CacheError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidName(name.to_string()))
    }
}
