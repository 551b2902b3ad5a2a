//! Response cache store
//!
//! Three named caches (static, dynamic, photos) partition stored responses by
//! purpose. Two backends implement the same traits:
//! - `disk`: durable, one directory per cache name
//! - `memory`: moka-backed, disposable

use std::sync::Arc;

pub mod config;
pub mod disk;
pub mod entry;
pub mod error;
pub mod memory;
pub mod names;
pub mod stats;
pub mod traits;

pub use config::{CacheBackend, CacheConfig};
pub use entry::{CacheEntry, CacheKey};
pub use error::CacheError;
pub use memory::{MemoryCache, MemoryCacheStorage};
pub use names::{CacheKind, CacheNames};
pub use stats::CacheStats;
pub use traits::{Cache, CacheStorage};

/// Build the cache storage selected by configuration
pub fn build_storage(config: &CacheConfig) -> Arc<dyn CacheStorage> {
    match config.backend {
        CacheBackend::Disk => Arc::new(disk::DiskCacheStorage::new(config.directory.clone())),
        CacheBackend::Memory => Arc::new(MemoryCacheStorage::new(config.max_cache_size_bytes())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_memory_storage() {
        let config = CacheConfig {
            backend: CacheBackend::Memory,
            ..CacheConfig::default()
        };
        let storage = build_storage(&config);
        storage.open("locations-static-v1").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["locations-static-v1"]);
    }

    #[tokio::test]
    async fn test_build_disk_storage_uses_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            directory: dir.path().to_path_buf(),
            ..CacheConfig::default()
        };
        let storage = build_storage(&config);
        storage.open("locations-photos-v1").await.unwrap();
        assert!(dir.path().join("locations-photos-v1").is_dir());
    }
}
