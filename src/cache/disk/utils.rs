//! Utility functions for disk cache

use crate::cache::CacheKey;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Convert a CacheKey to a SHA256 hash for use as a filename
pub fn key_to_hash(key: &CacheKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Fresh generation for a body file
pub fn new_generation() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Metadata file of an entry
pub fn meta_path(entries_dir: &Path, hash: &str) -> PathBuf {
    entries_dir.join(format!("{}.meta", hash))
}

/// Body file of one generation of an entry
pub fn data_path(entries_dir: &Path, hash: &str, generation: &str) -> PathBuf {
    entries_dir.join(format!("{}.{}.data", hash, generation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_to_hash_deterministic() {
        let key1 = CacheKey::from("/css/styles.css");
        let key2 = CacheKey::from("/css/styles.css");
        assert_eq!(key_to_hash(&key1), key_to_hash(&key2));
        assert_eq!(key_to_hash(&key1).len(), 64);
    }

    #[test]
    fn test_key_to_hash_different_keys() {
        let key1 = CacheKey::from("/js/app.js?v=1");
        let key2 = CacheKey::from("/js/app.js?v=2");
        assert_ne!(key_to_hash(&key1), key_to_hash(&key2));
    }

    #[test]
    fn test_entry_paths() {
        let dir = Path::new("/tmp/c/entries");
        assert_eq!(meta_path(dir, "abc"), PathBuf::from("/tmp/c/entries/abc.meta"));
        assert_eq!(
            data_path(dir, "abc", "g1"),
            PathBuf::from("/tmp/c/entries/abc.g1.data")
        );
        assert_ne!(new_generation(), new_generation());
    }
}
