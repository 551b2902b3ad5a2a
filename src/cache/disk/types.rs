//! Type definitions for disk cache

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

/// Metadata for a cached entry on disk, stored as the `.meta` file
///
/// Writing this file is what commits an entry: it names the body file by
/// `generation`, and body files are never rewritten in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryMetadata {
    pub cache_key: CacheKey,
    /// Suffix of the body file, `<hash>.<generation>.data`
    pub generation: String,
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub size_bytes: u64,
    /// Unix time in milliseconds
    pub stored_at: i64,
}
