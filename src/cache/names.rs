//! The current set of cache names.
//!
//! Names embed the configured version, so changing `cache.version` makes every
//! existing cache stale; activation deletes whatever is not in this set.

use crate::constants::CACHE_NAME_PREFIX;

/// Purpose of a named cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// App shell assets, served cache-first
    Static,
    /// Generic cacheable responses
    Dynamic,
    /// Photo binaries, served network-first
    Photos,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::Static, CacheKind::Dynamic, CacheKind::Photos];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Static => "static",
            CacheKind::Dynamic => "dynamic",
            CacheKind::Photos => "photos",
        }
    }
}

/// Names of the three current caches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    static_name: String,
    dynamic_name: String,
    photos_name: String,
}

impl CacheNames {
    pub fn new(version: &str) -> Self {
        let name = |kind: CacheKind| format!("{}-{}-{}", CACHE_NAME_PREFIX, kind.as_str(), version);
        Self {
            static_name: name(CacheKind::Static),
            dynamic_name: name(CacheKind::Dynamic),
            photos_name: name(CacheKind::Photos),
        }
    }

    pub fn get(&self, kind: CacheKind) -> &str {
        match kind {
            CacheKind::Static => &self.static_name,
            CacheKind::Dynamic => &self.dynamic_name,
            CacheKind::Photos => &self.photos_name,
        }
    }

    /// True if `name` belongs to the current set
    pub fn is_current(&self, name: &str) -> bool {
        CacheKind::ALL.iter().any(|kind| self.get(*kind) == name)
    }

    pub fn all(&self) -> [&str; 3] {
        [
            self.static_name.as_str(),
            self.dynamic_name.as_str(),
            self.photos_name.as_str(),
        ]
    }
}
