//! Cache statistics types
//!
//! - `CacheStats`: snapshot of one named cache
//! - `CacheStatsTracker`: atomic counters shared by the cache implementations

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring and metrics
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of stored (or overwritten) entries
    pub insertions: u64,
    /// Current cache size in bytes
    pub current_size_bytes: u64,
    /// Current number of items in cache
    pub current_item_count: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total requests)
    /// Returns 0.0 if there are no requests
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics tracker using atomics for thread safety
#[derive(Debug, Default)]
pub(crate) struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
}

impl CacheStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_insertions(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics
    pub fn snapshot(&self, current_size_bytes: u64, current_item_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            current_size_bytes,
            current_item_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_with_no_requests_is_zero() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tracker_snapshot() {
        let tracker = CacheStatsTracker::new();
        tracker.increment_hits();
        tracker.increment_hits();
        tracker.increment_misses();
        tracker.increment_insertions();

        let stats = tracker.snapshot(100, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 1);
        assert_eq!(stats.current_size_bytes, 100);
        assert_eq!(stats.current_item_count, 1);
    }
}
