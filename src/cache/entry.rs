//! Cache key and entry types
//!
//! This module defines the core cache entry structures:
//! - `CacheKey`: request URL (path plus query) a response is stored under
//! - `CacheEntry`: stored response with the time it was stored

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::response::HttpResponse;

/// Cache key for identifying cached responses
///
/// The key is the request's path and query. Fragments never reach the agent
/// and the method is not part of the key because only GET responses are stored.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(path_and_query: impl Into<String>) -> Self {
        let mut key: String = path_and_query.into();
        if key.is_empty() {
            key.push('/');
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        CacheKey::new(s)
    }
}

/// Cache entry representing a stored response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub response: HttpResponse,
    /// Unix time in milliseconds when the entry was stored
    pub stored_at: i64,
}

impl CacheEntry {
    /// Wrap a response, stamping the current time
    pub fn new(response: HttpResponse) -> Self {
        Self {
            response,
            stored_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.response.body
    }

    /// Approximate memory footprint used for cache weighing
    pub fn size_bytes(&self) -> usize {
        let headers: usize = self
            .response
            .headers
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum();
        self.response.body.len() + headers
    }
}
