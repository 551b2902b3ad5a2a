//! The network: how the agent reaches the backend.
//!
//! `Network` is the seam between the fetch strategies and the outside world.
//! `HttpNetwork` is the production implementation; tests script their own.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::response::HttpResponse;

mod http;

pub use self::http::HttpNetwork;

/// Request headers never forwarded to the backend
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// True for headers that describe one hop rather than the message
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// No response could be obtained
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Request forwarded to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    pub method: ::http::Method,
    /// Path and query, e.g. `/api/locations?limit=10`
    pub path_and_query: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl NetworkRequest {
    pub fn get(path_and_query: impl Into<String>) -> Self {
        Self {
            method: ::http::Method::GET,
            path_and_query: path_and_query.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Path without the query string
    pub fn path(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map(|(path, _)| path)
            .unwrap_or(&self.path_and_query)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Anything that can answer a request with a response or fail to
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: NetworkRequest) -> Result<HttpResponse, NetworkError>;
}

/// Last known reachability of the backend
///
/// Updated from real traffic: a failed fetch marks offline, any response
/// (whatever its status) marks online.
#[derive(Debug)]
pub struct Connectivity {
    online: AtomicBool,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }
}

impl Connectivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record an outcome. Returns true if this changed the state.
    pub fn record(&self, reachable: bool) -> bool {
        let previous = self.online.swap(reachable, Ordering::SeqCst);
        if previous != reachable {
            tracing::info!(online = reachable, "Backend connectivity changed");
            true
        } else {
            false
        }
    }
}
