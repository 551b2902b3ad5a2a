//! HTTP response value shared by the network client, the caches and the
//! fetch strategies.
//!
//! Responses are fully buffered: the agent serves small app assets, JSON and
//! photos, and a buffered body can be cloned into a cache before it is
//! returned to the page.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::constants::SOURCE_HEADER;

/// Where a response handed to the page came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    Synthetic,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Synthetic => "synthetic",
        }
    }
}

/// Buffered HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// JSON response built by the agent itself
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(
            status,
            vec![("content-type".to_string(), "application/json".to_string())],
            value.to_string(),
        )
        .with_source(ResponseSource::Synthetic)
    }

    /// Plain-text response built by the agent itself
    pub fn text(status: u16, body: &str) -> Self {
        Self::new(
            status,
            vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body.to_string(),
        )
        .with_source(ResponseSource::Synthetic)
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value of a header with a single value
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        if source == ResponseSource::Network {
            self.headers
                .retain(|(k, _)| !k.eq_ignore_ascii_case(SOURCE_HEADER));
        } else {
            self.set_header(SOURCE_HEADER, source.as_str());
        }
        self
    }

    /// Source recorded on the response, `Network` when unmarked
    pub fn source(&self) -> ResponseSource {
        match self.header(SOURCE_HEADER) {
            Some("cache") => ResponseSource::Cache,
            Some("synthetic") => ResponseSource::Synthetic,
            _ => ResponseSource::Network,
        }
    }

    /// Body parsed as JSON
    pub fn json_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
