//! Server and upstream configuration types.
//!
//! This module defines:
//! - Listener address and port for the local agent
//! - The upstream backend the agent forwards to ("the network")
//!
//! Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PROBE_PATH, DEFAULT_SERVER_ADDRESS, DEFAULT_SERVER_PORT};

fn default_address() -> String {
    DEFAULT_SERVER_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_probe_path() -> String {
    DEFAULT_PROBE_PATH.to_string()
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Socket address string in `host:port` form
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Backend the agent forwards requests to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Origin of the backend, e.g. `http://localhost:3000`
    pub base_url: String,

    /// Request timeout in seconds. Unset leaves timeouts to the network stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Path probed to decide whether the backend is reachable again
    #[serde(default = "default_probe_path")]
    pub probe_path: String,
}

impl UpstreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: None,
            probe_path: default_probe_path(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err("upstream.base_url cannot be empty".to_string());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!(
                "upstream.base_url '{}' must start with http:// or https://",
                self.base_url
            ));
        }
        if self.timeout_seconds == Some(0) {
            return Err("upstream.timeout_seconds must be > 0 when set".to_string());
        }
        if !self.probe_path.starts_with('/') {
            return Err(format!(
                "upstream.probe_path '{}' must start with /",
                self.probe_path
            ));
        }
        Ok(())
    }
}
