// Error types module

use thiserror::Error;

use crate::cache::CacheError;
use crate::network::NetworkError;
use crate::queue::QueueError;

/// Centralized error type for the agent
///
/// Request handling never surfaces these to the page (every request gets a
/// response); they show up at startup, in control endpoints and in logs.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration errors (invalid YAML, missing env vars, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response cache store errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Upload queue store errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Backend unreachable or failed
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Malformed page-to-agent message
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Listener or runtime failures
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// HTTP status used when the error answers a control request
    pub fn status_code(&self) -> u16 {
        match self {
            AgentError::InvalidMessage(_) => 400,
            AgentError::Network(_) => 503,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::InvalidMessage(err.to_string())
    }
}
