//! Page-to-agent message protocol
//!
//! Messages arrive as JSON objects tagged by `type` on
//! `POST /__offline/message`; the HTTP response carries the reply.

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::queue::UploadRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentMessage {
    /// Queue an upload directly, without attempting it first
    QueuePhotoUpload { data: UploadRequest },
    /// Ask for connectivity and queue depth
    GetOfflineStatus,
    /// Delete every cache
    ClearCache,
}

impl AgentMessage {
    pub fn parse(body: &[u8]) -> Result<Self, AgentError> {
        serde_json::from_slice(body).map_err(|e| AgentError::InvalidMessage(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AgentMessage::QueuePhotoUpload { .. } => "QUEUE_PHOTO_UPLOAD",
            AgentMessage::GetOfflineStatus => "GET_OFFLINE_STATUS",
            AgentMessage::ClearCache => "CLEAR_CACHE",
        }
    }
}

/// Reply to `GET_OFFLINE_STATUS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStatus {
    pub is_offline: bool,
    pub queued_uploads: usize,
}

/// Reply to `CLEAR_CACHE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCacheReply {
    pub success: bool,
}

/// What the agent sends back for a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageReply {
    /// Fire-and-forget message accepted; nothing to send back
    Accepted,
    Status(OfflineStatus),
    CacheCleared(ClearCacheReply),
}

impl MessageReply {
    /// JSON body of the reply, if it has one
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            MessageReply::Accepted => None,
            MessageReply::Status(status) => serde_json::to_value(status).ok(),
            MessageReply::CacheCleared(reply) => serde_json::to_value(reply).ok(),
        }
    }
}
