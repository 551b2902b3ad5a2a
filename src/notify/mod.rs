//! Agent-to-page notifications
//!
//! Every open client subscribes to one broadcast channel; a message is
//! delivered to every subscriber present when it is sent. Clients reach the
//! channel through the `GET /__offline/events` server-sent event stream.

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::constants::NOTIFIER_CHANNEL_CAPACITY;
use crate::metrics::AgentMetrics;

/// Message pushed to every open client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// A queued upload was replayed
    UploadCompleted {
        #[serde(rename = "uploadId")]
        upload_id: String,
        success: bool,
    },
    /// A queued upload hit the attempt limit and was dead-lettered
    UploadAbandoned {
        #[serde(rename = "uploadId")]
        upload_id: String,
        attempts: u32,
    },
    /// Every cache was deleted
    CacheCleared { deleted: Vec<String> },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::UploadCompleted { .. } => "UPLOAD_COMPLETED",
            ClientMessage::UploadAbandoned { .. } => "UPLOAD_ABANDONED",
            ClientMessage::CacheCleared { .. } => "CACHE_CLEARED",
        }
    }
}

/// One delivered message with its stream sequence number
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub message: ClientMessage,
}

impl Notification {
    /// Server-sent event frame for this notification
    pub fn to_sse(&self) -> String {
        let data = serde_json::to_string(&self.message).unwrap_or_else(|_| "{}".to_string());
        let mut frame = String::new();
        let _ = writeln!(frame, "event: message");
        let _ = writeln!(frame, "id: {}", self.id);
        let _ = writeln!(frame, "data: {}", data);
        frame.push('\n');
        frame
    }
}

/// Fan-out of `ClientMessage`s to every subscribed client
pub struct ClientNotifier {
    sender: broadcast::Sender<Notification>,
    next_id: AtomicU64,
}

impl Default for ClientNotifier {
    fn default() -> Self {
        Self::new(NOTIFIER_CHANNEL_CAPACITY)
    }
}

impl ClientNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a client
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        let receiver = self.sender.subscribe();
        AgentMetrics::global()
            .connected_clients
            .set(self.sender.receiver_count() as i64);
        receiver
    }

    /// Send to every subscribed client. Returns how many received it.
    pub fn broadcast(&self, message: ClientMessage) -> usize {
        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            message,
        };
        let kind = notification.message.kind();
        AgentMetrics::global()
            .connected_clients
            .set(self.sender.receiver_count() as i64);
        match self.sender.send(notification) {
            Ok(delivered) => {
                tracing::debug!(message = kind, clients = delivered, "Broadcast to clients");
                delivered
            }
            Err(_) => {
                tracing::debug!(message = kind, "No clients subscribed, broadcast dropped");
                0
            }
        }
    }

    /// Clients currently subscribed
    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
