//! Pending sync registrations

use parking_lot::Mutex;
use std::collections::BTreeSet;
use tokio::sync::Notify;

/// Tags waiting for a sync opportunity
///
/// Registering a tag that is already pending is a no-op, the way repeated
/// background-sync registrations collapse into one event.
#[derive(Default)]
pub struct SyncRegistry {
    pending: Mutex<BTreeSet<String>>,
    nudge: Notify,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tag and wake the monitor so it can try right away
    pub fn register(&self, tag: &str) {
        let added = self.pending.lock().insert(tag.to_string());
        if added {
            tracing::debug!(tag = tag, "Sync registered");
        }
        self.nudge.notify_one();
    }

    /// Put a tag back after a failed run; it waits for the next interval
    pub fn rearm(&self, tag: &str) {
        self.pending.lock().insert(tag.to_string());
    }

    /// Remove and return every pending tag
    pub fn take_pending(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.lock()).into_iter().collect()
    }

    pub fn pending(&self) -> Vec<String> {
        self.pending.lock().iter().cloned().collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Resolves after the next `register` (or immediately if one happened
    /// since the last wait)
    pub async fn notified(&self) {
        self.nudge.notified().await
    }
}
