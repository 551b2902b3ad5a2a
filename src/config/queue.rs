//! Upload queue and background sync configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_HOST_RETRIES, DEFAULT_PROBE_INTERVAL_SECS, DEFAULT_QUEUE_DIR, DEFAULT_SYNC_TAG,
};

fn default_queue_dir() -> PathBuf {
    PathBuf::from(DEFAULT_QUEUE_DIR)
}

fn default_sync_tag() -> String {
    DEFAULT_SYNC_TAG.to_string()
}

fn default_probe_interval_seconds() -> u64 {
    DEFAULT_PROBE_INTERVAL_SECS
}

fn default_max_host_retries() -> u32 {
    DEFAULT_MAX_HOST_RETRIES
}

/// Durable upload queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Directory holding one JSON document per queued job
    #[serde(default = "default_queue_dir")]
    pub directory: PathBuf,

    /// Replay attempts before a job is dead-lettered. Unset retries forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Background sync tag that drains the queue
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            directory: default_queue_dir(),
            max_attempts: None,
            sync_tag: default_sync_tag(),
        }
    }
}

/// Settings of the host side that fires sync events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between connectivity probes while tags are pending
    #[serde(default = "default_probe_interval_seconds")]
    pub probe_interval_seconds: u64,

    /// Times a sync that reported failures is fired again before the tag is dropped
    #[serde(default = "default_max_host_retries")]
    pub max_host_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            probe_interval_seconds: default_probe_interval_seconds(),
            max_host_retries: default_max_host_retries(),
        }
    }
}

impl SyncConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_seconds)
    }
}
