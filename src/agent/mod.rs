//! The offline agent
//!
//! Owns the cache storage, the upload queue, the network and the client
//! notifier, and handles the four kinds of events the host delivers:
//! lifecycle (install, activate), fetch, sync and page messages.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::cache::{build_storage, CacheEntry, CacheKey, CacheKind, CacheNames, CacheStorage};
use crate::config::Config;
use crate::error::AgentError;
use crate::metrics::AgentMetrics;
use crate::network::{Connectivity, HttpNetwork, Network, NetworkError, NetworkRequest};
use crate::notify::{ClientMessage, ClientNotifier};
use crate::queue::UploadQueue;
use crate::response::HttpResponse;
use crate::sync::SyncRegistry;

mod fetch;
pub mod messages;
mod replay;

pub use fetch::{
    offline_body, GENERIC_OFFLINE_BODY, PHOTO_OFFLINE_BODY, STATIC_OFFLINE_BODY,
    UPLOAD_NOT_QUEUED_ERROR,
};
pub use messages::{AgentMessage, ClearCacheReply, MessageReply, OfflineStatus};
pub use replay::SyncReport;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

/// Snapshot reported by the health endpoint
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentStatus {
    pub state: AgentState,
    pub online: bool,
    pub queued_uploads: usize,
    pub dead_letters: usize,
    pub clients: usize,
    pub pending_sync: Vec<String>,
    pub caches: Vec<String>,
}

pub struct OfflineAgent {
    config: Arc<Config>,
    names: CacheNames,
    storage: Arc<dyn CacheStorage>,
    queue: UploadQueue,
    network: Arc<dyn Network>,
    connectivity: Connectivity,
    notifier: ClientNotifier,
    registry: Arc<SyncRegistry>,
    state: RwLock<AgentState>,
    sync_lock: tokio::sync::Mutex<()>,
}

impl OfflineAgent {
    /// Assemble an agent from already-built parts
    pub fn new(
        config: Config,
        storage: Arc<dyn CacheStorage>,
        queue: UploadQueue,
        network: Arc<dyn Network>,
    ) -> Self {
        let names = CacheNames::new(&config.cache.version);
        Self {
            config: Arc::new(config),
            names,
            storage,
            queue,
            network,
            connectivity: Connectivity::new(),
            notifier: ClientNotifier::default(),
            registry: Arc::new(SyncRegistry::new()),
            state: RwLock::new(AgentState::Parsed),
            sync_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Build the production agent: configured cache backend, queue directory
    /// and HTTP network. Rejects a configuration that fails validation.
    pub async fn from_config(config: Config) -> Result<Self, AgentError> {
        config.validate().map_err(AgentError::Config)?;
        let storage = build_storage(&config.cache);
        let queue = UploadQueue::open(config.queue.directory.clone()).await?;
        let network = Arc::new(HttpNetwork::new(&config.upstream)?);
        Ok(Self::new(config, storage, queue, network))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache_names(&self) -> &CacheNames {
        &self.names
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    pub fn notifier(&self) -> &ClientNotifier {
        &self.notifier
    }

    pub fn registry(&self) -> &Arc<SyncRegistry> {
        &self.registry
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn state(&self) -> AgentState {
        *self.state.read()
    }

    pub fn is_activated(&self) -> bool {
        self.state() == AgentState::Activated
    }

    fn set_state(&self, state: AgentState) {
        *self.state.write() = state;
        tracing::debug!(state = ?state, "Agent state changed");
    }

    /// Precache the app shell. A failed entry is logged and skipped.
    /// Returns the number of entries stored.
    pub async fn install(&self) -> Result<usize, AgentError> {
        self.set_state(AgentState::Installing);

        let static_cache = self.storage.open(self.names.get(CacheKind::Static)).await?;
        let mut stored = 0usize;
        for entry in &self.config.cache.precache {
            if self.config.cache.has_placeholder(entry) {
                tracing::debug!(entry = %entry, "Skipping unconfigured precache entry");
                continue;
            }
            match self.fetch_network(NetworkRequest::get(entry.as_str())).await {
                Ok(response) if response.is_success() => {
                    static_cache
                        .put(CacheKey::new(entry.as_str()), CacheEntry::new(response))
                        .await?;
                    stored += 1;
                }
                Ok(response) => {
                    tracing::warn!(
                        entry = %entry,
                        status = response.status,
                        "Precache entry not cached"
                    );
                }
                Err(e) => {
                    tracing::warn!(entry = %entry, error = %e, "Precache fetch failed");
                }
            }
        }

        self.storage.open(self.names.get(CacheKind::Photos)).await?;
        self.storage.open(self.names.get(CacheKind::Dynamic)).await?;

        self.set_state(AgentState::Installed);
        tracing::info!(
            cache = self.names.get(CacheKind::Static),
            precached = stored,
            configured = self.config.cache.precache.len(),
            "Agent installed"
        );
        Ok(stored)
    }

    /// Delete caches from other versions and start handling requests.
    /// Returns the deleted cache names.
    pub async fn activate(&self) -> Result<Vec<String>, AgentError> {
        self.set_state(AgentState::Activating);

        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if !self.names.is_current(&name) && self.storage.delete(&name).await? {
                tracing::info!(cache = %name, "Deleted stale cache");
                deleted.push(name);
            }
        }

        self.set_state(AgentState::Activated);
        tracing::info!(stale_deleted = deleted.len(), "Agent activated");
        Ok(deleted)
    }

    /// Handle one page message
    pub async fn handle_message(&self, message: AgentMessage) -> Result<MessageReply, AgentError> {
        tracing::debug!(message = message.kind(), "Message received");
        match message {
            AgentMessage::QueuePhotoUpload { data } => {
                self.queue.enqueue(data).await?;
                AgentMetrics::global().record_upload("queued");
                self.refresh_queue_depth().await;
                self.registry.register(&self.config.queue.sync_tag);
                Ok(MessageReply::Accepted)
            }
            AgentMessage::GetOfflineStatus => Ok(MessageReply::Status(OfflineStatus {
                is_offline: !self.connectivity.is_online(),
                queued_uploads: self.queue.count().await?,
            })),
            AgentMessage::ClearCache => {
                let deleted = self.clear_caches().await?;
                self.notifier.broadcast(ClientMessage::CacheCleared { deleted });
                Ok(MessageReply::CacheCleared(ClearCacheReply { success: true }))
            }
        }
    }

    async fn clear_caches(&self) -> Result<Vec<String>, AgentError> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if self.storage.delete(&name).await? {
                deleted.push(name);
            }
        }
        tracing::info!(deleted = deleted.len(), "Caches cleared");
        Ok(deleted)
    }

    /// Probe the backend; true if it answered at all
    pub async fn probe(&self) -> bool {
        let request = NetworkRequest::get(self.config.upstream.probe_path.as_str());
        self.fetch_network(request).await.is_ok()
    }

    pub async fn status(&self) -> Result<AgentStatus, AgentError> {
        Ok(AgentStatus {
            state: self.state(),
            online: self.connectivity.is_online(),
            queued_uploads: self.queue.count().await?,
            dead_letters: self.queue.dead_letter_count().await?,
            clients: self.notifier.client_count(),
            pending_sync: self.registry.pending(),
            caches: self.storage.keys().await?,
        })
    }

    /// Register the upload sync if jobs from a previous run are waiting
    pub async fn resume_pending_uploads(&self) -> Result<usize, AgentError> {
        let queued = self.queue.count().await?;
        AgentMetrics::global().queue_depth.set(queued as i64);
        if queued > 0 {
            tracing::info!(queued = queued, "Resuming queued uploads from previous run");
            self.registry.register(&self.config.queue.sync_tag);
        }
        Ok(queued)
    }

    /// Every network call goes through here so connectivity follows real
    /// traffic
    async fn fetch_network(&self, request: NetworkRequest) -> Result<HttpResponse, NetworkError> {
        let result = self.network.fetch(request).await;
        let online = result.is_ok();
        if self.connectivity.record(online) {
            AgentMetrics::global().online.set(online as i64);
        }
        result
    }

    async fn refresh_queue_depth(&self) {
        match self.queue.count().await {
            Ok(depth) => AgentMetrics::global().queue_depth.set(depth as i64),
            Err(e) => tracing::warn!(error = %e, "Failed to count queued uploads"),
        }
    }
}
