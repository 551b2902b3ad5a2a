//! Host side of background sync: decides when a registered sync fires

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::agent::{OfflineAgent, SyncReport};

/// Fires pending sync tags once the backend is reachable
///
/// Wakes on every registration and on every probe interval. A run that
/// leaves failed jobs is re-armed up to `max_host_retries` times, then the
/// tag waits for the next registration.
pub struct ConnectivityMonitor {
    agent: Arc<OfflineAgent>,
    interval: Duration,
    max_host_retries: u32,
    retries: HashMap<String, u32>,
}

impl ConnectivityMonitor {
    pub fn new(agent: Arc<OfflineAgent>) -> Self {
        let sync = &agent.config().sync;
        let interval = sync.probe_interval();
        let max_host_retries = sync.max_host_retries;
        Self {
            agent,
            interval,
            max_host_retries,
            retries: HashMap::new(),
        }
    }

    /// Run until `shutdown` flips to true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let registry = Arc::clone(self.agent.registry());
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_host_retries = self.max_host_retries,
            "Connectivity monitor started"
        );

        loop {
            tokio::select! {
                _ = registry.notified() => {}
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
            self.tick().await;
        }

        tracing::info!("Connectivity monitor stopped");
    }

    /// One pass: probe if anything is pending, then dispatch every pending
    /// tag. Returns the reports of the syncs that ran.
    pub async fn tick(&mut self) -> Vec<SyncReport> {
        let registry = Arc::clone(self.agent.registry());
        if !registry.has_pending() {
            return Vec::new();
        }
        if !self.agent.probe().await {
            tracing::debug!(pending = ?registry.pending(), "Backend unreachable, sync deferred");
            return Vec::new();
        }

        let mut reports = Vec::new();
        for tag in registry.take_pending() {
            let needs_retry = match self.agent.handle_sync(&tag).await {
                Ok(report) => {
                    let failed = report.has_failures();
                    reports.push(report);
                    failed
                }
                Err(e) => {
                    tracing::error!(tag = %tag, error = %e, "Sync failed");
                    true
                }
            };

            if !needs_retry {
                self.retries.remove(&tag);
                continue;
            }

            let attempts = self.retries.entry(tag.clone()).or_insert(0);
            if *attempts < self.max_host_retries {
                *attempts += 1;
                tracing::info!(tag = %tag, retry = *attempts, "Sync re-armed");
                registry.rearm(&tag);
            } else {
                tracing::warn!(
                    tag = %tag,
                    retries = *attempts,
                    "Sync retries exhausted, waiting for next registration"
                );
                self.retries.remove(&tag);
            }
        }
        reports
    }
}
