//! Sync handling: replay queued uploads

use http::Method;
use serde::Serialize;

use super::OfflineAgent;
use crate::error::AgentError;
use crate::metrics::AgentMetrics;
use crate::network::{is_hop_by_hop, NetworkRequest};
use crate::notify::ClientMessage;
use crate::queue::form::{multipart_content_type, new_boundary};
use crate::queue::{JobStatus, UploadJob};

/// Outcome of one sync event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub tag: String,
    /// False when the tag is not one this agent handles
    pub handled: bool,
    pub attempted: usize,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub abandoned: Vec<String>,
}

impl SyncReport {
    fn new(tag: &str, handled: bool) -> Self {
        Self {
            tag: tag.to_string(),
            handled,
            ..Self::default()
        }
    }

    /// True if some job is still waiting because its replay failed
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl OfflineAgent {
    /// Handle a sync event. Only the upload tag does anything; jobs are
    /// replayed one at a time in enqueue order.
    pub async fn handle_sync(&self, tag: &str) -> Result<SyncReport, AgentError> {
        if tag != self.config.queue.sync_tag {
            tracing::info!(tag = tag, "Ignoring sync for unknown tag");
            return Ok(SyncReport::new(tag, false));
        }

        let _guard = self.sync_lock.lock().await;
        AgentMetrics::global().sync_runs.inc();

        let mut report = SyncReport::new(tag, true);
        let mut snapshot = self.queue.drain_all().await?;
        tracing::info!(tag = tag, queued = snapshot.remaining(), "Sync started");

        while let Some(mut job) = snapshot.next().await {
            report.attempted += 1;

            job.status = JobStatus::Uploading;
            if let Err(e) = self.queue.update(&job).await {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to mark job uploading");
            }

            match self.replay(&job).await {
                Ok(()) => {
                    if let Err(e) = self.queue.mark_done(&job.id).await {
                        // The job may be replayed again on the next sync
                        tracing::warn!(
                            job_id = %job.id,
                            error = %e,
                            "Failed to remove replayed job"
                        );
                    }
                    tracing::info!(job_id = %job.id, "Queued upload completed");
                    AgentMetrics::global().record_upload("replayed");
                    self.notifier.broadcast(ClientMessage::UploadCompleted {
                        upload_id: job.id.clone(),
                        success: true,
                    });
                    report.completed.push(job.id);
                }
                Err(reason) => {
                    job.record_failure(reason);
                    self.settle_failed(job, &mut report).await;
                }
            }
        }

        self.refresh_queue_depth().await;
        tracing::info!(
            tag = tag,
            attempted = report.attempted,
            completed = report.completed.len(),
            failed = report.failed.len(),
            abandoned = report.abandoned.len(),
            "Sync finished"
        );
        Ok(report)
    }

    /// Keep a failed job for the next sync, or dead-letter it once it has
    /// used up its attempts
    async fn settle_failed(&self, job: UploadJob, report: &mut SyncReport) {
        tracing::warn!(
            job_id = %job.id,
            attempts = job.attempts,
            error = job.last_error.as_deref().unwrap_or(""),
            "Queued upload failed"
        );
        AgentMetrics::global().record_upload("failed");

        let exhausted = self
            .config
            .queue
            .max_attempts
            .map(|max| job.attempts >= max)
            .unwrap_or(false);

        if exhausted {
            match self.queue.dead_letter(&job).await {
                Ok(()) => {
                    AgentMetrics::global().record_upload("abandoned");
                    self.notifier.broadcast(ClientMessage::UploadAbandoned {
                        upload_id: job.id.clone(),
                        attempts: job.attempts,
                    });
                    report.abandoned.push(job.id);
                    return;
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to dead-letter job");
                }
            }
        }

        if let Err(e) = self.queue.update(&job).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to record upload failure");
        }
        report.failed.push(job.id);
    }

    /// Re-send one job with a freshly encoded body. Any 2xx is success.
    async fn replay(&self, job: &UploadJob) -> Result<(), String> {
        let method = Method::from_bytes(job.method.as_bytes())
            .map_err(|e| format!("invalid method '{}': {}", job.method, e))?;

        let boundary = new_boundary();
        let mut headers: Vec<(String, String)> = job
            .headers
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case("content-type") && !is_hop_by_hop(name)
            })
            .cloned()
            .collect();
        headers.push(("content-type".to_string(), multipart_content_type(&boundary)));

        let request = NetworkRequest {
            method,
            path_and_query: job.url.clone(),
            headers,
            body: job.fields.encode_multipart(&boundary),
        };

        match self.fetch_network(request).await {
            Ok(response) if response.is_success() => Ok(()),
            Ok(response) => Err(format!("HTTP {}", response.status)),
            Err(e) => Err(e.to_string()),
        }
    }
}
