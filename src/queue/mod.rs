//! Durable upload queue
//!
//! One JSON document per job in the queue directory (`<dir>/<id>.json`),
//! written atomically through the same `DiskBackend` the disk caches use.
//! Job ids start with the enqueue time, so file-name order is enqueue order.
//! Jobs given up on move to `<dir>/dead-letter/`.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::cache::disk::{DiskBackend, DiskCacheError, TokioFsBackend};

pub mod form;
pub mod job;

pub use form::{FieldValue, FormError, FormField, FormFields};
pub use job::{JobStatus, UploadJob, UploadRequest};

const JOB_EXTENSION: &str = "json";
const DEAD_LETTER_DIR: &str = "dead-letter";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue storage error: {0}")]
    Storage(#[from] DiskCacheError),

    #[error("invalid job document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid job id: {0}")]
    InvalidId(String),

    #[error(transparent)]
    Form(#[from] FormError),
}

/// Durable store of pending uploads
pub struct UploadQueue {
    dir: PathBuf,
    dead_letter_dir: PathBuf,
    backend: Arc<dyn DiskBackend>,
}

impl UploadQueue {
    /// Open (creating if needed) the queue in `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, QueueError> {
        Self::open_with_backend(dir, Arc::new(TokioFsBackend::new())).await
    }

    pub async fn open_with_backend(
        dir: impl Into<PathBuf>,
        backend: Arc<dyn DiskBackend>,
    ) -> Result<Self, QueueError> {
        let dir = dir.into();
        let dead_letter_dir = dir.join(DEAD_LETTER_DIR);
        backend.create_dir_all(&dir).await?;
        backend.create_dir_all(&dead_letter_dir).await?;

        let queue = Self {
            dir,
            dead_letter_dir,
            backend,
        };
        queue.recover().await?;
        Ok(queue)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove temp files from interrupted writes and requeue jobs a previous
    /// process left mid-upload
    async fn recover(&self) -> Result<(), QueueError> {
        let mut requeued = 0usize;
        for path in self.backend.read_dir(&self.dir).await? {
            let is_temp = path
                .extension()
                .map(|ext| ext == "tmp")
                .unwrap_or(false);
            if is_temp {
                self.backend.delete_file(&path).await?;
                continue;
            }
            if !is_job_file(&path) {
                continue;
            }
            if let Some(mut job) = self.read_job(&path).await {
                if job.status == JobStatus::Uploading {
                    job.status = JobStatus::Queued;
                    self.write_job(&self.dir, &job).await?;
                    requeued += 1;
                }
            }
        }
        if requeued > 0 {
            tracing::info!(
                requeued = requeued,
                dir = %self.dir.display(),
                "Requeued interrupted uploads"
            );
        }
        Ok(())
    }

    /// Persist a new job. The job is visible to `drain_all` once this returns.
    pub async fn enqueue(&self, request: UploadRequest) -> Result<UploadJob, QueueError> {
        let job = UploadJob::new(request);
        self.write_job(&self.dir, &job).await?;
        tracing::info!(
            job_id = %job.id,
            url = %job.url,
            fields = job.fields.len(),
            "Upload queued"
        );
        Ok(job)
    }

    /// Snapshot of the jobs present now, in enqueue order. Jobs are read
    /// lazily as the snapshot is walked; every call lists afresh.
    pub async fn drain_all(&self) -> Result<JobSnapshot<'_>, QueueError> {
        let ids = self.job_ids().await?;
        Ok(JobSnapshot {
            queue: self,
            ids: ids.into_iter(),
        })
    }

    /// Read one job by id
    pub async fn get(&self, id: &str) -> Result<Option<UploadJob>, QueueError> {
        let path = self.job_path(id)?;
        match self.backend.read_file(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite a stored job (status, attempts, last error)
    pub async fn update(&self, job: &UploadJob) -> Result<(), QueueError> {
        self.job_path(&job.id)?;
        self.write_job(&self.dir, job).await
    }

    /// Delete a successfully replayed job. Returns false if it was not present.
    pub async fn mark_done(&self, id: &str) -> Result<bool, QueueError> {
        let path = self.job_path(id)?;
        let existed = match self.backend.file_size(&path).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e.into()),
        };
        self.backend.delete_file(&path).await?;
        Ok(existed)
    }

    /// Move a job out of the queue into the dead-letter directory
    pub async fn dead_letter(&self, job: &UploadJob) -> Result<(), QueueError> {
        let path = self.job_path(&job.id)?;
        self.write_job(&self.dead_letter_dir, job).await?;
        self.backend.delete_file(&path).await?;
        tracing::warn!(
            job_id = %job.id,
            attempts = job.attempts,
            last_error = job.last_error.as_deref().unwrap_or(""),
            "Upload moved to dead-letter"
        );
        Ok(())
    }

    /// Number of queued jobs
    pub async fn count(&self) -> Result<usize, QueueError> {
        Ok(self.job_ids().await?.len())
    }

    /// Number of jobs in the dead-letter directory
    pub async fn dead_letter_count(&self) -> Result<usize, QueueError> {
        Ok(self
            .backend
            .read_dir(&self.dead_letter_dir)
            .await?
            .iter()
            .filter(|p| is_job_file(p))
            .count())
    }

    async fn job_ids(&self) -> Result<Vec<String>, QueueError> {
        let mut ids: Vec<String> = self
            .backend
            .read_dir(&self.dir)
            .await?
            .iter()
            .filter(|p| is_job_file(p))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn job_path(&self, id: &str) -> Result<PathBuf, QueueError> {
        if !job::is_valid_job_id(id) {
            return Err(QueueError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", id, JOB_EXTENSION)))
    }

    async fn write_job(&self, dir: &Path, job: &UploadJob) -> Result<(), QueueError> {
        let data = serde_json::to_vec(job)?;
        let path = dir.join(format!("{}.{}", job.id, JOB_EXTENSION));
        self.backend
            .write_file_atomic(&path, Bytes::from(data))
            .await?;
        Ok(())
    }

    /// Read a job file; unreadable documents are logged and skipped
    async fn read_job(&self, path: &Path) -> Option<UploadJob> {
        let data = match self.backend.read_file(path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read queued job");
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Skipping unreadable queued job"
                );
                None
            }
        }
    }
}

fn is_job_file(path: &Path) -> bool {
    path.extension().map(|ext| ext == JOB_EXTENSION).unwrap_or(false)
}

/// Jobs present when `drain_all` was called
///
/// A job removed after the snapshot was taken is skipped rather than
/// returned stale.
pub struct JobSnapshot<'a> {
    queue: &'a UploadQueue,
    ids: std::vec::IntoIter<String>,
}

impl JobSnapshot<'_> {
    /// Ids not yet walked
    pub fn remaining(&self) -> usize {
        self.ids.len()
    }

    pub async fn next(&mut self) -> Option<UploadJob> {
        for id in self.ids.by_ref() {
            let path = self.queue.dir.join(format!("{}.{}", id, JOB_EXTENSION));
            if let Some(job) = self.queue.read_job(&path).await {
                return Some(job);
            }
        }
        None
    }

    pub async fn collect(mut self) -> Vec<UploadJob> {
        let mut jobs = Vec::with_capacity(self.remaining());
        while let Some(job) = self.next().await {
            jobs.push(job);
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(location: &str) -> UploadRequest {
        UploadRequest::new(
            "/api/photos/upload",
            FormFields::new(vec![
                FormField::text("locationId", location),
                FormField::file("photo", "p.jpg", "image/jpeg", vec![1, 2, 3]),
            ]),
        )
    }

    #[tokio::test]
    async fn test_enqueue_then_drain_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue = UploadQueue::open(dir.path()).await.unwrap();

        let a = queue.enqueue(request("1")).await.unwrap();
        let b = queue.enqueue(request("2")).await.unwrap();
        let c = queue.enqueue(request("3")).await.unwrap();

        let jobs = queue.drain_all().await.unwrap().collect().await;
        let ids: Vec<_> = jobs.iter().map(|j| j.id.clone()).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
        assert_eq!(jobs[1].fields, request("2").fields);
        assert_eq!(queue.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_mark_done_removes_exactly_one_job() {
        let dir = tempfile::tempdir().unwrap();
        let queue = UploadQueue::open(dir.path()).await.unwrap();
        let a = queue.enqueue(request("1")).await.unwrap();
        let b = queue.enqueue(request("2")).await.unwrap();

        assert!(queue.mark_done(&a.id).await.unwrap());
        assert!(!queue.mark_done(&a.id).await.unwrap());

        assert!(queue.get(&a.id).await.unwrap().is_none());
        assert_eq!(queue.get(&b.id).await.unwrap(), Some(b));
        assert_eq!(queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_skips_jobs_removed_after_listing() {
        let dir = tempfile::tempdir().unwrap();
        let queue = UploadQueue::open(dir.path()).await.unwrap();
        let a = queue.enqueue(request("1")).await.unwrap();
        let b = queue.enqueue(request("2")).await.unwrap();

        let mut snapshot = queue.drain_all().await.unwrap();
        queue.mark_done(&a.id).await.unwrap();

        assert_eq!(snapshot.next().await.map(|j| j.id), Some(b.id));
        assert!(snapshot.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drain_reflects_mutations_between_calls() {
        let dir = tempfile::tempdir().unwrap();
        let queue = UploadQueue::open(dir.path()).await.unwrap();
        queue.enqueue(request("1")).await.unwrap();
        assert_eq!(queue.drain_all().await.unwrap().remaining(), 1);

        queue.enqueue(request("2")).await.unwrap();
        assert_eq!(queue.drain_all().await.unwrap().remaining(), 2);
    }

    #[tokio::test]
    async fn test_update_persists_failure_state() {
        let dir = tempfile::tempdir().unwrap();
        let queue = UploadQueue::open(dir.path()).await.unwrap();
        let mut job = queue.enqueue(request("1")).await.unwrap();

        job.record_failure("HTTP 500");
        queue.update(&job).await.unwrap();

        let stored = queue.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.last_error.as_deref(), Some("HTTP 500"));
    }

    #[tokio::test]
    async fn test_jobs_survive_reopen_and_uploading_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let queue = UploadQueue::open(dir.path()).await.unwrap();
            let mut job = queue.enqueue(request("1")).await.unwrap();
            job.status = JobStatus::Uploading;
            queue.update(&job).await.unwrap();
            job.id
        };

        let reopened = UploadQueue::open(dir.path()).await.unwrap();
        let job = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_job_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0000000000001-deadbeef.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join("0000000000002-cafe.json.1234.tmp"), b"partial").unwrap();

        let queue = UploadQueue::open(dir.path()).await.unwrap();
        let good = queue.enqueue(request("1")).await.unwrap();

        let jobs = queue.drain_all().await.unwrap().collect().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, good.id);
        assert!(!dir.path().join("0000000000002-cafe.json.1234.tmp").exists());
    }

    #[tokio::test]
    async fn test_dead_letter_moves_job_out_of_queue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = UploadQueue::open(dir.path()).await.unwrap();
        let mut job = queue.enqueue(request("1")).await.unwrap();
        job.record_failure("HTTP 422");

        queue.dead_letter(&job).await.unwrap();

        assert_eq!(queue.count().await.unwrap(), 0);
        assert_eq!(queue.dead_letter_count().await.unwrap(), 1);
        assert!(dir
            .path()
            .join("dead-letter")
            .join(format!("{}.json", job.id))
            .exists());
    }

    #[tokio::test]
    async fn test_invalid_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let queue = UploadQueue::open(dir.path()).await.unwrap();
        assert!(matches!(
            queue.mark_done("../escape").await,
            Err(QueueError::InvalidId(_))
        ));
    }
}
