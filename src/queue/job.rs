//! Upload job model

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

use super::form::FormFields;

/// Lifecycle state of a stored job. Done jobs are deleted, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Uploading,
    Failed,
}

fn default_method() -> String {
    "POST".to_string()
}

/// What the page asked to upload: everything needed to replay it later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Path and query on the backend, e.g. `/api/photos/upload`
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub fields: FormFields,
}

impl UploadRequest {
    pub fn new(url: impl Into<String>, fields: FormFields) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: Vec::new(),
            fields,
        }
    }
}

/// One deferred upload, as stored in the queue directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub fields: FormFields,
    /// Milliseconds since the Unix epoch
    pub enqueued_at: i64,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl UploadJob {
    pub fn new(request: UploadRequest) -> Self {
        let enqueued_at = next_enqueue_time();
        Self {
            id: generate_job_id(enqueued_at),
            url: request.url,
            method: request.method,
            headers: request.headers,
            fields: request.fields,
            enqueued_at,
            status: JobStatus::Queued,
            attempts: 0,
            last_error: None,
        }
    }

    /// Record a failed replay attempt
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.attempts += 1;
        self.last_error = Some(error.into());
    }
}

static LAST_ENQUEUE_MS: AtomicI64 = AtomicI64::new(0);

/// Current time in milliseconds, strictly increasing within the process so
/// ids never tie
fn next_enqueue_time() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_ENQUEUE_MS.load(Ordering::SeqCst);
    loop {
        let next = now.max(last + 1);
        match LAST_ENQUEUE_MS.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Creation-time id: zero-padded milliseconds so ids sort in enqueue order,
/// plus a random suffix so two jobs in the same millisecond never collide
pub fn generate_job_id(enqueued_at_ms: i64) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{:013}-{}", enqueued_at_ms.max(0), &suffix[..8])
}

/// Ids are used as file names: reject anything that could escape the queue dir
pub fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
