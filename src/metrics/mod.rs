// Agent Prometheus metrics
//
// Registered once in the default registry and exported as text on
// `GET /__offline/metrics`:
// - fetch outcomes by category and response source
// - cache lookups and network failures
// - upload queue activity and depth

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;

pub struct AgentMetrics {
    /// Responses handed to the page, by category and source
    pub responses: IntCounterVec,

    /// Cache lookups by cache kind and result (hit, miss)
    pub cache_lookups: IntCounterVec,

    /// Requests for which the network produced no response, by category
    pub network_failures: IntCounterVec,

    /// Upload activity by outcome (queued, replayed, failed, abandoned, lost)
    pub uploads: IntCounterVec,

    /// Sync events handled
    pub sync_runs: IntCounter,

    /// Jobs currently in the upload queue
    pub queue_depth: IntGauge,

    /// Subscribed event-stream clients
    pub connected_clients: IntGauge,

    /// 1 while the backend is reachable
    pub online: IntGauge,

    /// Fetch handling duration by category (seconds)
    pub fetch_duration: HistogramVec,
}

static METRICS: OnceLock<AgentMetrics> = OnceLock::new();

impl AgentMetrics {
    /// The process-wide metrics instance, registered on first use
    pub fn global() -> &'static Self {
        METRICS.get_or_init(|| {
            let responses = register_int_counter_vec!(
                "offline_agent_responses_total",
                "Responses returned to the page by request category and source",
                &["category", "source"]
            )
            .expect("Failed to register responses_total metric");

            let cache_lookups = register_int_counter_vec!(
                "offline_agent_cache_lookups_total",
                "Cache lookups by cache kind and result",
                &["cache", "result"] // static|dynamic|photos, hit|miss
            )
            .expect("Failed to register cache_lookups_total metric");

            let network_failures = register_int_counter_vec!(
                "offline_agent_network_failures_total",
                "Requests the backend could not answer, by request category",
                &["category"]
            )
            .expect("Failed to register network_failures_total metric");

            let uploads = register_int_counter_vec!(
                "offline_agent_uploads_total",
                "Photo upload queue activity by outcome",
                &["outcome"]
            )
            .expect("Failed to register uploads_total metric");

            let sync_runs = register_int_counter!(
                "offline_agent_sync_runs_total",
                "Sync events handled"
            )
            .expect("Failed to register sync_runs_total metric");

            let queue_depth = register_int_gauge!(
                "offline_agent_queue_depth",
                "Uploads currently waiting in the queue"
            )
            .expect("Failed to register queue_depth metric");

            let connected_clients = register_int_gauge!(
                "offline_agent_connected_clients",
                "Clients subscribed to the event stream"
            )
            .expect("Failed to register connected_clients metric");

            let online = register_int_gauge!(
                "offline_agent_online",
                "1 while the backend is reachable, 0 otherwise"
            )
            .expect("Failed to register online metric");

            let fetch_duration = register_histogram_vec!(
                "offline_agent_fetch_duration_seconds",
                "Time to answer an intercepted request",
                &["category"],
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
            )
            .expect("Failed to register fetch_duration_seconds metric");

            online.set(1);

            AgentMetrics {
                responses,
                cache_lookups,
                network_failures,
                uploads,
                sync_runs,
                queue_depth,
                connected_clients,
                online,
                fetch_duration,
            }
        })
    }

    pub fn record_response(&self, category: &str, source: &str) {
        self.responses.with_label_values(&[category, source]).inc();
    }

    pub fn record_cache_lookup(&self, cache: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[cache, result]).inc();
    }

    pub fn record_upload(&self, outcome: &str) {
        self.uploads.with_label_values(&[outcome]).inc();
    }

    /// Start timing the handling of one request
    pub fn start_fetch_timer(&self, category: &str) -> HistogramTimer {
        HistogramTimer {
            histogram: self.fetch_duration.with_label_values(&[category]),
            start: std::time::Instant::now(),
        }
    }

    /// Prometheus text exposition of every registered metric
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// RAII timer for histogram metrics
///
/// Records the elapsed time when dropped.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
