//! Fetch handling: one strategy per request category

use http::Method;
use serde_json::json;

use super::OfflineAgent;
use crate::cache::{CacheEntry, CacheKey, CacheKind};
use crate::classifier::{classify, Destination, RequestCategory, RequestInfo};
use crate::metrics::AgentMetrics;
use crate::network::{is_hop_by_hop, NetworkRequest};
use crate::queue::{FormFields, UploadRequest};
use crate::response::{HttpResponse, ResponseSource};

pub const STATIC_OFFLINE_BODY: &str = "Offline - resource not available";
pub const PHOTO_OFFLINE_BODY: &str = "Photo not available offline";
pub const GENERIC_OFFLINE_BODY: &str = "Offline";
pub const UPLOAD_NOT_QUEUED_ERROR: &str = "Upload body is not multipart form data";

/// Plain-text body returned when a request of this category cannot reach
/// the network and nothing cached can stand in
pub fn offline_body(category: RequestCategory) -> &'static str {
    match category {
        RequestCategory::Static => STATIC_OFFLINE_BODY,
        RequestCategory::Photo => PHOTO_OFFLINE_BODY,
        _ => GENERIC_OFFLINE_BODY,
    }
}

impl OfflineAgent {
    /// Answer one intercepted request. Always produces a response.
    pub async fn handle_fetch(&self, request: NetworkRequest) -> HttpResponse {
        let destination = Destination::from_header(request.header("sec-fetch-dest"));
        let category = classify(
            &self.config.routes,
            &RequestInfo::new(&request.method, request.path(), destination),
        );
        let metrics = AgentMetrics::global();
        let _timer = metrics.start_fetch_timer(category.as_str());

        tracing::debug!(
            method = %request.method,
            path = %request.path_and_query,
            category = %category,
            "Handling fetch"
        );

        let is_get = request.method == Method::GET;
        // API calls and uploads never touch the caches, so they keep their
        // strategies before activation
        let response = match category {
            RequestCategory::Api => self.network_only_api(request).await,
            RequestCategory::PhotoUpload => self.upload_or_queue(request).await,
            _ if !self.is_activated() => self.network_or_offline(request, category).await,
            RequestCategory::Static if is_get => self.cache_first(request).await,
            RequestCategory::Photo if is_get => self.photo_network_first(request).await,
            _ if is_get => self.generic_network_first(request).await,
            _ => self.network_or_offline(request, category).await,
        };

        metrics.record_response(category.as_str(), response.source().as_str());
        response
    }

    /// Static assets: serve from cache, fill the cache on a miss
    async fn cache_first(&self, request: NetworkRequest) -> HttpResponse {
        let key = CacheKey::new(request.path_and_query.as_str());
        if let Some(cached) = self.cache_lookup(CacheKind::Static, &key).await {
            return cached;
        }

        match self.fetch_network(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.cache_store(CacheKind::Static, key, &response).await;
                }
                response
            }
            Err(e) => {
                self.record_network_failure(RequestCategory::Static, &e);
                HttpResponse::text(503, STATIC_OFFLINE_BODY)
            }
        }
    }

    /// Photos: always try the network, keep the latest copy for offline use
    async fn photo_network_first(&self, request: NetworkRequest) -> HttpResponse {
        let key = CacheKey::new(request.path_and_query.as_str());
        match self.fetch_network(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.cache_store(CacheKind::Photos, key, &response).await;
                }
                response
            }
            Err(e) => {
                self.record_network_failure(RequestCategory::Photo, &e);
                match self.cache_lookup(CacheKind::Photos, &key).await {
                    Some(cached) => cached,
                    None => HttpResponse::text(503, PHOTO_OFFLINE_BODY),
                }
            }
        }
    }

    /// API calls are never cached. Offline collections degrade to an empty
    /// list so list views still render.
    async fn network_only_api(&self, request: NetworkRequest) -> HttpResponse {
        let path = request.path().to_string();
        match self.fetch_network(request).await {
            Ok(response) => response,
            Err(e) => {
                self.record_network_failure(RequestCategory::Api, &e);
                match self.config.routes.offline_collection(&path) {
                    Some(collection) => {
                        let mut body = serde_json::Map::new();
                        body.insert(collection.to_string(), json!([]));
                        body.insert("offline".to_string(), json!(true));
                        HttpResponse::json(503, &serde_json::Value::Object(body))
                    }
                    None => HttpResponse::json(
                        503,
                        &json!({"error": "Network unavailable", "offline": true}),
                    ),
                }
            }
        }
    }

    /// Pages and everything else fetched with GET: network first, the last
    /// good copy when offline
    async fn generic_network_first(&self, request: NetworkRequest) -> HttpResponse {
        let key = CacheKey::new(request.path_and_query.as_str());
        match self.fetch_network(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.cache_store(CacheKind::Dynamic, key, &response).await;
                }
                response
            }
            Err(e) => {
                self.record_network_failure(RequestCategory::Generic, &e);
                match self.cache_lookup(CacheKind::Dynamic, &key).await {
                    Some(cached) => cached,
                    None => HttpResponse::text(503, GENERIC_OFFLINE_BODY),
                }
            }
        }
    }

    /// Uncached pass-through used before activation and for non-GET
    /// requests outside the API
    async fn network_or_offline(
        &self,
        request: NetworkRequest,
        category: RequestCategory,
    ) -> HttpResponse {
        match self.fetch_network(request).await {
            Ok(response) => response,
            Err(e) => {
                self.record_network_failure(category, &e);
                HttpResponse::text(503, offline_body(category))
            }
        }
    }

    /// Photo upload: pass a success through, queue anything else
    async fn upload_or_queue(&self, request: NetworkRequest) -> HttpResponse {
        let failure = match self.fetch_network(request.clone()).await {
            Ok(response) if response.is_success() => return response,
            Ok(response) => format!("HTTP {}", response.status),
            Err(e) => {
                self.record_network_failure(RequestCategory::PhotoUpload, &e);
                e.to_string()
            }
        };

        let content_type = request.header("content-type").unwrap_or_default().to_string();
        let fields = match FormFields::decode_multipart(&content_type, request.body.clone()).await
        {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(
                    path = %request.path_and_query,
                    error = %e,
                    "Failed upload could not be queued"
                );
                return HttpResponse::json(
                    503,
                    &json!({"error": UPLOAD_NOT_QUEUED_ERROR, "offline": true}),
                );
            }
        };

        let upload = UploadRequest {
            url: request.path_and_query.clone(),
            method: request.method.as_str().to_string(),
            headers: request
                .headers
                .iter()
                .filter(|(name, _)| !is_hop_by_hop(name))
                .cloned()
                .collect(),
            fields,
        };

        match self.queue.enqueue(upload).await {
            Ok(job) => {
                tracing::info!(
                    job_id = %job.id,
                    reason = %failure,
                    "Upload failed, queued for sync"
                );
                AgentMetrics::global().record_upload("queued");
                self.refresh_queue_depth().await;
                self.registry.register(&self.config.queue.sync_tag);
            }
            Err(e) => {
                // The page is still told the upload was accepted
                tracing::error!(error = %e, reason = %failure, "Failed to persist queued upload");
                AgentMetrics::global().record_upload("lost");
            }
        }

        HttpResponse::json(202, &json!({"success": true, "queued": true}))
    }

    async fn cache_lookup(&self, kind: CacheKind, key: &CacheKey) -> Option<HttpResponse> {
        let name = self.names.get(kind);
        let result = match self.storage.open(name).await {
            Ok(cache) => cache.get(key).await,
            Err(e) => Err(e),
        };
        let hit = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(cache = name, key = %key, error = %e, "Cache lookup failed");
                None
            }
        };
        AgentMetrics::global().record_cache_lookup(kind.as_str(), hit.is_some());
        hit.map(|entry| entry.response.with_source(ResponseSource::Cache))
    }

    async fn cache_store(&self, kind: CacheKind, key: CacheKey, response: &HttpResponse) {
        let name = self.names.get(kind);
        let result = match self.storage.open(name).await {
            Ok(cache) => cache.put(key.clone(), CacheEntry::new(response.clone())).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(cache = name, key = %key, error = %e, "Failed to store response");
        }
    }

    fn record_network_failure(
        &self,
        category: RequestCategory,
        error: &crate::network::NetworkError,
    ) {
        tracing::debug!(category = %category, error = %error, "Network unavailable");
        AgentMetrics::global()
            .network_failures
            .with_label_values(&[category.as_str()])
            .inc();
    }
}
