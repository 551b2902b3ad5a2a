// Shared test utilities: a scripted backend and agent builders

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use offline_agent::agent::OfflineAgent;
use offline_agent::cache::disk::DiskCacheStorage;
use offline_agent::cache::{CacheBackend, CacheStorage, MemoryCacheStorage};
use offline_agent::config::Config;
use offline_agent::network::{Network, NetworkError, NetworkRequest};
use offline_agent::queue::{FormField, FormFields, UploadQueue};
use offline_agent::response::HttpResponse;

pub const BROWSER_BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

/// In-memory backend with a connectivity switch
///
/// Routes are matched on path and query first, then on path alone.
/// Unknown paths answer 404.
pub struct ScriptedNetwork {
    online: AtomicBool,
    routes: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<NetworkRequest>>,
}

impl ScriptedNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn route(&self, path: &str, status: u16, content_type: &str, body: &str) {
        self.routes.lock().insert(
            path.to_string(),
            HttpResponse::new(
                status,
                vec![("content-type".to_string(), content_type.to_string())],
                Bytes::from(body.to_string()),
            ),
        );
    }

    /// Routes for the default precache list
    pub fn route_app_shell(&self) {
        self.route("/", 200, "text/html", "<html>home</html>");
        self.route("/index.html", 200, "text/html", "<html>home</html>");
        self.route("/css/styles.css", 200, "text/css", "body { margin: 0 }");
        self.route("/js/app.js", 200, "application/javascript", "console.log('app')");
        self.route("/manifest.json", 200, "application/manifest+json", "{\"name\":\"Locations\"}");
    }

    /// Requests that reached the backend (offline attempts are not recorded)
    pub fn requests(&self) -> Vec<NetworkRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path_and_query == path)
            .count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: NetworkRequest) -> Result<HttpResponse, NetworkError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(NetworkError::Connect("network is offline".to_string()));
        }
        let response = {
            let routes = self.routes.lock();
            routes
                .get(&request.path_and_query)
                .or_else(|| routes.get(request.path()))
                .cloned()
        };
        self.requests.lock().push(request);
        Ok(response.unwrap_or_else(|| {
            HttpResponse::new(404, Vec::new(), Bytes::from_static(b"Not Found"))
        }))
    }
}

/// An agent over a scripted backend, with its state in a temp directory
pub struct TestAgent {
    pub agent: Arc<OfflineAgent>,
    pub network: Arc<ScriptedNetwork>,
    pub dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::with_upstream("http://backend.test");
    config.cache.directory = dir.path().join("caches");
    config.queue.directory = dir.path().join("uploads");
    config
}

pub async fn build_agent(dir: TempDir, config: Config, network: Arc<ScriptedNetwork>) -> TestAgent {
    let storage: Arc<dyn CacheStorage> = match config.cache.backend {
        CacheBackend::Disk => Arc::new(DiskCacheStorage::new(config.cache.directory.clone())),
        CacheBackend::Memory => {
            Arc::new(MemoryCacheStorage::new(config.cache.max_cache_size_bytes()))
        }
    };
    let queue = UploadQueue::open(config.queue.directory.clone()).await.unwrap();
    let agent = OfflineAgent::new(config, storage, queue, network.clone());
    TestAgent {
        agent: Arc::new(agent),
        network,
        dir,
    }
}

/// Installed and activated agent with default configuration and the app
/// shell routed on the backend
pub async fn activated_agent() -> TestAgent {
    activated_agent_with(|_| {}).await
}

pub async fn activated_agent_with(customize: impl FnOnce(&mut Config)) -> TestAgent {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    customize(&mut config);

    let network = ScriptedNetwork::new();
    network.route_app_shell();
    let test = build_agent(dir, config, network).await;
    test.agent.install().await.unwrap();
    test.agent.activate().await.unwrap();
    test.network.clear_requests();
    test
}

pub fn get(path: &str) -> NetworkRequest {
    NetworkRequest::get(path)
}

pub fn get_image(path: &str) -> NetworkRequest {
    let mut request = NetworkRequest::get(path);
    request
        .headers
        .push(("sec-fetch-dest".to_string(), "image".to_string()));
    request
}

pub fn photo_fields(location_id: &str) -> FormFields {
    FormFields::new(vec![
        FormField::text("locationId", location_id),
        FormField::text("caption", "North entrance"),
        FormField::file(
            "photo",
            "entrance.jpg",
            "image/jpeg",
            vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 0xFF, 0xD9],
        ),
    ])
}

/// Multipart upload POST the way a browser form would send it
pub fn upload_request(fields: &FormFields) -> NetworkRequest {
    NetworkRequest {
        method: http::Method::POST,
        path_and_query: "/api/photos/upload".to_string(),
        headers: vec![
            (
                "content-type".to_string(),
                format!("multipart/form-data; boundary={}", BROWSER_BOUNDARY),
            ),
            ("authorization".to_string(), "Bearer session-token".to_string()),
            ("content-length".to_string(), "999".to_string()),
        ],
        body: fields.encode_multipart(BROWSER_BOUNDARY),
    }
}
