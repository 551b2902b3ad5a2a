//! reqwest-backed network

use async_trait::async_trait;
use std::time::Duration;

use super::{is_hop_by_hop, Network, NetworkError, NetworkRequest};
use crate::config::UpstreamConfig;
use crate::response::HttpResponse;

/// Forwards requests to the configured backend origin
pub struct HttpNetwork {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNetwork {
    pub fn new(config: &UpstreamConfig) -> Result<Self, NetworkError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("offline-agent/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| NetworkError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{}", self.base_url, path_and_query)
        } else {
            format!("{}/{}", self.base_url, path_and_query)
        }
    }
}

fn classify_error(err: reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout(err.to_string())
    } else if err.is_connect() {
        NetworkError::Connect(err.to_string())
    } else {
        NetworkError::Other(err.to_string())
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: NetworkRequest) -> Result<HttpResponse, NetworkError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| NetworkError::Other(format!("unsupported method: {}", e)))?;
        let url = self.url_for(&request.path_and_query);

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(classify_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(classify_error)?;

        tracing::debug!(
            method = %request.method,
            url = %url,
            status = status,
            body_bytes = body.len(),
            "Backend responded"
        );

        Ok(HttpResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let network = HttpNetwork::new(&UpstreamConfig::new("http://localhost:3000/")).unwrap();
        assert_eq!(network.url_for("/api/locations"), "http://localhost:3000/api/locations");
        assert_eq!(network.url_for("api/x"), "http://localhost:3000/api/x");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_network_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let mut config = UpstreamConfig::new("http://127.0.0.1:9");
        config.timeout_seconds = Some(2);
        let network = HttpNetwork::new(&config).unwrap();

        let result = network.fetch(NetworkRequest::get("/api/health")).await;
        assert!(result.is_err());
    }
}
