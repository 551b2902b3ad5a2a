//! HTTP listener
//!
//! Requests under `/__offline/` are control requests from the page; every
//! other request is a fetch event for the agent.

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::agent::OfflineAgent;
use crate::constants::{CONTROL_PREFIX, MAX_REQUEST_BODY_BYTES, SHUTDOWN_GRACE_SECS};
use crate::error::AgentError;
use crate::network::NetworkRequest;
use crate::response::HttpResponse;

mod control;

pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

pub struct AgentServer {
    agent: Arc<OfflineAgent>,
    listener: TcpListener,
}

impl AgentServer {
    /// Bind the listener. Port 0 picks a free port.
    pub async fn bind(agent: Arc<OfflineAgent>, addr: &str) -> Result<Self, AgentError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AgentError::Internal(format!("failed to bind {}: {}", addr, e)))?;
        Ok(Self { agent, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AgentError> {
        self.listener
            .local_addr()
            .map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// Accept connections until `shutdown` flips to true, then give open
    /// connections a grace period to finish
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), AgentError> {
        let addr = self.local_addr()?;
        tracing::info!(address = %addr, "Listening");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    let agent = Arc::clone(&self.agent);
                    let conn_shutdown = shutdown.clone();
                    connections.spawn(serve_connection(agent, stream, peer, conn_shutdown));
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        tracing::info!(open_connections = connections.len(), "Shutting down listener");
        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), drain)
            .await
            .is_err()
        {
            tracing::warn!("Connections still open after grace period, closing");
        }
        Ok(())
    }
}

async fn serve_connection(
    agent: Arc<OfflineAgent>,
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) {
    let service_shutdown = shutdown.clone();
    let service = service_fn(move |req: Request<Incoming>| {
        let agent = Arc::clone(&agent);
        let shutdown = service_shutdown.clone();
        async move { Ok::<_, Infallible>(route(agent, req, shutdown).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);
    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown_requested(&mut shutdown) => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        tracing::debug!(peer = %peer, error = %e, "Connection closed with error");
    }
}

/// Resolves once shutdown is signalled (or the signal sender is gone)
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn route(
    agent: Arc<OfflineAgent>,
    req: Request<Incoming>,
    shutdown: watch::Receiver<bool>,
) -> Response<ResponseBody> {
    if req.uri().path().starts_with(CONTROL_PREFIX) {
        return control::handle(agent, req, shutdown).await;
    }

    let request = match read_request(req).await {
        Ok(request) => request,
        Err(response) => return response,
    };
    into_hyper(agent.handle_fetch(request).await)
}

/// Buffer a hyper request into the agent's request type
pub(crate) async fn read_request(
    req: Request<Incoming>,
) -> Result<NetworkRequest, Response<ResponseBody>> {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = match Limited::new(body, MAX_REQUEST_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(path = %path_and_query, error = %e, "Failed to read request body");
            return Err(into_hyper(HttpResponse::text(413, "Request body too large or unreadable")));
        }
    };

    Ok(NetworkRequest {
        method: parts.method,
        path_and_query,
        headers,
        body,
    })
}

pub(crate) fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into()).boxed_unsync()
}

/// Convert an agent response into a hyper response
pub(crate) fn into_hyper(response: HttpResponse) -> Response<ResponseBody> {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    match builder.body(full_body(response.body.clone())) {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(status = response.status, error = %e, "Invalid response, answering 502");
            let mut fallback = Response::new(full_body(Bytes::from_static(b"Bad Gateway")));
            *fallback.status_mut() = hyper::StatusCode::BAD_GATEWAY;
            fallback
        }
    }
}
