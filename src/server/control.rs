//! Control endpoints under `/__offline/`
//!
//! - `POST message`: page-to-agent message, reply in the response body
//! - `GET events`: server-sent event stream of client notifications
//! - `POST sync?tag=<tag>`: fire a sync event now
//! - `GET health`: agent status
//! - `GET metrics`: Prometheus text

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::{Method, Request, Response};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use super::{full_body, into_hyper, read_request, shutdown_requested, ResponseBody};
use crate::agent::{AgentMessage, MessageReply, OfflineAgent};
use crate::constants::CONTROL_PREFIX;
use crate::error::AgentError;
use crate::metrics::AgentMetrics;
use crate::response::HttpResponse;

const ENDPOINTS: &[&str] = &["message", "events", "sync", "health", "metrics"];

pub(super) async fn handle(
    agent: Arc<OfflineAgent>,
    req: Request<Incoming>,
    shutdown: watch::Receiver<bool>,
) -> Response<ResponseBody> {
    let endpoint = req
        .uri()
        .path()
        .trim_start_matches(CONTROL_PREFIX)
        .trim_end_matches('/')
        .to_string();
    let query = req.uri().query().map(str::to_string);
    let method = req.method().clone();

    match (method, endpoint.as_str()) {
        (Method::POST, "message") => message(agent, req).await,
        (Method::GET, "events") => events(&agent, shutdown),
        (Method::POST, "sync") => sync(agent, query.as_deref()).await,
        (Method::GET, "health") => health(agent).await,
        (Method::GET, "metrics") => metrics(),
        (_, name) if ENDPOINTS.contains(&name) => error_response(405, "method not allowed"),
        _ => error_response(404, "unknown control endpoint"),
    }
}

fn error_response(status: u16, message: &str) -> Response<ResponseBody> {
    into_hyper(HttpResponse::json(status, &json!({ "error": message })))
}

fn agent_error(error: AgentError) -> Response<ResponseBody> {
    let status = error.status_code();
    if status >= 500 {
        tracing::error!(error = %error, "Control request failed");
    } else {
        tracing::debug!(error = %error, "Control request rejected");
    }
    error_response(status, &error.to_string())
}

async fn message(agent: Arc<OfflineAgent>, req: Request<Incoming>) -> Response<ResponseBody> {
    let request = match read_request(req).await {
        Ok(request) => request,
        Err(response) => return response,
    };
    let message = match AgentMessage::parse(&request.body) {
        Ok(message) => message,
        Err(e) => return agent_error(e),
    };

    match agent.handle_message(message).await {
        Ok(MessageReply::Accepted) => into_hyper(HttpResponse::new(204, Vec::new(), Bytes::new())),
        Ok(reply) => match reply.to_json() {
            Some(body) => into_hyper(HttpResponse::json(200, &body)),
            None => into_hyper(HttpResponse::new(204, Vec::new(), Bytes::new())),
        },
        Err(e) => agent_error(e),
    }
}

fn events(agent: &OfflineAgent, shutdown: watch::Receiver<bool>) -> Response<ResponseBody> {
    let receiver = agent.notifier().subscribe();
    tracing::debug!(clients = agent.notifier().client_count(), "Client subscribed to events");

    let opening = futures::stream::once(async {
        Ok::<_, Infallible>(Frame::data(Bytes::from_static(b"retry: 3000\n\n")))
    });
    let notifications = futures::stream::unfold(
        (receiver, shutdown),
        |(mut receiver, mut shutdown)| async move {
            loop {
                tokio::select! {
                    received = receiver.recv() => match received {
                        Ok(notification) => {
                            let frame = Frame::data(Bytes::from(notification.to_sse()));
                            return Some((Ok(frame), (receiver, shutdown)));
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped = skipped, "Event stream client fell behind");
                        }
                        Err(RecvError::Closed) => return None,
                    },
                    _ = shutdown_requested(&mut shutdown) => return None,
                }
            }
        },
    );

    let body = StreamBody::new(opening.chain(notifications)).boxed_unsync();
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        hyper::header::CACHE_CONTROL,
        hyper::header::HeaderValue::from_static("no-cache"),
    );
    response
}

/// Percent-decoded `tag` parameter of a control query string
fn query_tag(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "tag")
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}

async fn sync(agent: Arc<OfflineAgent>, query: Option<&str>) -> Response<ResponseBody> {
    let tag = query
        .and_then(query_tag)
        .unwrap_or_else(|| agent.config().queue.sync_tag.clone());

    match agent.handle_sync(&tag).await {
        Ok(report) => match serde_json::to_value(&report) {
            Ok(body) => into_hyper(HttpResponse::json(200, &body)),
            Err(e) => agent_error(AgentError::Internal(e.to_string())),
        },
        Err(e) => agent_error(e),
    }
}

async fn health(agent: Arc<OfflineAgent>) -> Response<ResponseBody> {
    match agent.status().await {
        Ok(status) => match serde_json::to_value(&status) {
            Ok(body) => into_hyper(HttpResponse::json(200, &body)),
            Err(e) => agent_error(AgentError::Internal(e.to_string())),
        },
        Err(e) => agent_error(e),
    }
}

fn metrics() -> Response<ResponseBody> {
    let mut response = Response::new(full_body(AgentMetrics::global().export()));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}
