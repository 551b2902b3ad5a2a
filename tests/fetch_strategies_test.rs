// Fetch strategy tests
//
// Each request category against a scripted backend that can be switched
// offline.

mod common;

use common::{
    activated_agent, build_agent, get, get_image, photo_fields, test_config, upload_request,
    ScriptedNetwork,
};
use offline_agent::agent::{GENERIC_OFFLINE_BODY, PHOTO_OFFLINE_BODY, STATIC_OFFLINE_BODY};
use offline_agent::network::NetworkRequest;
use offline_agent::response::ResponseSource;
use tempfile::TempDir;

#[tokio::test]
async fn test_static_is_cache_first_after_first_fetch() {
    let test = activated_agent().await;
    test.network.route("/css/theme.css", 200, "text/css", "h1 { color: red }");

    let first = test.agent.handle_fetch(get("/css/theme.css")).await;
    assert_eq!(first.status, 200);
    assert_eq!(first.source(), ResponseSource::Network);

    let second = test.agent.handle_fetch(get("/css/theme.css")).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.source(), ResponseSource::Cache);
    assert_eq!(second.body, first.body);

    // The second request never reached the backend
    assert_eq!(test.network.request_count("/css/theme.css"), 1);
}

#[tokio::test]
async fn test_precached_static_served_offline() {
    let test = activated_agent().await;
    test.network.set_online(false);

    let response = test.agent.handle_fetch(get("/css/styles.css")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.source(), ResponseSource::Cache);
    assert_eq!(&response.body[..], b"body { margin: 0 }");
}

#[tokio::test]
async fn test_static_miss_offline_is_503() {
    let test = activated_agent().await;
    test.network.set_online(false);

    let response = test.agent.handle_fetch(get("/js/never-seen.js")).await;
    assert_eq!(response.status, 503);
    assert_eq!(response.source(), ResponseSource::Synthetic);
    assert_eq!(&response.body[..], STATIC_OFFLINE_BODY.as_bytes());
}

#[tokio::test]
async fn test_static_error_responses_are_not_cached() {
    let test = activated_agent().await;
    test.network.route("/css/broken.css", 500, "text/plain", "oops");

    let first = test.agent.handle_fetch(get("/css/broken.css")).await;
    assert_eq!(first.status, 500);

    test.network.route("/css/broken.css", 200, "text/css", "fixed");
    let second = test.agent.handle_fetch(get("/css/broken.css")).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.source(), ResponseSource::Network);
}

#[tokio::test]
async fn test_photo_is_network_first_with_cache_fallback() {
    let test = activated_agent().await;
    test.network.route("/uploads/7.jpg", 200, "image/jpeg", "v1");

    let online = test.agent.handle_fetch(get("/uploads/7.jpg")).await;
    assert_eq!(&online.body[..], b"v1");

    // A newer copy overwrites the cached one
    test.network.route("/uploads/7.jpg", 200, "image/jpeg", "v2");
    let refreshed = test.agent.handle_fetch(get("/uploads/7.jpg")).await;
    assert_eq!(&refreshed.body[..], b"v2");
    assert_eq!(refreshed.source(), ResponseSource::Network);
    assert_eq!(test.network.request_count("/uploads/7.jpg"), 2);

    test.network.set_online(false);
    let offline = test.agent.handle_fetch(get("/uploads/7.jpg")).await;
    assert_eq!(offline.status, 200);
    assert_eq!(offline.source(), ResponseSource::Cache);
    assert_eq!(&offline.body[..], b"v2");
}

#[tokio::test]
async fn test_image_destination_uses_photo_strategy() {
    let test = activated_agent().await;
    test.network.route("/api/photos/3/thumb", 200, "image/webp", "thumb");

    test.agent.handle_fetch(get_image("/api/photos/3/thumb")).await;
    test.network.set_online(false);

    let offline = test.agent.handle_fetch(get_image("/api/photos/3/thumb")).await;
    assert_eq!(offline.status, 200);
    assert_eq!(&offline.body[..], b"thumb");
}

#[tokio::test]
async fn test_uncached_photo_offline_is_503() {
    let test = activated_agent().await;
    test.network.set_online(false);

    let response = test.agent.handle_fetch(get("/photo-files/99/full.jpg")).await;
    assert_eq!(response.status, 503);
    assert_eq!(&response.body[..], PHOTO_OFFLINE_BODY.as_bytes());
}

#[tokio::test]
async fn test_api_is_never_cached() {
    let test = activated_agent().await;
    test.network
        .route("/api/locations", 200, "application/json", r#"{"locations":[{"id":1}]}"#);

    let online = test.agent.handle_fetch(get("/api/locations")).await;
    assert_eq!(online.status, 200);

    test.network.set_online(false);
    let offline = test.agent.handle_fetch(get("/api/locations")).await;
    assert_eq!(offline.status, 503);
    assert_eq!(offline.source(), ResponseSource::Synthetic);
}

#[tokio::test]
async fn test_offline_collections_get_empty_payload() {
    let test = activated_agent().await;
    test.network.set_online(false);

    let locations = test.agent.handle_fetch(get("/api/locations?limit=20")).await;
    assert_eq!(locations.status, 503);
    assert_eq!(
        locations.json_body().unwrap(),
        serde_json::json!({"locations": [], "offline": true})
    );

    let photos = test.agent.handle_fetch(get("/api/photos/12")).await;
    assert_eq!(
        photos.json_body().unwrap(),
        serde_json::json!({"photos": [], "offline": true})
    );

    let other = test.agent.handle_fetch(get("/api/users/me")).await;
    assert_eq!(other.status, 503);
    assert_eq!(
        other.json_body().unwrap(),
        serde_json::json!({"error": "Network unavailable", "offline": true})
    );
}

#[tokio::test]
async fn test_api_error_status_passes_through() {
    let test = activated_agent().await;
    test.network
        .route("/api/locations/404", 404, "application/json", r#"{"error":"not found"}"#);

    let response = test.agent.handle_fetch(get("/api/locations/404")).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.source(), ResponseSource::Network);
}

#[tokio::test]
async fn test_generic_offline_falls_back_to_last_copy_or_503() {
    let test = activated_agent().await;
    test.network.route("/about", 200, "text/html", "<p>about</p>");

    test.agent.handle_fetch(get("/about")).await;
    test.network.set_online(false);

    let cached = test.agent.handle_fetch(get("/about")).await;
    assert_eq!(cached.status, 200);
    assert_eq!(cached.source(), ResponseSource::Cache);

    let missing = test.agent.handle_fetch(get("/contact")).await;
    assert_eq!(missing.status, 503);
    assert_eq!(&missing.body[..], GENERIC_OFFLINE_BODY.as_bytes());
}

#[tokio::test]
async fn test_non_get_static_request_is_not_cached() {
    let test = activated_agent().await;
    test.network.route("/css/styles.css", 200, "text/css", "posted");

    let mut request = NetworkRequest::get("/css/styles.css");
    request.method = http::Method::POST;
    let response = test.agent.handle_fetch(request).await;
    assert_eq!(response.source(), ResponseSource::Network);
    assert_eq!(&response.body[..], b"posted");

    // The precached copy is still what GET serves
    let cached = test.agent.handle_fetch(get("/css/styles.css")).await;
    assert_eq!(&cached.body[..], b"body { margin: 0 }");

    // Offline, the POST gets the static fallback rather than the cached copy
    test.network.set_online(false);
    let mut request = NetworkRequest::get("/css/styles.css");
    request.method = http::Method::POST;
    let offline = test.agent.handle_fetch(request).await;
    assert_eq!(offline.status, 503);
    assert_eq!(offline.source(), ResponseSource::Synthetic);
    assert_eq!(&offline.body[..], STATIC_OFFLINE_BODY.as_bytes());
}

#[tokio::test]
async fn test_non_get_offline_body_follows_category() {
    let test = activated_agent().await;
    test.network.set_online(false);

    let mut photo = get_image("/uploads/3/full.jpg");
    photo.method = http::Method::DELETE;
    let response = test.agent.handle_fetch(photo).await;
    assert_eq!(response.status, 503);
    assert_eq!(&response.body[..], PHOTO_OFFLINE_BODY.as_bytes());

    let mut page = get("/profile/settings");
    page.method = http::Method::PUT;
    let response = test.agent.handle_fetch(page).await;
    assert_eq!(response.status, 503);
    assert_eq!(&response.body[..], GENERIC_OFFLINE_BODY.as_bytes());
}

#[tokio::test]
async fn test_pages_before_activation_get_category_offline_body() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let network = ScriptedNetwork::new();
    network.set_online(false);
    let test = build_agent(dir, config, network).await;

    let response = test.agent.handle_fetch(get("/css/late.css")).await;
    assert_eq!(response.status, 503);
    assert_eq!(&response.body[..], STATIC_OFFLINE_BODY.as_bytes());
}

#[tokio::test]
async fn test_upload_before_activation_is_queued() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let network = ScriptedNetwork::new();
    network.set_online(false);
    let test = build_agent(dir, config, network).await;

    let response = test.agent.handle_fetch(upload_request(&photo_fields("8"))).await;
    assert_eq!(response.status, 202);
    assert_eq!(
        response.json_body().unwrap(),
        serde_json::json!({"success": true, "queued": true})
    );
    assert_eq!(test.agent.queue().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_requests_before_activation_pass_through() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let network = ScriptedNetwork::new();
    network.route("/css/late.css", 200, "text/css", "late");
    let test = build_agent(dir, config, network).await;

    let response = test.agent.handle_fetch(get("/css/late.css")).await;
    assert_eq!(response.status, 200);

    test.agent.install().await.unwrap();
    test.agent.activate().await.unwrap();
    test.network.set_online(false);

    // Nothing was cached before activation
    let offline = test.agent.handle_fetch(get("/css/late.css")).await;
    assert_eq!(offline.status, 503);
}

#[tokio::test]
async fn test_connectivity_follows_traffic() {
    let test = activated_agent().await;
    assert!(test.agent.connectivity().is_online());

    test.network.set_online(false);
    test.agent.handle_fetch(get("/api/locations")).await;
    assert!(!test.agent.connectivity().is_online());

    test.network.set_online(true);
    test.agent.handle_fetch(get("/api/locations")).await;
    assert!(test.agent.connectivity().is_online());
}
