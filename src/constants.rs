// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers keeps defaults in one place.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_SERVER_PORT: u16 = 8787;

/// Path prefix reserved for the agent's own control endpoints
pub const CONTROL_PREFIX: &str = "/__offline/";

/// Response header marking responses that did not come straight from the network
pub const SOURCE_HEADER: &str = "x-offline-agent";

// =============================================================================
// Upstream defaults
// =============================================================================

/// Default connectivity probe path on the backend
pub const DEFAULT_PROBE_PATH: &str = "/api/health";

// =============================================================================
// Cache defaults
// =============================================================================

/// Default cache version; bumping it invalidates every cache at activation
pub const DEFAULT_CACHE_VERSION: &str = "v1";

/// Prefix shared by every cache name this agent creates
pub const CACHE_NAME_PREFIX: &str = "locations";

/// Default cache directory
pub const DEFAULT_CACHE_DIR: &str = "./offline-data/caches";

/// Assets cached at install time
pub const DEFAULT_PRECACHE: &[&str] = &[
    "/",
    "/index.html",
    "/css/styles.css",
    "/js/app.js",
    "/manifest.json",
];

/// Markers of unresolved credentials; precache entries containing one are skipped
pub const DEFAULT_PLACEHOLDER_MARKERS: &[&str] = &["YOUR_API_KEY", "{{"];

// =============================================================================
// Route defaults
// =============================================================================

/// Default API path prefix
pub const DEFAULT_API_PREFIX: &str = "/api/";

/// Default photo upload endpoint
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "/api/photos/upload";

/// Exact paths treated as static assets
pub const DEFAULT_STATIC_PATHS: &[&str] = &["/", "/index.html", "/manifest.json"];

/// File extensions treated as static assets
pub const DEFAULT_STATIC_EXTENSIONS: &[&str] =
    &["css", "js", "mjs", "woff", "woff2", "ttf", "ico", "webmanifest"];

/// Path segments marking static asset directories
pub const DEFAULT_STATIC_SEGMENTS: &[&str] = &["/css/", "/js/", "/icons/", "/fonts/", "/static/"];

/// Path segments marking photo directories
pub const DEFAULT_PHOTO_SEGMENTS: &[&str] = &["/uploads/", "/photo-files/"];

/// API collections answered with an empty offline payload when unreachable
pub const DEFAULT_OFFLINE_COLLECTIONS: &[&str] = &["locations", "photos"];

// =============================================================================
// Queue and sync defaults
// =============================================================================

/// Default upload queue directory
pub const DEFAULT_QUEUE_DIR: &str = "./offline-data/uploads";

/// Default background sync tag for queued uploads
pub const DEFAULT_SYNC_TAG: &str = "upload-photos";

/// Default interval between connectivity probes while sync tags are pending
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

/// Default number of times a failed sync is re-fired before waiting for a new registration
pub const DEFAULT_MAX_HOST_RETRIES: u32 = 3;

/// Capacity of the client broadcast channel
pub const NOTIFIER_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Server limits
// =============================================================================

/// Largest request body the agent buffers (photo uploads included)
pub const MAX_REQUEST_BODY_BYTES: usize = 32 * 1024 * 1024;

/// How long shutdown waits for open connections to finish
pub const SHUTDOWN_GRACE_SECS: u64 = 10;
