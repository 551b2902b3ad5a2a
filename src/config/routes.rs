//! Route rules used by the request classifier.
//!
//! Every field has a default from `crate::constants`, so an empty `routes:`
//! section (or none at all) yields the saved-locations app layout.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_PREFIX, DEFAULT_OFFLINE_COLLECTIONS, DEFAULT_PHOTO_SEGMENTS,
    DEFAULT_STATIC_EXTENSIONS, DEFAULT_STATIC_PATHS, DEFAULT_STATIC_SEGMENTS,
    DEFAULT_UPLOAD_ENDPOINT,
};

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.to_string()
}

fn default_upload_endpoint() -> String {
    DEFAULT_UPLOAD_ENDPOINT.to_string()
}

fn default_static_paths() -> Vec<String> {
    to_strings(DEFAULT_STATIC_PATHS)
}

fn default_static_extensions() -> Vec<String> {
    to_strings(DEFAULT_STATIC_EXTENSIONS)
}

fn default_static_segments() -> Vec<String> {
    to_strings(DEFAULT_STATIC_SEGMENTS)
}

fn default_photo_segments() -> Vec<String> {
    to_strings(DEFAULT_PHOTO_SEGMENTS)
}

fn default_offline_collections() -> Vec<String> {
    to_strings(DEFAULT_OFFLINE_COLLECTIONS)
}

/// Path rules that decide which strategy serves a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRules {
    /// API prefix, starts and ends with `/`
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Exact path of the photo upload endpoint (POST only)
    #[serde(default = "default_upload_endpoint")]
    pub upload_endpoint: String,

    /// Exact paths served cache-first
    #[serde(default = "default_static_paths")]
    pub static_paths: Vec<String>,

    /// Extensions (without dot) served cache-first
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// Directory segments served cache-first, e.g. `/css/`
    #[serde(default = "default_static_segments")]
    pub static_segments: Vec<String>,

    /// Directory segments served network-first from the photo cache
    #[serde(default = "default_photo_segments")]
    pub photo_segments: Vec<String>,

    /// API collections answered with `{"<name>": [], "offline": true}` when unreachable
    #[serde(default = "default_offline_collections")]
    pub offline_collections: Vec<String>,
}

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            upload_endpoint: default_upload_endpoint(),
            static_paths: default_static_paths(),
            static_extensions: default_static_extensions(),
            static_segments: default_static_segments(),
            photo_segments: default_photo_segments(),
            offline_collections: default_offline_collections(),
        }
    }
}

impl RouteRules {
    /// Return the offline collection an API path belongs to, if any.
    ///
    /// `/api/locations` and `/api/locations/42` both map to `locations`.
    pub fn offline_collection(&self, path: &str) -> Option<&str> {
        let rest = path.strip_prefix(self.api_prefix.as_str())?;
        let first = rest.split('/').next().unwrap_or_default();
        self.offline_collections
            .iter()
            .find(|name| name.as_str() == first)
            .map(|name| name.as_str())
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.api_prefix.starts_with('/') || !self.api_prefix.ends_with('/') {
            return Err(format!(
                "routes.api_prefix '{}' must start and end with /",
                self.api_prefix
            ));
        }
        if !self.upload_endpoint.starts_with(self.api_prefix.as_str()) {
            return Err(format!(
                "routes.upload_endpoint '{}' must live under api_prefix '{}'",
                self.upload_endpoint, self.api_prefix
            ));
        }
        for segment in self.static_segments.iter().chain(&self.photo_segments) {
            if !segment.starts_with('/') || !segment.ends_with('/') {
                return Err(format!(
                    "route segment '{}' must start and end with /",
                    segment
                ));
            }
        }
        if let Some(ext) = self.static_extensions.iter().find(|e| e.starts_with('.')) {
            return Err(format!(
                "static extension '{}' must not start with a dot",
                ext
            ));
        }
        Ok(())
    }
}
