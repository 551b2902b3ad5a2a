//! Request classifier
//!
//! Maps every intercepted request to exactly one category. The function is
//! pure: it looks at the method, the path and the declared destination only.
//!
//! Precedence when several rules match:
//! 1. `PhotoUpload` (POST to the upload endpoint)
//! 2. `Static`
//! 3. `Photo`
//! 4. `Api`
//! 5. `Generic`

use http::Method;
use std::fmt;

use crate::config::RouteRules;

/// Strategy category of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCategory {
    Static,
    Photo,
    Api,
    PhotoUpload,
    Generic,
}

impl RequestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::Static => "static",
            RequestCategory::Photo => "photo",
            RequestCategory::Api => "api",
            RequestCategory::PhotoUpload => "photo-upload",
            RequestCategory::Generic => "generic",
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared destination of a request (`Sec-Fetch-Dest`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    Image,
    Document,
    Script,
    Style,
    #[default]
    Other,
}

impl Destination {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("image") => Destination::Image,
            Some("document") => Destination::Document,
            Some("script") => Destination::Script,
            Some("style") => Destination::Style,
            _ => Destination::Other,
        }
    }
}

/// The parts of a request the classifier looks at
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    pub method: &'a Method,
    /// Path without query string
    pub path: &'a str,
    pub destination: Destination,
}

impl<'a> RequestInfo<'a> {
    pub fn new(method: &'a Method, path: &'a str, destination: Destination) -> Self {
        Self {
            method,
            path: path.split_once('?').map(|(p, _)| p).unwrap_or(path),
            destination,
        }
    }
}

/// Classify a request. Total: every request gets exactly one category.
pub fn classify(rules: &RouteRules, request: &RequestInfo<'_>) -> RequestCategory {
    if *request.method == Method::POST && request.path == rules.upload_endpoint {
        return RequestCategory::PhotoUpload;
    }
    if is_static(rules, request.path) {
        return RequestCategory::Static;
    }
    if request.destination == Destination::Image || is_photo(rules, request.path) {
        return RequestCategory::Photo;
    }
    if is_api(rules, request.path) {
        return RequestCategory::Api;
    }
    RequestCategory::Generic
}

fn is_static(rules: &RouteRules, path: &str) -> bool {
    if rules.static_paths.iter().any(|p| p == path) {
        return true;
    }
    if let Some(ext) = extension(path) {
        if rules
            .static_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
        {
            return true;
        }
    }
    rules
        .static_segments
        .iter()
        .any(|segment| path.contains(segment.as_str()))
}

fn is_photo(rules: &RouteRules, path: &str) -> bool {
    rules
        .photo_segments
        .iter()
        .any(|segment| path.contains(segment.as_str()))
}

fn is_api(rules: &RouteRules, path: &str) -> bool {
    path.starts_with(rules.api_prefix.as_str()) || path == rules.api_prefix.trim_end_matches('/')
}

/// Extension of the last path segment, without the dot
fn extension(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn classify_path(method: Method, path: &str, destination: Destination) -> RequestCategory {
        let rules = RouteRules::default();
        classify(&rules, &RequestInfo::new(&method, path, destination))
    }

    #[rstest]
    #[case::css_file("/css/styles.css", RequestCategory::Static)]
    #[case::root("/", RequestCategory::Static)]
    #[case::index("/index.html", RequestCategory::Static)]
    #[case::manifest("/manifest.json", RequestCategory::Static)]
    #[case::script_extension("/app/main.js", RequestCategory::Static)]
    #[case::icon_dir("/icons/icon-192.png", RequestCategory::Static)]
    #[case::font_upper_ext("/assets/Font.WOFF2", RequestCategory::Static)]
    #[case::upload_dir("/uploads/abc.jpg", RequestCategory::Photo)]
    #[case::photo_files_dir("/photo-files/7/full.webp", RequestCategory::Photo)]
    #[case::api_locations("/api/locations", RequestCategory::Api)]
    #[case::api_photo_list("/api/photos/12", RequestCategory::Api)]
    #[case::api_bare("/api", RequestCategory::Api)]
    #[case::other_page("/about", RequestCategory::Generic)]
    #[case::apix_is_not_api("/apix/thing", RequestCategory::Generic)]
    fn test_get_classification(#[case] path: &str, #[case] expected: RequestCategory) {
        assert_eq!(classify_path(Method::GET, path, Destination::Other), expected);
    }

    #[test]
    fn test_upload_requires_post() {
        assert_eq!(
            classify_path(Method::POST, "/api/photos/upload", Destination::Other),
            RequestCategory::PhotoUpload
        );
        assert_eq!(
            classify_path(Method::GET, "/api/photos/upload", Destination::Other),
            RequestCategory::Api
        );
        assert_eq!(
            classify_path(Method::PUT, "/api/photos/upload", Destination::Other),
            RequestCategory::Api
        );
    }

    #[test]
    fn test_upload_endpoint_ignores_query() {
        assert_eq!(
            classify_path(Method::POST, "/api/photos/upload?location=3", Destination::Other),
            RequestCategory::PhotoUpload
        );
    }

    #[test]
    fn test_image_destination_makes_photo() {
        assert_eq!(
            classify_path(Method::GET, "/api/photos/12/thumbnail", Destination::Image),
            RequestCategory::Photo
        );
    }

    #[test]
    fn test_static_wins_over_photo() {
        // An image under a static directory is an app asset, not a user photo
        assert_eq!(
            classify_path(Method::GET, "/icons/logo.png", Destination::Image),
            RequestCategory::Static
        );
        assert_eq!(
            classify_path(Method::GET, "/static/uploads/x.png", Destination::Other),
            RequestCategory::Static
        );
    }

    #[test]
    fn test_photo_wins_over_api() {
        assert_eq!(
            classify_path(Method::GET, "/api/uploads/1.jpg", Destination::Other),
            RequestCategory::Photo
        );
    }

    #[test]
    fn test_destination_header_parsing() {
        assert_eq!(Destination::from_header(Some("image")), Destination::Image);
        assert_eq!(Destination::from_header(Some(" Image ")), Destination::Image);
        assert_eq!(Destination::from_header(Some("empty")), Destination::Other);
        assert_eq!(Destination::from_header(None), Destination::Other);
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/css/a.css"), Some("css"));
        assert_eq!(extension("/.hidden"), None);
        assert_eq!(extension("/dir.d/file"), None);
        assert_eq!(extension("/"), None);
    }
}
