//! Cache configuration types
//!
//! This module defines configuration for the response cache store:
//! - Cache version (drives cache names and rollover)
//! - Backend selection (disk or memory)
//! - Install-time precache list

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_CACHE_DIR, DEFAULT_CACHE_VERSION, DEFAULT_PLACEHOLDER_MARKERS, DEFAULT_PRECACHE,
};

/// Storage backend for the response caches
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// One directory per cache name; survives restarts
    #[default]
    Disk,
    /// moka in-process caches; dropped on exit
    Memory,
}

/// Main cache configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Version folded into every cache name
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub backend: CacheBackend,
    /// Root directory for the disk backend
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Upper bound per cache for the memory backend
    #[serde(default = "default_max_cache_size_mb")]
    pub max_cache_size_mb: u64,
    /// Static asset paths fetched and stored at install time
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,
    /// Precache entries containing any of these are skipped
    #[serde(default = "default_placeholder_markers")]
    pub placeholder_markers: Vec<String>,
}

fn default_version() -> String {
    DEFAULT_CACHE_VERSION.to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_max_cache_size_mb() -> u64 {
    256
}

fn default_precache() -> Vec<String> {
    DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect()
}

fn default_placeholder_markers() -> Vec<String> {
    DEFAULT_PLACEHOLDER_MARKERS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            backend: CacheBackend::default(),
            directory: default_directory(),
            max_cache_size_mb: default_max_cache_size_mb(),
            precache: default_precache(),
            placeholder_markers: default_placeholder_markers(),
        }
    }
}

impl CacheConfig {
    /// Convert max_cache_size_mb to bytes
    pub fn max_cache_size_bytes(&self) -> u64 {
        self.max_cache_size_mb * 1024 * 1024
    }

    /// True if a precache entry still carries an unresolved placeholder
    pub fn has_placeholder(&self, entry: &str) -> bool {
        self.placeholder_markers
            .iter()
            .any(|marker| !marker.is_empty() && entry.contains(marker.as_str()))
    }

    /// Validate cache configuration
    pub fn validate(&self) -> Result<(), String> {
        let version = self.version.trim();
        if version.is_empty() {
            return Err("cache.version cannot be empty".to_string());
        }
        if version.contains('/') || version.contains('\\') {
            return Err(format!(
                "cache.version '{}' cannot contain path separators",
                self.version
            ));
        }
        if self.backend == CacheBackend::Memory && self.max_cache_size_mb == 0 {
            return Err("cache.max_cache_size_mb must be > 0 for the memory backend".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_defaults() {
        let config: CacheConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.version, "v1");
        assert_eq!(config.backend, CacheBackend::Disk);
        assert!(config.precache.contains(&"/css/styles.css".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_parses_lowercase() {
        let config: CacheConfig = serde_yaml::from_str("backend: memory").unwrap();
        assert_eq!(config.backend, CacheBackend::Memory);
    }

    #[test]
    fn test_has_placeholder() {
        let config = CacheConfig::default();
        assert!(config.has_placeholder("https://maps.example.com/js?key=YOUR_API_KEY"));
        assert!(config.has_placeholder("/js/{{MAPS_KEY}}.js"));
        assert!(!config.has_placeholder("/js/app.js"));
    }

    #[test]
    fn test_empty_version_is_rejected() {
        let config = CacheConfig {
            version: "  ".to_string(),
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
