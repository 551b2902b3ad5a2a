// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::cache::CacheConfig;
use crate::logging::LoggingConfig;

pub mod queue;
pub mod routes;
pub mod server;

pub use queue::{QueueConfig, SyncConfig};
pub use routes::RouteRules;
pub use server::{ServerConfig, UpstreamConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub routes: RouteRules,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Build a configuration with defaults for everything but the upstream
    pub fn with_upstream(base_url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::new(base_url),
            cache: CacheConfig::default(),
            routes: RouteRules::default(),
            queue: QueueConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.upstream.validate()?;
        self.cache.validate()?;
        self.routes.validate()?;

        if self.queue.max_attempts == Some(0) {
            return Err("queue.max_attempts must be > 0 when set".to_string());
        }
        if self.queue.sync_tag.trim().is_empty() {
            return Err("queue.sync_tag cannot be empty".to_string());
        }
        if self.sync.probe_interval_seconds == 0 {
            return Err("sync.probe_interval_seconds must be > 0".to_string());
        }
        if self.cache.backend == crate::cache::CacheBackend::Disk {
            // Every directory under the cache root is a cache that activation
            // may delete, so the two trees must not overlap
            let cache_dir = normalize_path(&self.cache.directory);
            let queue_dir = normalize_path(&self.queue.directory);
            if cache_dir.starts_with(&queue_dir) || queue_dir.starts_with(&cache_dir) {
                return Err(format!(
                    "cache.directory '{}' and queue.directory '{}' must not contain each other",
                    self.cache.directory.display(),
                    self.queue.directory.display()
                ));
            }
        }

        Ok(())
    }
}

/// Absolute, lexically normalized form of a configured directory
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_can_be_loaded_from_file_path() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_yaml = r#"
server:
  address: "0.0.0.0"
  port: 9000

upstream:
  base_url: "http://localhost:3000"

cache:
  version: "v7"
  backend: memory
"#;
        temp_file.write_all(config_yaml.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.server.address, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.upstream.base_url, "http://localhost:3000");
        assert_eq!(config.cache.version, "v7");
        assert_eq!(config.routes.upload_endpoint, "/api/photos/upload");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_upstream_is_an_error() {
        let result = Config::from_yaml_with_env("server:\n  port: 9000\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("OFFLINE_AGENT_TEST_BACKEND", "http://backend.internal:8080");
        let config = Config::from_yaml_with_env(
            "upstream:\n  base_url: \"${OFFLINE_AGENT_TEST_BACKEND}\"\n",
        )
        .unwrap();
        assert_eq!(config.upstream.base_url, "http://backend.internal:8080");
    }

    #[test]
    fn test_unset_env_var_is_reported() {
        let err = Config::from_yaml_with_env(
            "upstream:\n  base_url: \"${OFFLINE_AGENT_TEST_NEVER_SET}\"\n",
        )
        .unwrap_err();
        assert!(err.contains("OFFLINE_AGENT_TEST_NEVER_SET"));
    }

    #[test]
    fn test_validate_rejects_zero_max_attempts() {
        let mut config = Config::with_upstream("http://localhost:3000");
        config.queue.max_attempts = Some(0);
        assert!(config.validate().unwrap_err().contains("max_attempts"));
    }

    #[test]
    fn test_validate_rejects_shared_directories() {
        let mut config = Config::with_upstream("http://localhost:3000");
        config.queue.directory = config.cache.directory.clone();
        assert!(config.validate().is_err());
    }

    #[rstest::rstest]
    #[case::queue_inside_cache("./data/caches", "./data/caches/uploads")]
    #[case::cache_inside_queue("data/uploads/caches", "data/uploads")]
    #[case::dot_segments("./data/caches", "data/x/../caches/./uploads")]
    fn test_validate_rejects_nested_directories(#[case] cache: &str, #[case] queue: &str) {
        let mut config = Config::with_upstream("http://localhost:3000");
        config.cache.directory = PathBuf::from(cache);
        config.queue.directory = PathBuf::from(queue);
        assert!(config.validate().unwrap_err().contains("must not contain each other"));
    }

    #[test]
    fn test_validate_accepts_sibling_directories() {
        let mut config = Config::with_upstream("http://localhost:3000");
        config.cache.directory = PathBuf::from("./data/caches");
        config.queue.directory = PathBuf::from("./data/caches-uploads");
        assert!(config.validate().is_ok());

        // Nesting only matters when caches live on disk
        config.cache.backend = crate::cache::CacheBackend::Memory;
        config.queue.directory = PathBuf::from("./data/caches/uploads");
        assert!(config.validate().is_ok());
    }
}
