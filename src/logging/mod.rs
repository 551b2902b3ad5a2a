// Logging module for structured logging using the tracing crate

use serde::{Deserialize, Serialize};
use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Output format of log lines
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, for log aggregation
    #[default]
    Json,
    /// Human readable, for local development
    Pretty,
}

fn default_level() -> String {
    "info".to_string()
}

/// Logging configuration (`logging:` section)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive; `RUST_LOG` takes precedence when set
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_level(),
        }
    }
}

/// Initialize the tracing subscriber with default settings (JSON, `info`)
///
/// See [`init_with_config`].
pub fn init_subscriber() -> Result<(), Box<dyn Error + Send + Sync>> {
    init_with_config(&LoggingConfig::default())
}

/// Initialize the tracing subscriber for structured logging
///
/// The subscriber is configured with:
/// - JSON or pretty formatting
/// - Filtering from `RUST_LOG`, falling back to the configured level
/// - Output to stdout for container deployments
///
/// Calling this more than once is harmless: the first subscriber stays
/// installed and later calls return `Ok(())`.
///
/// # Examples
///
/// ```
/// use offline_agent::logging::init_subscriber;
///
/// init_subscriber().expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_with_config(config: &LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    // A global subscriber already being set is fine (tests, repeated init)
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }

    Ok(())
}
