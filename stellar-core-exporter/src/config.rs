//! Configuration for the stellar-core exporter.
//!
//! The exporter takes no configuration file; [`ExporterConfig`] is assembled
//! from command-line flags and validated before anything starts.

use std::net::{Ipv4Addr, SocketAddr};

use clap::ValueEnum;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default)]
pub struct ExporterConfig {
    /// stellar-core admin endpoints.
    pub upstream: UpstreamConfig,

    /// Exposed HTTP server.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Upstream node endpoints.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Metrics endpoint (default: "http://127.0.0.1:11626/metrics").
    pub metrics_uri: String,

    /// Info endpoint (default: "http://127.0.0.1:11626/info").
    pub info_uri: String,

    /// Per-request timeout for upstream calls (seconds).
    pub timeout_secs: u64,
}

pub const DEFAULT_METRICS_URI: &str = "http://127.0.0.1:11626/metrics";
pub const DEFAULT_INFO_URI: &str = "http://127.0.0.1:11626/info";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PORT: u16 = 9473;

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            metrics_uri: DEFAULT_METRICS_URI.to_string(),
            info_uri: DEFAULT_INFO_URI.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Exposed HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on, on all interfaces (default: 9473).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,

    /// Log output format: "text" or "json".
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_uri("metrics uri", &self.upstream.metrics_uri)?;
        validate_uri("info uri", &self.upstream.info_uri)?;

        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_uri(what: &str, uri: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(uri)
        .map_err(|e| ConfigError::Validation(format!("Invalid {} {:?}: {}", what, uri, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Validation(format!(
            "Invalid {} {:?}: unsupported scheme {:?}",
            what, uri, scheme
        ))),
    }
}
