//! Error types for the exporter.

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias using [`ExporterError`].
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Errors that can occur while scraping and translating a stellar-core node.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Upstream unreachable or answered with a non-success status.
    #[error("Failed to fetch {url}: {message}")]
    Transport { url: String, message: String },

    /// Upstream did not answer within the configured timeout.
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    /// Body was not JSON or did not match the expected schema.
    #[error("Failed to decode response from {source_name}: {message}")]
    Decode {
        source_name: String,
        message: String,
    },

    /// Duration unit tag outside `d`, `h`, `m`, `s`, `ms`, `us`, `ns`.
    #[error("Unknown duration unit: {0:?}")]
    UnknownUnit(String),

    /// `startedOn` not in `YYYY-MM-DDTHH:MM:SSZ` form.
    #[error("Malformed timestamp {value:?}: {message}")]
    MalformedTimestamp { value: String, message: String },

    /// Info snapshot lacks keys needed for the info-derived metrics.
    #[error("Info endpoint did not return all required fields (missing: {})", .missing.join(", "))]
    IncompleteInfoSnapshot { missing: Vec<String> },

    /// Legacy quorum mapping with other than exactly one entry.
    #[error("Cannot select quorum entry: legacy quorum map has {entries} entries, expected 1")]
    AmbiguousQuorum { entries: usize },

    /// A recognized metric kind lacks a field its translation needs.
    #[error("Metric {metric:?} is missing field {field:?}")]
    MissingField { metric: String, field: &'static str },

    /// A recognized metric kind whose fields have the wrong JSON types.
    #[error("Metric {metric:?} has malformed fields: {message}")]
    MalformedEntry { metric: String, message: String },

    /// Two raw metrics normalized to the same series.
    #[error("Duplicate series {name}")]
    DuplicateSeries { name: String },
}

impl ExporterError {
    /// Create a decode error for the named upstream source.
    pub fn decode(source_name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            source_name: source_name.into(),
            message: err.to_string(),
        }
    }

    /// Create a missing field error.
    pub fn missing_field(metric: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            metric: metric.into(),
            field,
        }
    }

    /// Create a malformed entry error.
    pub fn malformed_entry(metric: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::MalformedEntry {
            metric: metric.into(),
            message: err.to_string(),
        }
    }

    /// Wrap a reqwest error, separating timeouts from other transport failures.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            Self::decode(url, err)
        } else {
            Self::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// HTTP status to answer a scrape with when this error aborts it.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport { .. } | Self::Decode { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
