//! HTTP client for the stellar-core admin endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::{ExporterError, Result};
use crate::schema::{InfoEnvelope, MetricsEnvelope, MetricsSnapshot};

/// Client for one stellar-core node.
///
/// Every request is bounded by the configured timeout; nothing is retried.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    metrics_uri: String,
    info_uri: String,
}

impl NodeClient {
    /// Create a client from the upstream configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExporterError::Transport {
                url: config.metrics_uri.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            metrics_uri: config.metrics_uri.clone(),
            info_uri: config.info_uri.clone(),
        })
    }

    pub fn metrics_uri(&self) -> &str {
        &self.metrics_uri
    }

    pub fn info_uri(&self) -> &str {
        &self.info_uri
    }

    /// Fetch the metrics snapshot.
    pub async fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
        let envelope: MetricsEnvelope = self.get_json(&self.metrics_uri).await?;
        Ok(envelope.metrics)
    }

    /// Fetch the `info` object of the info endpoint.
    pub async fn fetch_info(&self) -> Result<Value> {
        let envelope: InfoEnvelope = self.get_json(&self.info_uri).await?;
        Ok(envelope.info)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ExporterError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExporterError::Transport {
                url: url.to_string(),
                message: format!("unexpected status {}", status),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExporterError::from_reqwest(url, e))?;

        debug!(url = %url, bytes = body.len(), "Fetched upstream snapshot");

        serde_json::from_slice(&body).map_err(|e| ExporterError::decode(url, e))
    }
}
