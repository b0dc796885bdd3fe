//! Prometheus exporter for stellar-core.
//!
//! On every scrape the exporter polls a stellar-core node's admin endpoints,
//! translates the libmedida metrics snapshot and the node info snapshot into
//! Prometheus samples, and answers with the text exposition.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  stellar-core   │────>│   Translator    │────>│   HTTP Server   │
//! │ /metrics /info  │     │  (per scrape)   │     │   (any path)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Nothing is cached between scrapes: each request fetches, translates and
//! encodes a fresh [`collector::MetricSet`].
//!
//! # Usage
//!
//! ```bash
//! stellar-core-exporter --uri http://127.0.0.1:11626/metrics \
//!     --info-uri http://127.0.0.1:11626/info --port 9473
//! ```

pub mod collector;
pub mod config;
pub mod duration;
pub mod error;
pub mod http;
pub mod mapping;
pub mod schema;
pub mod scrape;
pub mod translate;
pub mod upstream;
pub mod version;

pub use collector::{MetricSet, OutputMetric};
pub use config::ExporterConfig;
pub use error::{ExporterError, Result};
pub use http::HttpServer;
pub use scrape::{ScrapeOutput, Scraper};
pub use upstream::NodeClient;
pub use version::VersionLabels;
