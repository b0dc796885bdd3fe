//! One poll-translate-encode cycle against the upstream node.

use std::fmt;
use std::time::Instant;

use tracing::{debug, warn};

use crate::collector::MetricSet;
use crate::error::{ExporterError, Result};
use crate::translate::translate;
use crate::upstream::NodeClient;
use crate::version::resolve_labels;

/// Progress of a scrape, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStage {
    LabelsResolved,
    MetricsFetched,
    Translated,
    Encoded,
}

impl fmt::Display for ScrapeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScrapeStage::LabelsResolved => "labels_resolved",
            ScrapeStage::MetricsFetched => "metrics_fetched",
            ScrapeStage::Translated => "translated",
            ScrapeStage::Encoded => "encoded",
        };
        f.write_str(s)
    }
}

/// Encoded result of a successful scrape.
#[derive(Debug, Clone)]
pub struct ScrapeOutput {
    /// Exposition body.
    pub body: String,
    /// Number of samples in the body.
    pub series: usize,
    /// Number of non-fatal problems encountered.
    pub warnings: usize,
}

/// Runs scrapes against one node.
///
/// Holds no per-scrape state: every call builds its own [`MetricSet`].
#[derive(Debug, Clone)]
pub struct Scraper {
    client: NodeClient,
}

impl Scraper {
    pub fn new(client: NodeClient) -> Self {
        Self { client }
    }

    /// Run one scrape.
    ///
    /// Only a failure to fetch or decode the metrics snapshot fails the scrape.
    /// A failed info fetch degrades to empty version labels and no
    /// info-derived metrics.
    pub async fn scrape(&self) -> Result<ScrapeOutput> {
        let started = Instant::now();

        let info = match self.client.fetch_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "Failed to fetch node info, using empty version labels");
                None
            }
        };
        let labels = info.as_ref().map(resolve_labels).unwrap_or_default();
        log_stage(ScrapeStage::LabelsResolved, started);
        if labels.is_empty() && info.is_some() {
            debug!("Build string missing or unparseable, using empty version labels");
        }

        let metrics = self.client.fetch_metrics().await?;
        log_stage(ScrapeStage::MetricsFetched, started);

        let translation = translate(&metrics, info.as_ref(), &labels);
        let mut warnings = translation.warnings.len();
        for warning in &translation.warnings {
            report_warning(warning);
        }
        log_stage(ScrapeStage::Translated, started);

        let mut set = MetricSet::new();
        for metric in translation.metrics {
            if let Err(e) = set.insert(metric) {
                warnings += 1;
                report_warning(&e);
            }
        }

        let output = ScrapeOutput {
            body: set.render(),
            series: set.series_count(),
            warnings,
        };
        log_stage(ScrapeStage::Encoded, started);

        debug!(
            entries = metrics.len(),
            series = output.series,
            warnings = output.warnings,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scrape complete"
        );

        Ok(output)
    }
}

fn log_stage(stage: ScrapeStage, started: Instant) {
    debug!(
        stage = %stage,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Scrape progressed"
    );
}

fn report_warning(warning: &ExporterError) {
    match warning {
        ExporterError::IncompleteInfoSnapshot { missing } => {
            warn!(missing = ?missing, "Info endpoint did not return all required fields");
        }
        ExporterError::UnknownUnit(_)
        | ExporterError::MissingField { .. }
        | ExporterError::MalformedEntry { .. } => {
            warn!(error = %warning, "Dropping metric entry");
        }
        ExporterError::DuplicateSeries { .. } => {
            warn!(error = %warning, "Dropping duplicate series");
        }
        _ => {
            warn!(error = %warning, "Skipping info-derived metrics");
        }
    }
}
