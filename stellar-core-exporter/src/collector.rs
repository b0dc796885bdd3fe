//! Per-scrape metric set and Prometheus text exposition.
//!
//! A [`MetricSet`] is built fresh for every scrape and dropped once rendered,
//! so nothing here is shared between requests.

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::{ExporterError, Result};
use crate::mapping::MetricType;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// A single translated sample.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputMetric {
    /// The full Prometheus metric name.
    pub name: String,
    /// Exposition type of the family this sample belongs to.
    pub metric_type: MetricType,
    /// HELP text of the family.
    pub help: String,
    /// Label key-value pairs, in output order.
    pub labels: Vec<(String, String)>,
    /// Sample value.
    pub value: f64,
}

impl OutputMetric {
    pub fn new(
        name: impl Into<String>,
        metric_type: MetricType,
        help: impl Into<String>,
        labels: Vec<(String, String)>,
        value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            metric_type,
            help: help.into(),
            labels,
            value,
        }
    }

    /// Shorthand for a gauge sample.
    pub fn gauge(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: Vec<(String, String)>,
        value: f64,
    ) -> Self {
        Self::new(name, MetricType::Gauge, help, labels, value)
    }

    /// Shorthand for a counter sample.
    pub fn counter(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: Vec<(String, String)>,
        value: f64,
    ) -> Self {
        Self::new(name, MetricType::Counter, help, labels, value)
    }

    /// Append one more label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Label value by name.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Format labels for Prometheus exposition format.
    pub fn format_labels(&self) -> String {
        format_labels(&self.labels)
    }
}

/// All samples sharing a metric name.
#[derive(Debug, Clone)]
struct Family {
    metric_type: MetricType,
    help: String,
    samples: Vec<(Vec<(String, String)>, f64)>,
}

/// Metrics gathered during one scrape.
#[derive(Debug, Default)]
pub struct MetricSet {
    families: BTreeMap<String, Family>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sample.
    ///
    /// Fails with [`ExporterError::DuplicateSeries`] if a sample with the same
    /// name and labels is already present, or if the name is already used by a
    /// family of another type.
    pub fn insert(&mut self, metric: OutputMetric) -> Result<()> {
        let OutputMetric {
            name,
            metric_type,
            help,
            labels,
            value,
        } = metric;

        match self.families.get_mut(&name) {
            Some(family) => {
                if family.metric_type != metric_type
                    || family.samples.iter().any(|(l, _)| *l == labels)
                {
                    return Err(ExporterError::DuplicateSeries { name });
                }
                family.samples.push((labels, value));
            }
            None => {
                self.families.insert(
                    name,
                    Family {
                        metric_type,
                        help,
                        samples: vec![(labels, value)],
                    },
                );
            }
        }

        Ok(())
    }

    /// Number of distinct metric names.
    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// Number of samples across all families.
    pub fn series_count(&self) -> usize {
        self.families.values().map(|f| f.samples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Render metrics in Prometheus exposition format.
    ///
    /// Families are sorted by name; samples keep insertion order.
    pub fn render(&self) -> String {
        let mut output = Vec::with_capacity(self.series_count() * 100);

        for (name, family) in &self.families {
            writeln!(output, "# HELP {} {}", name, escape_help(&family.help)).ok();
            writeln!(output, "# TYPE {} {}", name, family.metric_type.as_str()).ok();

            for (labels, value) in &family.samples {
                writeln!(
                    output,
                    "{}{} {}",
                    name,
                    format_labels(labels),
                    format_value(*value)
                )
                .ok();
            }
        }

        String::from_utf8(output).unwrap_or_default()
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape HELP text (backslash and newline only).
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
fn format_labels(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
