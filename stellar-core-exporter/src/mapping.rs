//! Mapping from stellar-core metric names to Prometheus metric names.

/// Namespace prefix shared by every exported metric.
pub const METRIC_PREFIX: &str = "stellar_core_";

/// Normalize an upstream metric name into the exported namespace.
///
/// `.` and `-` each become `_`, a run of whitespace becomes a single `_`,
/// and the result is lowercased and prefixed with `stellar_core_`. Any other
/// character that Prometheus does not accept in a metric name is replaced
/// with `_` as well.
pub fn normalize_metric_name(name: &str) -> String {
    let mut result = String::with_capacity(METRIC_PREFIX.len() + name.len());
    result.push_str(METRIC_PREFIX);

    let mut in_whitespace = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                result.push('_');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;

        for lower in c.to_lowercase() {
            if lower.is_ascii_alphanumeric() || lower == '_' || lower == ':' {
                result.push(lower);
            } else {
                result.push('_');
            }
        }
    }

    result
}

/// Prometheus metric type of an exported family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}
