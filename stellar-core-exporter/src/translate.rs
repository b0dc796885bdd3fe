//! Translation of stellar-core snapshots into Prometheus samples.
//!
//! Metrics snapshot entries are dispatched on their upstream kind:
//!
//! | kind      | exported as                                                        |
//! |-----------|--------------------------------------------------------------------|
//! | `counter` | gauge `<name>` = `count`                                           |
//! | `meter`   | counter `<name>` = `count`                                         |
//! | `timer`   | counters `<name>_seconds_count`, `<name>_seconds_sum` and gauge    |
//! |           | `<name>_seconds{quantile="0.75"\|"0.99"}`, durations in seconds     |
//!
//! Any other kind is skipped, so newer nodes can introduce metric kinds
//! without breaking the exporter.
//!
//! The info snapshot contributes ledger, quorum, peer, protocol, sync and
//! start-time gauges. That group is all-or-nothing: if any required key is
//! missing or any value fails to decode, none of it is emitted.

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::trace;

use crate::collector::OutputMetric;
use crate::duration::to_seconds;
use crate::error::{ExporterError, Result};
use crate::mapping::normalize_metric_name;
use crate::schema::{MetricKind, MetricsSnapshot, NodeInfo, QuorumInfo, RawMetricEntry};
use crate::version::VersionLabels;

/// Format of the info snapshot's `startedOn` field.
pub const STARTED_ON_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Exact `state` value reported by a synced node.
pub const SYNCED_STATE: &str = "Synced!";

/// Result of translating one scrape's snapshots.
#[derive(Debug, Default)]
pub struct Translation {
    /// Samples to expose.
    pub metrics: Vec<OutputMetric>,
    /// Non-fatal problems: dropped entries, skipped info group.
    pub warnings: Vec<ExporterError>,
}

/// Translate both snapshots.
///
/// `info` is `None` when the info endpoint could not be read; the info group
/// is then skipped without a warning of its own.
pub fn translate(
    metrics: &MetricsSnapshot,
    info: Option<&Value>,
    labels: &VersionLabels,
) -> Translation {
    let mut translation = Translation::default();

    for (name, value) in metrics {
        let entry = match RawMetricEntry::from_value(name, value) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                trace!(metric = %name, kind = ?value.get("type"), "Skipping unsupported metric kind");
                continue;
            }
            Err(e) => {
                translation.warnings.push(e);
                continue;
            }
        };

        match translate_entry(name, &entry, labels) {
            Ok(samples) => translation.metrics.extend(samples),
            Err(e) => translation.warnings.push(e),
        }
    }

    if let Some(info) = info {
        match translate_info(info, labels) {
            Ok(samples) => translation.metrics.extend(samples),
            Err(e) => translation.warnings.push(e),
        }
    }

    translation
}

/// Translate one metrics snapshot entry.
///
/// Returns an empty list for unrecognized kinds.
pub fn translate_entry(
    name: &str,
    entry: &RawMetricEntry,
    labels: &VersionLabels,
) -> Result<Vec<OutputMetric>> {
    let Some(kind) = entry.kind() else {
        trace!(metric = %name, kind = %entry.kind, "Skipping unsupported metric kind");
        return Ok(Vec::new());
    };

    let metric_name = normalize_metric_name(name);
    let help = format!("libmedida metric type: {}", kind.as_str());
    let count = entry
        .count
        .ok_or_else(|| ExporterError::missing_field(name, "count"))?;

    let samples = match kind {
        MetricKind::Counter => vec![OutputMetric::gauge(
            metric_name,
            help,
            labels.pairs(),
            count,
        )],
        MetricKind::Meter => vec![OutputMetric::counter(
            metric_name,
            help,
            labels.pairs(),
            count,
        )],
        MetricKind::Timer => translate_timer(name, &metric_name, &help, entry, count, labels)?,
    };

    Ok(samples)
}

fn translate_timer(
    name: &str,
    metric_name: &str,
    help: &str,
    entry: &RawMetricEntry,
    count: f64,
    labels: &VersionLabels,
) -> Result<Vec<OutputMetric>> {
    let unit = entry
        .duration_unit
        .as_deref()
        .ok_or_else(|| ExporterError::missing_field(name, "duration_unit"))?;

    let total_duration = match (entry.sum, entry.mean) {
        (Some(sum), _) => sum,
        (None, Some(mean)) => mean * count,
        (None, None) => return Err(ExporterError::missing_field(name, "sum")),
    };
    let p75 = entry
        .p75
        .ok_or_else(|| ExporterError::missing_field(name, "75%"))?;
    let p99 = entry
        .p99
        .ok_or_else(|| ExporterError::missing_field(name, "99%"))?;

    let base = format!("{}_seconds", metric_name);

    Ok(vec![
        OutputMetric::counter(format!("{}_count", base), help, labels.pairs(), count),
        OutputMetric::counter(
            format!("{}_sum", base),
            help,
            labels.pairs(),
            to_seconds(total_duration, unit)?,
        ),
        OutputMetric::gauge(&base, help, labels.pairs(), to_seconds(p75, unit)?)
            .with_label("quantile", "0.75"),
        OutputMetric::gauge(&base, help, labels.pairs(), to_seconds(p99, unit)?)
            .with_label("quantile", "0.99"),
    ])
}

/// Translate the `info` object of the info endpoint.
pub fn translate_info(info: &Value, labels: &VersionLabels) -> Result<Vec<OutputMetric>> {
    let node = NodeInfo::from_value(info)?;
    let quorum = QuorumInfo::from_map(&node.quorum)?;
    let started_on = parse_started_on(&node.started_on)?;

    let mut samples = Vec::with_capacity(20);

    for (core_name, prom_name, value) in node.ledger.fields() {
        samples.push(OutputMetric::gauge(
            format!("stellar_core_ledger_{}", prom_name),
            format!("Stellar core ledger metric name: {}", core_name),
            labels.pairs(),
            value,
        ));
    }

    for (metric, value) in quorum.qset().fields() {
        samples.push(OutputMetric::gauge(
            format!("stellar_core_quorum_{}", metric),
            format!("Stellar core quorum metric: {}", metric),
            labels.pairs(),
            value,
        ));
    }

    if let Some(transitive) = quorum.transitive() {
        samples.push(OutputMetric::gauge(
            "stellar_core_quorum_transitive_intersection",
            "Stellar core quorum transitive intersection",
            labels.pairs(),
            if transitive.intersection { 1.0 } else { 0.0 },
        ));
        samples.push(OutputMetric::gauge(
            "stellar_core_quorum_transitive_last_check_ledger",
            "Stellar core quorum transitive last_check_ledger",
            labels.pairs(),
            transitive.last_check_ledger,
        ));
        samples.push(OutputMetric::gauge(
            "stellar_core_quorum_transitive_node_count",
            "Stellar core quorum transitive node_count",
            labels.pairs(),
            transitive.node_count,
        ));
    }

    samples.push(OutputMetric::gauge(
        "stellar_core_peers_authenticated_count",
        "Stellar core authenticated_count count",
        labels.pairs(),
        node.peers.authenticated_count,
    ));
    samples.push(OutputMetric::gauge(
        "stellar_core_peers_pending_count",
        "Stellar core pending_count count",
        labels.pairs(),
        node.peers.pending_count,
    ));

    samples.push(OutputMetric::gauge(
        "stellar_core_protocol_version",
        "Stellar core protocol_version",
        labels.pairs(),
        node.protocol_version,
    ));

    samples.push(OutputMetric::gauge(
        "stellar_core_synced",
        "Stellar core sync status",
        labels.pairs(),
        if node.state == SYNCED_STATE { 1.0 } else { 0.0 },
    ));

    samples.push(OutputMetric::gauge(
        "stellar_core_started_on",
        "Stellar core start time in epoch",
        labels.pairs(),
        started_on as f64,
    ));

    Ok(samples)
}

/// Parse `startedOn` (UTC, `YYYY-MM-DDTHH:MM:SSZ`) into Unix epoch seconds.
pub fn parse_started_on(value: &str) -> Result<i64> {
    NaiveDateTime::parse_from_str(value, STARTED_ON_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| ExporterError::MalformedTimestamp {
            value: value.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MetricType;
    use serde_json::json;

    fn labels() -> VersionLabels {
        VersionLabels {
            major: "11".to_string(),
            minor: "1".to_string(),
            patch: "0".to_string(),
            extra: "unstablerc2".to_string(),
        }
    }

    fn entry(value: Value) -> RawMetricEntry {
        serde_json::from_value(value).unwrap()
    }

    fn find<'a>(metrics: &'a [OutputMetric], name: &str) -> Vec<&'a OutputMetric> {
        metrics.iter().filter(|m| m.name == name).collect()
    }

    fn info_json() -> Value {
        json!({
            "build": "stellar-core 11.1.0-unstablerc2 (324c1bd61b0e9bada63e0d696d799421b00a7950)",
            "ledger": {
                "age": 3,
                "baseFee": 100,
                "baseReserve": 5000000,
                "closeTime": 1560252347,
                "hash": "a1c33",
                "maxTxSetSize": 1000,
                "num": 24158862,
                "version": 11
            },
            "peers": { "authenticated_count": 12, "pending_count": 2 },
            "protocol_version": 11,
            "quorum": {
                "qset": {
                    "agree": 5,
                    "delayed": 0,
                    "disagree": 0,
                    "fail_at": 2,
                    "missing": 1,
                    "phase": "EXTERNALIZE"
                },
                "transitive": {
                    "intersection": true,
                    "last_check_ledger": 24158800,
                    "node_count": 34
                }
            },
            "startedOn": "2019-06-11T10:40:48Z",
            "state": "Synced!"
        })
    }

    #[test]
    fn test_counter_becomes_gauge() {
        let samples =
            translate_entry("database.reads", &entry(json!({"type": "counter", "count": 42})), &labels())
                .unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "stellar_core_database_reads");
        assert_eq!(samples[0].metric_type, MetricType::Gauge);
        assert_eq!(samples[0].value, 42.0);
        assert_eq!(samples[0].help, "libmedida metric type: counter");
    }

    #[test]
    fn test_meter_becomes_counter() {
        let samples = translate_entry(
            "overlay.byte.read",
            &entry(json!({"type": "meter", "count": 4096, "mean_rate": 10.5})),
            &labels(),
        )
        .unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "stellar_core_overlay_byte_read");
        assert_eq!(samples[0].metric_type, MetricType::Counter);
        assert_eq!(samples[0].value, 4096.0);
    }

    #[test]
    fn test_timer_with_sum() {
        let timer = entry(json!({
            "type": "timer",
            "count": 10,
            "sum": 5.0,
            "duration_unit": "s",
            "75%": 0.4,
            "99%": 0.9
        }));
        let samples = translate_entry("op.latency", &timer, &labels()).unwrap();
        assert_eq!(samples.len(), 4);

        let count = find(&samples, "stellar_core_op_latency_seconds_count");
        assert_eq!(count.len(), 1);
        assert_eq!(count[0].metric_type, MetricType::Counter);
        assert_eq!(count[0].value, 10.0);

        let sum = find(&samples, "stellar_core_op_latency_seconds_sum");
        assert_eq!(sum[0].metric_type, MetricType::Counter);
        assert_eq!(sum[0].value, 5.0);

        let quantiles = find(&samples, "stellar_core_op_latency_seconds");
        assert_eq!(quantiles.len(), 2);
        assert!(quantiles.iter().all(|m| m.metric_type == MetricType::Gauge));
        assert_eq!(quantiles[0].label("quantile"), Some("0.75"));
        assert_eq!(quantiles[0].value, 0.4);
        assert_eq!(quantiles[1].label("quantile"), Some("0.99"));
        assert_eq!(quantiles[1].value, 0.9);
    }

    #[test]
    fn test_timer_sum_from_mean_and_units() {
        let timer = entry(json!({
            "type": "timer",
            "count": 4,
            "mean": 250.0,
            "duration_unit": "ms",
            "75%": 300.0,
            "99%": 500.0
        }));
        let samples = translate_entry("ledger.ledger.close", &timer, &labels()).unwrap();

        let sum = find(&samples, "stellar_core_ledger_ledger_close_seconds_sum");
        assert_eq!(sum[0].value, 1.0);

        let quantiles = find(&samples, "stellar_core_ledger_ledger_close_seconds");
        assert_eq!(quantiles[0].value, 0.3);
        assert_eq!(quantiles[1].value, 0.5);
    }

    #[test]
    fn test_timer_is_deterministic() {
        let timer = entry(json!({
            "type": "timer",
            "count": 7,
            "mean": 1.5,
            "duration_unit": "us",
            "75%": 2.0,
            "99%": 9.0
        }));

        let first = translate_entry("scp.timing", &timer, &labels()).unwrap();
        let second = translate_entry("scp.timing", &timer, &labels()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_timer_unknown_unit_is_error() {
        let timer = entry(json!({
            "type": "timer",
            "count": 1,
            "sum": 1.0,
            "duration_unit": "fortnight",
            "75%": 1.0,
            "99%": 1.0
        }));
        let err = translate_entry("op.latency", &timer, &labels()).unwrap_err();
        assert!(matches!(err, ExporterError::UnknownUnit(_)));
    }

    #[test]
    fn test_timer_missing_fields() {
        let no_sum = entry(json!({
            "type": "timer",
            "count": 1,
            "duration_unit": "s",
            "75%": 1.0,
            "99%": 1.0
        }));
        assert!(matches!(
            translate_entry("t", &no_sum, &labels()),
            Err(ExporterError::MissingField { field: "sum", .. })
        ));

        let no_p99 = entry(json!({
            "type": "timer",
            "count": 1,
            "sum": 1.0,
            "duration_unit": "s",
            "75%": 1.0
        }));
        assert!(matches!(
            translate_entry("t", &no_p99, &labels()),
            Err(ExporterError::MissingField { field: "99%", .. })
        ));
    }

    #[test]
    fn test_unknown_kind_skipped() {
        let histogram = entry(json!({"type": "histogram", "count": 3}));
        assert!(translate_entry("bucket.sizes", &histogram, &labels())
            .unwrap()
            .is_empty());

        let untyped = entry(json!({"count": 3}));
        assert!(translate_entry("mystery", &untyped, &labels())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unknown_kind_with_odd_fields_keeps_others() {
        let metrics: MetricsSnapshot = serde_json::from_value(json!({
            "database.reads": {"type": "counter", "count": 42},
            "future.thing": {"type": "distribution", "count": {"buckets": [1, 2]}},
            "odd.scalar": [1, 2, 3],
            "null.kind": {"type": null, "sum": "n/a"}
        }))
        .unwrap();

        let translation = translate(&metrics, None, &VersionLabels::default());
        assert!(translation.warnings.is_empty());
        assert_eq!(translation.metrics.len(), 1);
        assert_eq!(translation.metrics[0].name, "stellar_core_database_reads");
        assert_eq!(translation.metrics[0].value, 42.0);
    }

    #[test]
    fn test_malformed_known_entry_is_dropped() {
        let metrics: MetricsSnapshot = serde_json::from_value(json!({
            "database.reads": {"type": "counter", "count": 42},
            "overlay.byte.read": {"type": "meter", "count": {"buckets": [1, 2]}}
        }))
        .unwrap();

        let translation = translate(&metrics, None, &VersionLabels::default());
        assert_eq!(translation.metrics.len(), 1);
        assert_eq!(translation.warnings.len(), 1);
        assert!(matches!(
            &translation.warnings[0],
            ExporterError::MalformedEntry { metric, .. } if metric == "overlay.byte.read"
        ));
    }

    #[test]
    fn test_every_sample_carries_version_labels() {
        let metrics: MetricsSnapshot = serde_json::from_value(json!({
            "a.counter": {"type": "counter", "count": 1},
            "a.meter": {"type": "meter", "count": 2},
            "a.timer": {
                "type": "timer", "count": 3, "sum": 3.0,
                "duration_unit": "s", "75%": 1.0, "99%": 2.0
            }
        }))
        .unwrap();
        let info = info_json();

        let translation = translate(&metrics, Some(&info), &labels());
        assert!(translation.warnings.is_empty());

        let expected = labels().pairs();
        for metric in &translation.metrics {
            assert_eq!(&metric.labels[..4], &expected[..], "{}", metric.name);
        }
    }

    #[test]
    fn test_info_metrics() {
        let samples = translate_info(&info_json(), &labels()).unwrap();
        let value = |name: &str| find(&samples, name)[0].value;

        assert_eq!(value("stellar_core_ledger_age"), 3.0);
        assert_eq!(value("stellar_core_ledger_base_fee"), 100.0);
        assert_eq!(value("stellar_core_ledger_base_reserve"), 5_000_000.0);
        assert_eq!(value("stellar_core_ledger_close_time"), 1_560_252_347.0);
        assert_eq!(value("stellar_core_ledger_max_tx_set_size"), 1000.0);
        assert_eq!(value("stellar_core_ledger_num"), 24_158_862.0);
        assert_eq!(value("stellar_core_ledger_version"), 11.0);

        assert_eq!(value("stellar_core_quorum_agree"), 5.0);
        assert_eq!(value("stellar_core_quorum_delayed"), 0.0);
        assert_eq!(value("stellar_core_quorum_disagree"), 0.0);
        assert_eq!(value("stellar_core_quorum_fail_at"), 2.0);
        assert_eq!(value("stellar_core_quorum_missing"), 1.0);

        assert_eq!(value("stellar_core_quorum_transitive_intersection"), 1.0);
        assert_eq!(
            value("stellar_core_quorum_transitive_last_check_ledger"),
            24_158_800.0
        );
        assert_eq!(value("stellar_core_quorum_transitive_node_count"), 34.0);

        assert_eq!(value("stellar_core_peers_authenticated_count"), 12.0);
        assert_eq!(value("stellar_core_peers_pending_count"), 2.0);
        assert_eq!(value("stellar_core_protocol_version"), 11.0);
        assert_eq!(value("stellar_core_synced"), 1.0);
        assert_eq!(value("stellar_core_started_on"), 1_560_249_648.0);

        assert_eq!(samples.len(), 20);
        assert!(samples.iter().all(|m| m.metric_type == MetricType::Gauge));
    }

    #[test]
    fn test_info_not_synced() {
        for state in ["Catching up", "synced!", "Synced", "Joining SCP"] {
            let mut info = info_json();
            info["state"] = json!(state);
            let samples = translate_info(&info, &labels()).unwrap();
            assert_eq!(find(&samples, "stellar_core_synced")[0].value, 0.0, "{}", state);
        }
    }

    #[test]
    fn test_info_no_quorum_intersection() {
        let mut info = info_json();
        info["quorum"]["transitive"]["intersection"] = json!(false);

        let samples = translate_info(&info, &labels()).unwrap();
        let intersection = find(&samples, "stellar_core_quorum_transitive_intersection");
        assert_eq!(intersection.len(), 1);
        assert_eq!(intersection[0].value, 0.0);
    }

    #[test]
    fn test_info_without_transitive() {
        let mut info = info_json();
        info["quorum"].as_object_mut().unwrap().remove("transitive");

        let samples = translate_info(&info, &labels()).unwrap();
        assert!(samples.iter().all(|m| !m.name.contains("transitive")));
        assert_eq!(samples.len(), 17);
    }

    #[test]
    fn test_info_legacy_quorum_same_output() {
        let current = translate_info(&info_json(), &labels()).unwrap();

        let mut info = info_json();
        let qset = info["quorum"]["qset"].clone();
        let transitive = info["quorum"]["transitive"].clone();
        info["quorum"] = json!({ "758110": qset, "transitive": transitive });
        let legacy = translate_info(&info, &labels()).unwrap();

        assert_eq!(current, legacy);
    }

    #[test]
    fn test_info_ambiguous_legacy_quorum() {
        let mut info = info_json();
        let qset = info["quorum"]["qset"].clone();
        info["quorum"] = json!({ "758110": qset.clone(), "758111": qset });

        assert!(matches!(
            translate_info(&info, &labels()),
            Err(ExporterError::AmbiguousQuorum { entries: 2 })
        ));
    }

    #[test]
    fn test_incomplete_info_keeps_snapshot_metrics() {
        let metrics: MetricsSnapshot = serde_json::from_value(json!({
            "database.reads": {"type": "counter", "count": 42}
        }))
        .unwrap();
        let mut info = info_json();
        info.as_object_mut().unwrap().remove("startedOn");

        let translation = translate(&metrics, Some(&info), &labels());

        assert_eq!(translation.metrics.len(), 1);
        assert_eq!(translation.metrics[0].name, "stellar_core_database_reads");
        assert_eq!(translation.warnings.len(), 1);
        assert!(matches!(
            &translation.warnings[0],
            ExporterError::IncompleteInfoSnapshot { missing } if missing == &["startedOn"]
        ));
    }

    #[test]
    fn test_malformed_started_on_drops_info_group() {
        let mut info = info_json();
        info["startedOn"] = json!("2019-06-11 10:40:48");

        let translation = translate(&MetricsSnapshot::new(), Some(&info), &labels());
        assert!(translation.metrics.is_empty());
        assert!(matches!(
            translation.warnings[0],
            ExporterError::MalformedTimestamp { .. }
        ));
    }

    #[test]
    fn test_bad_entry_does_not_drop_others() {
        let metrics: MetricsSnapshot = serde_json::from_value(json!({
            "a.good": {"type": "meter", "count": 2},
            "b.bad": {
                "type": "timer", "count": 3, "sum": 3.0,
                "duration_unit": "parsec", "75%": 1.0, "99%": 2.0
            },
            "c.good": {"type": "counter", "count": 1}
        }))
        .unwrap();

        let translation = translate(&metrics, None, &VersionLabels::default());
        assert_eq!(translation.metrics.len(), 2);
        assert_eq!(translation.warnings.len(), 1);
    }

    #[test]
    fn test_parse_started_on() {
        assert_eq!(parse_started_on("1970-01-01T00:00:00Z").unwrap(), 0);
        assert_eq!(
            parse_started_on("2019-06-11T10:40:48Z").unwrap(),
            1_560_249_648
        );

        for bad in [
            "2019-06-11T10:40:48",
            "2019-06-11T10:40:48.123Z",
            "2019-06-11T10:40:48+00:00",
            "2019-06-11",
            "not a date",
        ] {
            assert!(
                matches!(
                    parse_started_on(bad),
                    Err(ExporterError::MalformedTimestamp { .. })
                ),
                "{}",
                bad
            );
        }
    }
}
