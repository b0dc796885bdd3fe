//! Typed views of the stellar-core admin endpoint payloads.
//!
//! Both payloads are loosely typed upstream. The metrics snapshot is kept as
//! raw JSON per entry and only entries of a recognized kind are decoded into
//! [`RawMetricEntry`], so one odd entry cannot fail a whole scrape. The info
//! snapshot is validated for its required keys before being decoded into
//! [`NodeInfo`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ExporterError, Result};

/// Keys that must all be present in the info snapshot for info-derived metrics.
pub const REQUIRED_INFO_KEYS: [&str; 6] = [
    "ledger",
    "peers",
    "protocol_version",
    "quorum",
    "startedOn",
    "state",
];

/// Body of the `/metrics` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsEnvelope {
    pub metrics: MetricsSnapshot,
}

/// Raw metrics keyed by their upstream name, undecoded.
pub type MetricsSnapshot = BTreeMap<String, Value>;

/// Body of the `/info` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct InfoEnvelope {
    pub info: Value,
}

/// Upstream metric classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Meter,
    Timer,
}

impl MetricKind {
    /// Parse an upstream `type` tag. Unrecognized tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "counter" => Some(MetricKind::Counter),
            "meter" => Some(MetricKind::Meter),
            "timer" => Some(MetricKind::Timer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Meter => "meter",
            MetricKind::Timer => "timer",
        }
    }
}

/// One entry of the metrics snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetricEntry {
    /// Upstream kind tag, kept as text so new kinds decode fine.
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub count: Option<f64>,
    #[serde(default)]
    pub sum: Option<f64>,
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub duration_unit: Option<String>,
    #[serde(default, rename = "75%")]
    pub p75: Option<f64>,
    #[serde(default, rename = "99%")]
    pub p99: Option<f64>,
}

impl RawMetricEntry {
    /// Decode one snapshot entry.
    ///
    /// Returns `Ok(None)` without looking at any other field when the entry is
    /// not an object or its `type` is missing, not a string, or unrecognized.
    pub fn from_value(name: &str, value: &Value) -> Result<Option<Self>> {
        let Some(tag) = value.get("type").and_then(Value::as_str) else {
            return Ok(None);
        };
        if MetricKind::from_tag(tag).is_none() {
            return Ok(None);
        }

        RawMetricEntry::deserialize(value)
            .map(Some)
            .map_err(|e| ExporterError::malformed_entry(name, e))
    }

    pub fn kind(&self) -> Option<MetricKind> {
        MetricKind::from_tag(&self.kind)
    }
}

/// Info snapshot after the required-key check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub ledger: LedgerInfo,
    pub peers: PeersInfo,
    #[serde(rename = "protocol_version")]
    pub protocol_version: f64,
    pub quorum: Map<String, Value>,
    pub started_on: String,
    pub state: String,
}

impl NodeInfo {
    /// Validate required keys, then decode.
    pub fn from_value(info: &Value) -> Result<Self> {
        let missing: Vec<String> = REQUIRED_INFO_KEYS
            .iter()
            .filter(|key| info.get(**key).is_none())
            .map(|key| key.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(ExporterError::IncompleteInfoSnapshot { missing });
        }

        NodeInfo::deserialize(info).map_err(|e| ExporterError::decode("info", e))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInfo {
    pub age: f64,
    pub base_fee: f64,
    pub base_reserve: f64,
    pub close_time: f64,
    pub max_tx_set_size: f64,
    pub num: f64,
    pub version: f64,
}

impl LedgerInfo {
    /// Ledger fields paired with their upstream and exported names.
    pub fn fields(&self) -> [(&'static str, &'static str, f64); 7] {
        [
            ("age", "age", self.age),
            ("baseFee", "base_fee", self.base_fee),
            ("baseReserve", "base_reserve", self.base_reserve),
            ("closeTime", "close_time", self.close_time),
            ("maxTxSetSize", "max_tx_set_size", self.max_tx_set_size),
            ("num", "num", self.num),
            ("version", "version", self.version),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeersInfo {
    pub authenticated_count: f64,
    pub pending_count: f64,
}

/// Per-quorum-set counters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuorumSet {
    pub agree: f64,
    pub delayed: f64,
    pub disagree: f64,
    pub fail_at: f64,
    pub missing: f64,
}

impl QuorumSet {
    pub fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("agree", self.agree),
            ("delayed", self.delayed),
            ("disagree", self.disagree),
            ("fail_at", self.fail_at),
            ("missing", self.missing),
        ]
    }
}

/// Transitive quorum diagnostics reported by newer nodes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Transitive {
    pub intersection: bool,
    pub last_check_ledger: f64,
    pub node_count: f64,
}

/// The `quorum` object, resolved to one of its two layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum QuorumInfo {
    /// `{"qset": {...}}`, reported since 11.2.0.
    Current {
        qset: QuorumSet,
        transitive: Option<Transitive>,
    },
    /// `{"<ledger>": {...}}`, reported by older nodes.
    Legacy {
        key: String,
        qset: QuorumSet,
        transitive: Option<Transitive>,
    },
}

impl QuorumInfo {
    /// Resolve the layout by the presence of a `qset` key.
    ///
    /// A legacy map must hold exactly one quorum entry; `transitive` is not
    /// counted as one.
    pub fn from_map(quorum: &Map<String, Value>) -> Result<Self> {
        let transitive = quorum
            .get("transitive")
            .map(|v| Transitive::deserialize(v).map_err(|e| ExporterError::decode("info", e)))
            .transpose()?;

        if let Some(qset) = quorum.get("qset") {
            let qset = QuorumSet::deserialize(qset).map_err(|e| ExporterError::decode("info", e))?;
            return Ok(QuorumInfo::Current { qset, transitive });
        }

        let mut entries = quorum.iter().filter(|(k, _)| k.as_str() != "transitive");
        match (entries.next(), entries.next()) {
            (Some((key, value)), None) => {
                let qset =
                    QuorumSet::deserialize(value).map_err(|e| ExporterError::decode("info", e))?;
                Ok(QuorumInfo::Legacy {
                    key: key.clone(),
                    qset,
                    transitive,
                })
            }
            _ => Err(ExporterError::AmbiguousQuorum {
                entries: quorum.keys().filter(|k| k.as_str() != "transitive").count(),
            }),
        }
    }

    pub fn qset(&self) -> &QuorumSet {
        match self {
            QuorumInfo::Current { qset, .. } | QuorumInfo::Legacy { qset, .. } => qset,
        }
    }

    pub fn transitive(&self) -> Option<&Transitive> {
        match self {
            QuorumInfo::Current { transitive, .. } | QuorumInfo::Legacy { transitive, .. } => {
                transitive.as_ref()
            }
        }
    }
}
