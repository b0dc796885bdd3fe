//! Version labels derived from the node's build string.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Label names attached to every exported sample, in output order.
pub const VERSION_LABEL_NAMES: [&str; 4] = ["ver_major", "ver_minor", "ver_patch", "ver_extra"];

// Examples:
//   "stellar-core 11.1.0-unstablerc2 (324c1bd61b0e9bada63e0d696d799421b00a7950)"
//   "stellar-core 11.1.0 (324c1bd61b0e9bada63e0d696d799421b00a7950)"
//   "v11.1.0"
static BUILD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:stellar-core|v)? ?(\d+)\.(\d+)\.(\d+)(-[^ ]+)?").unwrap()
});

/// Version of the scraped node, split into label values.
///
/// All fields are empty when the build string is unavailable or unparseable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionLabels {
    pub major: String,
    pub minor: String,
    pub patch: String,
    pub extra: String,
}

impl VersionLabels {
    /// Label pairs in exposition order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        VERSION_LABEL_NAMES
            .iter()
            .zip([&self.major, &self.minor, &self.patch, &self.extra])
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// True when no label carries a value.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse a stellar-core build string such as `stellar-core 11.1.0-rc2 (abc)`.
pub fn parse_build(build: &str) -> Option<VersionLabels> {
    let caps = BUILD_REGEX.captures(build)?;

    Some(VersionLabels {
        major: caps[1].to_string(),
        minor: caps[2].to_string(),
        patch: caps[3].to_string(),
        extra: caps
            .get(4)
            .map(|m| m.as_str().trim_start_matches('-').to_string())
            .unwrap_or_default(),
    })
}

/// Resolve labels from the `info` object of the info endpoint.
///
/// Never fails: a missing or non-string `build`, or one that does not parse,
/// yields empty labels.
pub fn resolve_labels(info: &Value) -> VersionLabels {
    info.get("build")
        .and_then(Value::as_str)
        .and_then(parse_build)
        .unwrap_or_default()
}
