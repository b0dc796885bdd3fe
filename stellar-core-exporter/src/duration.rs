//! Conversion of libmedida durations to seconds.

use std::str::FromStr;

use crate::error::{ExporterError, Result};

/// Duration unit tag reported in a timer's `duration_unit` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl DurationUnit {
    /// The tag as it appears upstream.
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Days => "d",
            DurationUnit::Hours => "h",
            DurationUnit::Minutes => "m",
            DurationUnit::Seconds => "s",
            DurationUnit::Milliseconds => "ms",
            DurationUnit::Microseconds => "us",
            DurationUnit::Nanoseconds => "ns",
        }
    }

    /// Convert `value` expressed in this unit to seconds.
    pub fn to_seconds(&self, value: f64) -> f64 {
        match self {
            DurationUnit::Days => value * 86_400.0,
            DurationUnit::Hours => value * 3_600.0,
            DurationUnit::Minutes => value * 60.0,
            DurationUnit::Seconds => value,
            DurationUnit::Milliseconds => value / 1_000.0,
            DurationUnit::Microseconds => value / 1_000_000.0,
            DurationUnit::Nanoseconds => value / 1_000_000_000.0,
        }
    }
}

impl FromStr for DurationUnit {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "d" => Ok(DurationUnit::Days),
            "h" => Ok(DurationUnit::Hours),
            "m" => Ok(DurationUnit::Minutes),
            "s" => Ok(DurationUnit::Seconds),
            "ms" => Ok(DurationUnit::Milliseconds),
            "us" => Ok(DurationUnit::Microseconds),
            "ns" => Ok(DurationUnit::Nanoseconds),
            other => Err(ExporterError::UnknownUnit(other.to_string())),
        }
    }
}

/// Convert a duration tagged with an upstream unit string to seconds.
pub fn to_seconds(value: f64, unit: &str) -> Result<f64> {
    Ok(unit.parse::<DurationUnit>()?.to_seconds(value))
}
