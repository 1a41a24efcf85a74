use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a tracked metric: `family` or `family:instance`
/// (e.g. `cpu`, `cpu_core:3`, `disk:/home`, `net_rx:eth0`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(String);

impl MetricId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Build an instance id such as `disk:/home`.
    pub fn instance(family: &str, instance: impl fmt::Display) -> Self {
        Self(format!("{}:{}", family, instance))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the first `:`, or the whole id.
    pub fn family(&self) -> &str {
        self.0.split_once(':').map(|(f, _)| f).unwrap_or(&self.0)
    }

    /// The part after the first `:`, if any.
    pub fn instance_name(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, i)| i)
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MetricId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl Borrow<str> for MetricId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Percent,
    Bytes,
    BytesPerSec,
    Celsius,
    Megahertz,
    Seconds,
    Count,
}

impl Unit {
    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::Percent => "%",
            Unit::Bytes => "B",
            Unit::BytesPerSec => "B/s",
            Unit::Celsius => "°C",
            Unit::Megahertz => " MHz",
            Unit::Seconds => "s",
            Unit::Count => "",
        }
    }
}

/// One reading of one metric. `value` is `None` when the metric could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric_id: MetricId,
    pub value: Option<f64>,
    pub unit: Unit,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(metric_id: MetricId, value: f64, unit: Unit) -> Self {
        Self {
            metric_id,
            value: Some(value),
            unit,
            timestamp: Utc::now(),
        }
    }

    pub fn unavailable(metric_id: MetricId, unit: Unit) -> Self {
        Self {
            metric_id,
            value: None,
            unit,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_usage_percent: f32,
    pub memory_bytes: u64,
    pub memory_percent: f32,
}

/// Static host description, collected once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    pub cpu_brand: String,
    pub core_count: usize,
    pub boot_time: i64, // Unix timestamp
}

impl HostInfo {
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> u64 {
        (now.timestamp() - self.boot_time).max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_and_instance() {
        let id = MetricId::instance("disk", "/home");
        assert_eq!(id.as_str(), "disk:/home");
        assert_eq!(id.family(), "disk");
        assert_eq!(id.instance_name(), Some("/home"));

        let plain = MetricId::new("cpu");
        assert_eq!(plain.family(), "cpu");
        assert_eq!(plain.instance_name(), None);
    }

    #[test]
    fn test_instance_keeps_later_colons() {
        let id = MetricId::instance("disk", "C:\\");
        assert_eq!(id.family(), "disk");
        assert_eq!(id.instance_name(), Some("C:\\"));
    }

    #[test]
    fn test_uptime_never_negative() {
        let host = HostInfo {
            boot_time: Utc::now().timestamp() + 100,
            ..Default::default()
        };
        assert_eq!(host.uptime_secs(Utc::now()), 0);
    }
}
