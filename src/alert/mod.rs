//! Alert data model -- the read-only input of every analysis run.

pub mod source;

use crate::detect::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Resource category an alert is reported against.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ResourceType {
    #[default]
    Unknown,
    Cpu,
    Memory,
    Disk,
    Network,
    Process,
}

impl ResourceType {
    /// The five categories a host is expected to report on.
    pub const CANONICAL: [ResourceType; 5] = [
        ResourceType::Cpu,
        ResourceType::Memory,
        ResourceType::Disk,
        ResourceType::Network,
        ResourceType::Process,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Unknown => "unknown",
            ResourceType::Cpu => "cpu",
            ResourceType::Memory => "memory",
            ResourceType::Disk => "disk",
            ResourceType::Network => "network",
            ResourceType::Process => "process",
        }
    }

    /// Guess a category from a monitoring chart name such as `system.ram`
    /// or `disk.sda`. Returns `Unknown` when nothing matches.
    pub fn infer_from_chart(chart: &str) -> ResourceType {
        let chart = chart.to_ascii_lowercase();
        let family = chart.split('.').next().unwrap_or_default();
        let metric = chart.split('.').nth(1).unwrap_or_default();

        match family {
            "cpu" | "cpufreq" | "cpuidle" => return ResourceType::Cpu,
            "mem" | "memory" => return ResourceType::Memory,
            "disk" | "disk_space" | "disk_inodes" | "disk_util" => return ResourceType::Disk,
            "net" | "ip" | "ipv4" | "ipv6" | "netfilter" => return ResourceType::Network,
            "apps" | "users" | "groups" | "services" => return ResourceType::Process,
            _ => {}
        }

        match metric {
            "cpu" | "load" | "interrupts" | "softirqs" | "intr" => ResourceType::Cpu,
            "ram" | "swap" | "swapio" | "pgpgio" => ResourceType::Memory,
            "io" => ResourceType::Disk,
            "net" | "packets" => ResourceType::Network,
            "processes" | "forks" | "active_processes" | "ctxt" => ResourceType::Process,
            _ => ResourceType::Unknown,
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => ResourceType::Cpu,
            "memory" | "mem" | "ram" => ResourceType::Memory,
            "disk" => ResourceType::Disk,
            "network" | "net" => ResourceType::Network,
            "process" | "processes" => ResourceType::Process,
            _ => ResourceType::Unknown,
        })
    }
}

impl From<String> for ResourceType {
    fn from(s: String) -> Self {
        // Infallible: anything unrecognized is `Unknown`.
        s.parse().unwrap_or_default()
    }
}

/// Alert state as reported by the monitoring source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AlertStatus {
    #[default]
    Undefined,
    Clear,
    Warning,
    Critical,
    Removed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Undefined => "undefined",
            AlertStatus::Clear => "clear",
            AlertStatus::Warning => "warning",
            AlertStatus::Critical => "critical",
            AlertStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for AlertStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" => AlertStatus::Clear,
            "warning" => AlertStatus::Warning,
            "critical" => AlertStatus::Critical,
            "removed" => AlertStatus::Removed,
            _ => AlertStatus::Undefined,
        }
    }
}

/// One reported state transition for a monitored resource on a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub host: String,
    #[serde(default)]
    pub chart: String,
    #[serde(default)]
    pub resource_type: ResourceType,
    pub status: AlertStatus,
    #[serde(default)]
    pub previous_status: AlertStatus,
    #[serde(default)]
    pub value: f64,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Alert {
    /// Minimal alert with a chart name derived from the resource type.
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        resource_type: ResourceType,
        status: AlertStatus,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            chart: format!("system.{}", resource_type),
            resource_type,
            status,
            previous_status: AlertStatus::Clear,
            value: 0.0,
            occurred_at,
            description: String::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_previous(mut self, previous: AlertStatus) -> Self {
        self.previous_status = previous;
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_chart(mut self, chart: impl Into<String>) -> Self {
        self.chart = chart.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_clear(&self) -> bool {
        self.status == AlertStatus::Clear
    }

    pub fn is_critical(&self) -> bool {
        self.status == AlertStatus::Critical
    }

    pub fn severity(&self) -> Severity {
        match self.status {
            AlertStatus::Critical => Severity::Critical,
            AlertStatus::Warning => Severity::Warning,
            _ => Severity::Info,
        }
    }

    /// Fill in `resource_type` from the chart name when the source left it unknown.
    pub fn normalize(mut self) -> Self {
        if self.resource_type == ResourceType::Unknown {
            self.resource_type = ResourceType::infer_from_chart(&self.chart);
        }
        self
    }
}
