//! Incident detection: the engine that turns an alert batch into an incident
//! explanation, and the aggregate it produces.

pub mod engine;
pub mod incident;

use crate::alert::ResourceType;
use thiserror::Error;

pub use self::engine::IncidentEngine;
pub use self::incident::IncidentIntelligence;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("propagation rule {from} -> {to} has an out-of-range window ({window_secs}s)")]
    InvalidRuleWindow {
        from: ResourceType,
        to: ResourceType,
        window_secs: i64,
    },

    #[error("propagation rule {from} -> {to} references the unknown resource type")]
    UnknownRuleEndpoint { from: ResourceType, to: ResourceType },

    #[error("propagation rule for {0} points at itself")]
    SelfLoopRule(ResourceType),

    #[error("invalid analysis setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Severity levels for alerts and timeline entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}
