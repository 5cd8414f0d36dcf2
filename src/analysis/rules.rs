//! Propagation rule table: known, time-bounded failure propagation patterns
//! between resource types.

use super::{bounded_window, MAX_WINDOW_SECS};
use crate::alert::ResourceType;
use crate::detect::DetectError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A directed edge asserting that trouble in `from` can surface as trouble in
/// `to` within `max_window_secs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationRule {
    pub from: ResourceType,
    pub to: ResourceType,
    pub max_window_secs: i64,
    #[serde(default)]
    pub description: String,
}

impl PropagationRule {
    pub fn new(
        from: ResourceType,
        to: ResourceType,
        max_window_secs: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to,
            max_window_secs,
            description: description.into(),
        }
    }

    pub fn max_window(&self) -> Duration {
        bounded_window(self.max_window_secs)
    }

    /// True when an effect `delay` after the cause falls inside this rule's window.
    pub fn admits(&self, delay: Duration) -> bool {
        delay >= Duration::zero() && delay <= self.max_window()
    }
}

// (from, to, window seconds, description)
const DEFAULT_RULES: &[(ResourceType, ResourceType, i64, &str)] = &[
    (
        ResourceType::Memory,
        ResourceType::Disk,
        5 * 60,
        "Memory pressure forces swapping, which thrashes the disk",
    ),
    (
        ResourceType::Disk,
        ResourceType::Cpu,
        5 * 60,
        "Disk I/O saturation shows up as CPU iowait",
    ),
    (
        ResourceType::Memory,
        ResourceType::Cpu,
        10 * 60,
        "Memory reclaim and garbage collection drive CPU load",
    ),
    (
        ResourceType::Network,
        ResourceType::Memory,
        3 * 60,
        "Network backlog piles up buffered data in memory",
    ),
    (
        ResourceType::Process,
        ResourceType::Memory,
        2 * 60,
        "A runaway process exhausts available memory",
    ),
    (
        ResourceType::Process,
        ResourceType::Cpu,
        2 * 60,
        "A runaway process saturates the CPU",
    ),
];

/// Immutable, cheaply clonable set of propagation rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Arc<[PropagationRule]>,
}

impl RuleTable {
    /// Validate and freeze a rule list.
    pub fn new(rules: Vec<PropagationRule>) -> Result<Self, DetectError> {
        for rule in &rules {
            if rule.from == ResourceType::Unknown || rule.to == ResourceType::Unknown {
                return Err(DetectError::UnknownRuleEndpoint {
                    from: rule.from,
                    to: rule.to,
                });
            }
            if rule.from == rule.to {
                return Err(DetectError::SelfLoopRule(rule.from));
            }
            if !(1..=MAX_WINDOW_SECS).contains(&rule.max_window_secs) {
                return Err(DetectError::InvalidRuleWindow {
                    from: rule.from,
                    to: rule.to,
                    window_secs: rule.max_window_secs,
                });
            }
        }
        Ok(Self { rules: rules.into() })
    }

    /// The six built-in rules.
    pub fn builtin() -> Self {
        let rules: Vec<PropagationRule> = DEFAULT_RULES
            .iter()
            .map(|&(from, to, secs, desc)| PropagationRule::new(from, to, secs, desc))
            .collect();
        Self { rules: rules.into() }
    }

    pub fn rules(&self) -> &[PropagationRule] {
        &self.rules
    }

    /// Rules whose effect side is `to`.
    pub fn into_type(&self, to: ResourceType) -> impl Iterator<Item = &PropagationRule> {
        self.rules.iter().filter(move |r| r.to == to)
    }

    /// First rule linking `from` to `to`, if any.
    pub fn find(&self, from: ResourceType, to: ResourceType) -> Option<&PropagationRule> {
        self.rules.iter().find(|r| r.from == from && r.to == to)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Serialize for RuleTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rules.iter())
    }
}
