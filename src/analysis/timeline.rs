//! Causality timeline: one entry per alert, each linked to the earlier alerts
//! that a propagation rule says could have caused it.

use super::batch::{AlertBatch, AlertIdx};
use super::rules::RuleTable;
use crate::alert::{Alert, AlertStatus, ResourceType};
use crate::detect::Severity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// What kind of state change an alert represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Triggered,
    Escalated,
    Resolved,
    Warning,
    Critical,
    Update,
}

impl EventKind {
    pub fn classify(alert: &Alert) -> Self {
        let (prev, now) = (alert.previous_status, alert.status);
        if prev == AlertStatus::Clear && now != AlertStatus::Clear {
            EventKind::Triggered
        } else if prev == AlertStatus::Warning && now == AlertStatus::Critical {
            EventKind::Escalated
        } else if now == AlertStatus::Clear {
            EventKind::Resolved
        } else if now == AlertStatus::Critical {
            EventKind::Critical
        } else if now == AlertStatus::Warning {
            EventKind::Warning
        } else {
            EventKind::Update
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::Triggered => "TRIGGERED",
            EventKind::Escalated => "ESCALATED",
            EventKind::Resolved => "RESOLVED",
            EventKind::Warning => "WARNING",
            EventKind::Critical => "CRITICAL",
            EventKind::Update => "UPDATE",
        };
        write!(f, "{}", s)
    }
}

/// Attribution of one alert to an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CausalLink {
    pub alert: AlertIdx,
    pub alert_id: String,
    pub delay_secs: i64,
    pub rule: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub alert: AlertIdx,
    pub alert_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    pub severity: Severity,
    pub caused_by: Vec<CausalLink>,
    pub since_start_secs: i64,
}

impl TimelineEntry {
    pub fn cause_indices(&self) -> impl Iterator<Item = AlertIdx> + '_ {
        self.caused_by.iter().map(|c| c.alert)
    }
}

/// Ordered causal timeline; entry `i` describes `AlertIdx(i)`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, idx: AlertIdx) -> Option<&TimelineEntry> {
        self.entries.get(idx.0)
    }

    /// Alerts recorded as causes of `idx`.
    pub fn causes_of(&self, idx: AlertIdx) -> Vec<AlertIdx> {
        self.entry(idx)
            .map(|e| e.cause_indices().collect())
            .unwrap_or_default()
    }

    /// Alerts that list `idx` among their causes.
    pub fn effects_of(&self, idx: AlertIdx) -> Vec<AlertIdx> {
        self.entries
            .iter()
            .filter(|e| e.cause_indices().any(|c| c == idx))
            .map(|e| e.alert)
            .collect()
    }

    /// Length of the longest causal chain ending at `idx`, counted in links.
    pub fn chain_depth(&self, idx: AlertIdx) -> usize {
        // Causes always point at lower indices, so one forward pass suffices.
        let mut depth = vec![0usize; idx.0 + 1];
        for entry in self.entries.iter().take(idx.0 + 1) {
            let d = entry
                .cause_indices()
                .map(|c| depth[c.0] + 1)
                .max()
                .unwrap_or(0);
            depth[entry.alert.0] = d;
        }
        depth.get(idx.0).copied().unwrap_or(0)
    }
}

/// Build the causality timeline for a batch.
pub fn build_timeline(batch: &AlertBatch, rules: &RuleTable) -> Timeline {
    let Some(start) = batch.earliest() else {
        return Timeline::default();
    };

    // Most recent non-clear alert seen so far for each resource type.
    let mut active: HashMap<ResourceType, AlertIdx> = HashMap::new();
    let mut entries = Vec::with_capacity(batch.len());

    for (idx, alert) in batch.iter() {
        let mut caused_by: Vec<CausalLink> = Vec::new();

        for rule in rules.into_type(alert.resource_type) {
            let Some(&source_idx) = active.get(&rule.from) else {
                continue;
            };
            let source = &batch[source_idx];
            let delay = alert.occurred_at - source.occurred_at;
            if source.is_clear() || !rule.admits(delay) {
                continue;
            }
            if caused_by.iter().any(|c| c.alert == source_idx) {
                continue;
            }
            caused_by.push(CausalLink {
                alert: source_idx,
                alert_id: source.id.clone(),
                delay_secs: delay.num_seconds(),
                rule: rule.description.clone(),
            });
        }

        // Keep proximate causes only: a candidate that already explains another
        // candidate is reached through it.
        let all_causes = caused_by.clone();
        caused_by.retain(|link| {
            !all_causes.iter().any(|other| {
                other.alert != link.alert && is_ancestor(&entries, link.alert, other.alert)
            })
        });

        if alert.is_clear() {
            active.remove(&alert.resource_type);
        } else {
            active.insert(alert.resource_type, idx);
        }

        if !caused_by.is_empty() {
            debug!(
                alert = %alert.id,
                causes = ?caused_by.iter().map(|c| c.alert_id.as_str()).collect::<Vec<_>>(),
                "Attributed alert to earlier alerts"
            );
        }

        entries.push(TimelineEntry {
            alert: idx,
            alert_id: alert.id.clone(),
            timestamp: alert.occurred_at,
            event: EventKind::classify(alert),
            severity: alert.severity(),
            caused_by,
            since_start_secs: (alert.occurred_at - start).num_seconds(),
        });
    }

    Timeline { entries }
}

/// True if `ancestor` is reachable from `of` by following cause links.
fn is_ancestor(entries: &[TimelineEntry], ancestor: AlertIdx, of: AlertIdx) -> bool {
    let mut stack = vec![of];
    let mut seen = HashSet::new();
    while let Some(idx) = stack.pop() {
        let Some(entry) = entries.get(idx.0) else {
            continue;
        };
        for cause in entry.cause_indices() {
            if cause == ancestor {
                return true;
            }
            if seen.insert(cause) {
                stack.push(cause);
            }
        }
    }
    false
}
