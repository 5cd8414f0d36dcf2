//! Cascade grouping: clusters related alerts and records the cascade edges
//! observed inside each cluster.

use super::batch::{AlertBatch, AlertIdx};
use super::AnalysisSettings;
use crate::alert::{Alert, AlertStatus, ResourceType};
use chrono::Duration;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Resource pairs known to cascade on the same host (cause, effect).
const RESOURCE_PAIRS: &[(ResourceType, ResourceType)] = &[
    (ResourceType::Cpu, ResourceType::Process),
    (ResourceType::Memory, ResourceType::Process),
    (ResourceType::Disk, ResourceType::Process),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// A known resource pair such as memory -> process.
    ResourcePair,
    /// A warning followed by a critical alert.
    Escalation,
}

impl EdgeType {
    pub fn confidence(&self) -> f64 {
        match self {
            EdgeType::ResourcePair => 0.9,
            EdgeType::Escalation => 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeEdge {
    pub source: AlertIdx,
    pub source_id: String,
    pub target: AlertIdx,
    pub target_id: String,
    pub delay_secs: i64,
    pub confidence: f64,
    pub edge_type: EdgeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    SingleHost,
    MultiHost,
    Cascading,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertGroup {
    pub id: usize,
    pub seed: AlertIdx,
    pub members: Vec<AlertIdx>,
    pub hosts: Vec<String>,
    pub resource_types: Vec<ResourceType>,
    pub is_cascade: bool,
    pub edges: Vec<CascadeEdge>,
    pub kind: GroupKind,
}

impl AlertGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, idx: AlertIdx) -> bool {
        self.members.contains(&idx)
    }

    /// The edge that pulled `idx` into this group's cascade, if any.
    pub fn edge_into(&self, idx: AlertIdx) -> Option<&CascadeEdge> {
        self.edges.iter().find(|e| e.target == idx)
    }
}

/// Same-host cascade between two alerts, if one exists.
pub(crate) fn cascade_relation(source: &Alert, target: &Alert, max_delay: Duration) -> Option<EdgeType> {
    if source.host != target.host || source.is_clear() || target.is_clear() {
        return None;
    }
    let delay = target.occurred_at - source.occurred_at;
    if delay < Duration::zero() || delay > max_delay {
        return None;
    }
    if RESOURCE_PAIRS.contains(&(source.resource_type, target.resource_type)) {
        Some(EdgeType::ResourcePair)
    } else if source.status == AlertStatus::Warning && target.status == AlertStatus::Critical {
        Some(EdgeType::Escalation)
    } else {
        None
    }
}

/// CPU or memory pressure followed by network or disk symptoms, on any host.
fn dependency_relation(source: &Alert, target: &Alert) -> bool {
    !source.is_clear()
        && target.occurred_at >= source.occurred_at
        && matches!(source.resource_type, ResourceType::Cpu | ResourceType::Memory)
        && matches!(target.resource_type, ResourceType::Network | ResourceType::Disk)
}

/// Partition the batch into alert groups. Every alert lands in exactly one group.
pub fn group_alerts(batch: &AlertBatch, settings: &AnalysisSettings) -> Vec<AlertGroup> {
    let alerts = batch.alerts();
    let window = settings.correlation_window();
    let max_delay = settings.cascade_delay();

    let mut processed = vec![false; alerts.len()];
    let mut groups = Vec::new();

    for (seed_idx, seed) in batch.iter() {
        if processed[seed_idx.0] {
            continue;
        }
        processed[seed_idx.0] = true;

        let mut members = vec![seed_idx];
        let mut edges = Vec::new();

        for (offset, candidate) in alerts.iter().enumerate().skip(seed_idx.0 + 1) {
            if candidate.occurred_at - seed.occurred_at > window {
                break;
            }
            if processed[offset] {
                continue;
            }
            // Cascade relations are same-host by definition, so host equality covers them.
            let related = seed.host == candidate.host || dependency_relation(seed, candidate);
            if !related {
                continue;
            }

            let cand_idx = AlertIdx(offset);
            let link = members.iter().rev().find_map(|&m| {
                cascade_relation(&batch[m], candidate, max_delay).map(|t| (m, t))
            });
            if let Some((source_idx, edge_type)) = link {
                let source = &batch[source_idx];
                edges.push(CascadeEdge {
                    source: source_idx,
                    source_id: source.id.clone(),
                    target: cand_idx,
                    target_id: candidate.id.clone(),
                    delay_secs: (candidate.occurred_at - source.occurred_at).num_seconds(),
                    confidence: edge_type.confidence(),
                    edge_type,
                });
            }

            processed[offset] = true;
            members.push(cand_idx);
        }

        let hosts: BTreeSet<&str> = members.iter().map(|&m| batch[m].host.as_str()).collect();
        let resource_types: BTreeSet<ResourceType> =
            members.iter().map(|&m| batch[m].resource_type).collect();

        let kind = if !edges.is_empty() {
            GroupKind::Cascading
        } else if hosts.len() > 1 {
            GroupKind::MultiHost
        } else {
            GroupKind::SingleHost
        };

        debug!(
            group = groups.len(),
            seed = %seed.id,
            members = members.len(),
            edges = edges.len(),
            ?kind,
            "Formed alert group"
        );

        groups.push(AlertGroup {
            id: groups.len(),
            seed: seed_idx,
            members,
            hosts: hosts.into_iter().map(str::to_string).collect(),
            resource_types: resource_types.into_iter().collect(),
            is_cascade: kind == GroupKind::Cascading,
            edges,
            kind,
        });
    }

    groups
}
