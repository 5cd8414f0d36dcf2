//! Blast-radius classification: which hosts, resources and charts the
//! incident touched, how badly, and how long recovery is likely to take.

use super::batch::{AlertBatch, AlertIdx};
use super::cascade::cascade_relation;
use super::scoring::RootCauseCandidate;
use super::AnalysisSettings;
use crate::alert::{Alert, ResourceType};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

const HOST_SPREAD_CAP: i64 = 55;
const POINTS_PER_RESOURCE_TYPE: i64 = 5;
const CRITICAL_RATIO_POINTS: f64 = 25.0;
const POINTS_PER_DEPTH: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Host,
    Resource,
    Chart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Direct,
    Indirect,
    None,
}

/// A unit of blast-radius accounting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    pub host: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub impact: Impact,
    pub evidence: String,
    pub first_affected: Option<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl Component {
    fn host(alert: &Alert, impact: Impact, evidence: String) -> Self {
        Self {
            name: alert.host.clone(),
            kind: ComponentKind::Host,
            host: Some(alert.host.clone()),
            resource_type: None,
            impact,
            evidence,
            first_affected: Some(alert.occurred_at),
            values: vec![alert.value],
        }
    }

    fn resource(alert: &Alert, impact: Impact, evidence: String) -> Self {
        Self {
            name: format!("{}/{}", alert.host, alert.resource_type),
            kind: ComponentKind::Resource,
            host: Some(alert.host.clone()),
            resource_type: Some(alert.resource_type),
            impact,
            evidence,
            first_affected: Some(alert.occurred_at),
            values: vec![alert.value],
        }
    }

    fn chart(alert: &Alert, impact: Impact, evidence: String) -> Self {
        Self {
            name: format!("{}:{}", alert.host, alert.chart),
            kind: ComponentKind::Chart,
            host: Some(alert.host.clone()),
            resource_type: Some(alert.resource_type),
            impact,
            evidence,
            first_affected: Some(alert.occurred_at),
            values: vec![alert.value],
        }
    }

    fn unaffected(resource_type: ResourceType) -> Self {
        Self {
            name: resource_type.to_string(),
            kind: ComponentKind::Resource,
            host: None,
            resource_type: Some(resource_type),
            impact: Impact::None,
            evidence: format!("No {} alerts in this batch", resource_type),
            first_affected: None,
            values: Vec::new(),
        }
    }

    fn key(&self) -> (ComponentKind, String) {
        (self.kind, self.name.clone())
    }

    /// Highest metric value reported against this component.
    pub fn peak_value(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn alert_count(&self) -> usize {
        self.values.len()
    }
}

/// Components deduplicated by (kind, name); the first occurrence wins and
/// later ones only contribute their metric values. Callers record in
/// canonical order so "first" does not depend on input order.
#[derive(Default)]
struct ComponentSet {
    index: HashMap<(ComponentKind, String), usize>,
    items: Vec<Component>,
}

impl ComponentSet {
    fn record(&mut self, component: Component) {
        match self.index.get(&component.key()) {
            Some(&pos) => self.items[pos].values.extend(component.values),
            None => {
                self.index.insert(component.key(), self.items.len());
                self.items.push(component);
            }
        }
    }

    fn contains(&self, key: &(ComponentKind, String)) -> bool {
        self.index.contains_key(key)
    }

    fn into_sorted(mut self) -> Vec<Component> {
        for item in &mut self.items {
            item.values.sort_by(f64::total_cmp);
        }
        self.items.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        self.items
    }
}

/// Banded estimate of remediation effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryEstimate {
    pub range: String,
    pub caveat: String,
    pub effort_minutes: i64,
}

impl RecoveryEstimate {
    /// Effort grows with impact score, cascade depth and incident duration.
    pub fn estimate(impact_score: u8, cascade_depth: usize, elapsed: Duration) -> Self {
        let elapsed_term = (elapsed.num_minutes().max(0) / 2).min(60);
        let effort = 10 + i64::from(impact_score) / 2 + 10 * cascade_depth as i64 + elapsed_term;

        let (range, caveat) = match effort {
            i64::MIN..=30 => ("15-30 minutes", "isolated issue with a standard fix"),
            31..=60 => ("30-60 minutes", "requires investigation across related components"),
            61..=120 => ("1-2 hours", "multiple resources affected, coordinate remediation"),
            _ => ("2-4 hours", "complex cascading failure, expect staged recovery"),
        };

        Self {
            range: range.to_string(),
            caveat: caveat.to_string(),
            effort_minutes: effort,
        }
    }

    pub fn none() -> Self {
        Self {
            range: "none".to_string(),
            caveat: "no active impact".to_string(),
            effort_minutes: 0,
        }
    }
}

impl std::fmt::Display for RecoveryEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.range, self.caveat)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlastRadius {
    pub directly_affected: Vec<Component>,
    pub indirectly_affected: Vec<Component>,
    pub unaffected: Vec<Component>,
    pub impact_score: u8,
    pub cascade_depth: usize,
    pub recovery_estimate: RecoveryEstimate,
    pub affected_hosts: usize,
    pub critical_alerts: usize,
    pub total_alerts: usize,
}

impl BlastRadius {
    pub fn is_contained(&self) -> bool {
        self.indirectly_affected.is_empty() && self.affected_hosts <= 1
    }
}

/// Impact score from host spread, resource diversity, critical ratio and depth.
pub fn impact_score(
    host_count: usize,
    resource_type_count: usize,
    critical_alerts: usize,
    total_alerts: usize,
    cascade_depth: usize,
) -> u8 {
    let host_band: i64 = match host_count {
        0 => 0,
        1 => 10,
        2..=3 => 20,
        _ => 30,
    };
    let spread =
        (host_band + POINTS_PER_RESOURCE_TYPE * resource_type_count as i64).min(HOST_SPREAD_CAP);

    let critical = if total_alerts == 0 {
        0
    } else {
        (CRITICAL_RATIO_POINTS * critical_alerts as f64 / total_alerts as f64).round() as i64
    };

    let depth = POINTS_PER_DEPTH * cascade_depth as i64;
    (spread + critical + depth).clamp(0, 100) as u8
}

/// Classify the batch's components around the chosen root cause.
///
/// Alerts are visited by `(occurred_at, id)` so the result is the same for
/// any arrival order of simultaneous alerts.
pub fn classify(
    batch: &AlertBatch,
    root: Option<&RootCauseCandidate>,
    settings: &AnalysisSettings,
) -> BlastRadius {
    let mut direct = ComponentSet::default();
    let mut indirect = ComponentSet::default();
    let order = batch.canonical_order();

    for &idx in &order {
        let alert = &batch[idx];
        if alert.is_clear() {
            continue;
        }
        let same_type = root.is_some_and(|r| r.resource_type == alert.resource_type);
        if !same_type && !alert.is_critical() {
            continue;
        }
        let reason = if same_type {
            "matches root-cause resource type"
        } else {
            "critical severity"
        };
        let evidence = format!(
            "{} {} alert {} ({})",
            alert.resource_type, alert.status, alert.id, reason
        );
        direct.record(Component::host(alert, Impact::Direct, evidence.clone()));
        direct.record(Component::resource(alert, Impact::Direct, evidence.clone()));
        direct.record(Component::chart(alert, Impact::Direct, evidence));
    }

    if let Some(root) = root {
        let window = settings.impact_window();
        for &idx in &order {
            let alert = &batch[idx];
            if alert.is_clear() || alert.resource_type == root.resource_type {
                continue;
            }
            let delay = alert.occurred_at - root.occurred_at;
            if delay <= Duration::zero() || delay > window {
                continue;
            }
            let component = Component::resource(
                alert,
                Impact::Indirect,
                indirect_evidence(batch, &order, idx, delay, settings),
            );
            if direct.contains(&component.key()) {
                continue;
            }
            indirect.record(component);
        }
    }

    let resource_types = batch.distinct_resource_types();
    let mut unaffected: Vec<Component> = ResourceType::CANONICAL
        .iter()
        .filter(|rt| !resource_types.contains(rt))
        .map(|&rt| Component::unaffected(rt))
        .collect();
    unaffected.sort_by(|a, b| a.name.cmp(&b.name));

    let cascade_depth = resource_types.len().saturating_sub(1);
    let host_count = batch.distinct_hosts().len();
    let critical_alerts = batch.alerts().iter().filter(|a| a.is_critical()).count();
    let score = impact_score(
        host_count,
        resource_types.len(),
        critical_alerts,
        batch.len(),
        cascade_depth,
    );

    let directly_affected = direct.into_sorted();
    let indirectly_affected = indirect.into_sorted();
    let recovery_estimate = if directly_affected.is_empty() && indirectly_affected.is_empty() {
        RecoveryEstimate::none()
    } else {
        RecoveryEstimate::estimate(score, cascade_depth, batch.elapsed())
    };

    debug!(
        direct = directly_affected.len(),
        indirect = indirectly_affected.len(),
        unaffected = unaffected.len(),
        impact_score = score,
        cascade_depth,
        "Classified blast radius"
    );

    BlastRadius {
        directly_affected,
        indirectly_affected,
        unaffected,
        impact_score: score,
        cascade_depth,
        recovery_estimate,
        affected_hosts: host_count,
        critical_alerts,
        total_alerts: batch.len(),
    }
}

fn indirect_evidence(
    batch: &AlertBatch,
    order: &[AlertIdx],
    idx: AlertIdx,
    delay: Duration,
    settings: &AnalysisSettings,
) -> String {
    let alert = &batch[idx];
    let mut evidence = format!(
        "{} {} alert {} began {}s after the root cause",
        alert.resource_type,
        alert.status,
        alert.id,
        delay.num_seconds()
    );
    let max_delay = settings.cascade_delay();
    let edge = order.iter().filter(|&&src| src != idx).find_map(|&src| {
        cascade_relation(&batch[src], alert, max_delay).map(|t| (&batch[src], t))
    });
    if let Some((source, edge_type)) = edge {
        evidence.push_str(&format!(
            ", cascade edge from {} (confidence {:.1})",
            source.id,
            edge_type.confidence()
        ));
    }
    evidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cascade::group_alerts;
    use crate::analysis::fixtures::{clear, critical, warning};
    use crate::analysis::rules::RuleTable;
    use crate::analysis::scoring::{rank_candidates, ScoringContext, SreScorer};
    use crate::analysis::timeline::build_timeline;

    fn radius(alerts: Vec<Alert>) -> BlastRadius {
        let batch = AlertBatch::new(alerts);
        let settings = AnalysisSettings::default();
        let rules = RuleTable::builtin();
        let timeline = build_timeline(&batch, &rules);
        let groups = group_alerts(&batch, &settings);
        let ctx = ScoringContext {
            batch: &batch,
            rules: &rules,
            timeline: &timeline,
            groups: &groups,
            settings: &settings,
        };
        let ranked = rank_candidates(&SreScorer, &ctx);
        classify(&batch, ranked.first(), &settings)
    }

    fn names(components: &[Component]) -> Vec<&str> {
        components.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_single_resource_batch_is_contained() {
        let br = radius(vec![
            warning("c1", "h1", ResourceType::Cpu, 0),
            critical("c2", "h1", ResourceType::Cpu, 60),
            warning("c3", "h1", ResourceType::Cpu, 120),
        ]);
        assert!(br.indirectly_affected.is_empty());
        assert_eq!(br.cascade_depth, 0);
        assert!(br.is_contained());
        assert_eq!(
            names(&br.unaffected),
            vec!["disk", "memory", "network", "process"]
        );
        // 10 (one host) + 5 (one type) + round(25 / 3)
        assert_eq!(br.impact_score, 23);
    }

    #[test]
    fn test_direct_and_indirect_are_disjoint() {
        let br = radius(vec![
            critical("mem", "h1", ResourceType::Memory, 0),
            warning("disk", "h1", ResourceType::Disk, 60),
            critical("cpu", "h2", ResourceType::Cpu, 120),
            warning("net", "h3", ResourceType::Network, 900),
        ]);
        assert_eq!(
            names(&br.directly_affected),
            vec!["h1", "h2", "h1/memory", "h2/cpu", "h1:system.memory", "h2:system.cpu"]
        );
        // h2/cpu is both critical and inside the window; it stays direct only.
        assert_eq!(names(&br.indirectly_affected), vec!["h1/disk"]);
        assert_eq!(br.indirectly_affected[0].impact, Impact::Indirect);
        assert_eq!(names(&br.unaffected), vec!["process"]);
        assert_eq!(br.cascade_depth, 3);
    }

    #[test]
    fn test_dedup_accumulates_values() {
        let br = radius(vec![
            critical("m1", "h1", ResourceType::Memory, 0).with_value(91.0),
            critical("m2", "h1", ResourceType::Memory, 30).with_value(97.5),
            critical("m3", "h1", ResourceType::Memory, 60).with_value(94.0),
        ]);
        let mem = br
            .directly_affected
            .iter()
            .find(|c| c.name == "h1/memory")
            .unwrap();
        assert_eq!(mem.alert_count(), 3);
        assert_eq!(mem.peak_value(), Some(97.5));
        assert!(mem.evidence.contains("m1"));
        assert_eq!(mem.first_affected, Some(crate::analysis::fixtures::at(0)));
    }

    #[test]
    fn test_simultaneous_alerts_classify_the_same_in_any_order() {
        let m1 = critical("m1", "h1", ResourceType::Memory, 0).with_value(95.0);
        let m2 = critical("m2", "h1", ResourceType::Memory, 0).with_value(90.0);
        let d = critical("d", "h1", ResourceType::Disk, 60);

        let forward = radius(vec![m1.clone(), m2.clone(), d.clone()]);
        let swapped = radius(vec![m2, m1, d]);

        let mem = forward
            .directly_affected
            .iter()
            .find(|c| c.name == "h1/memory")
            .unwrap();
        assert!(mem.evidence.contains("alert m1"));
        assert_eq!(mem.values, vec![90.0, 95.0]);
        assert_eq!(
            serde_json::to_value(&forward).unwrap(),
            serde_json::to_value(&swapped).unwrap()
        );
    }

    #[test]
    fn test_indirect_evidence_names_the_cascade_source() {
        let br = radius(vec![
            critical("mem", "h1", ResourceType::Memory, 0),
            warning("proc", "h1", ResourceType::Process, 20),
        ]);
        assert_eq!(names(&br.indirectly_affected), vec!["h1/process"]);
        assert!(br.indirectly_affected[0]
            .evidence
            .ends_with("cascade edge from mem (confidence 0.9)"));
    }

    #[test]
    fn test_indirect_window_is_strict() {
        let br = radius(vec![
            warning("root", "h1", ResourceType::Memory, 0),
            warning("at-zero", "h2", ResourceType::Disk, 0),
            warning("late", "h3", ResourceType::Network, 601),
            clear("resolved", "h4", ResourceType::Cpu, 30),
        ]);
        assert!(br.indirectly_affected.is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let br = radius(vec![]);
        assert!(br.directly_affected.is_empty());
        assert_eq!(br.unaffected.len(), 5);
        assert_eq!(br.impact_score, 0);
        assert_eq!(br.cascade_depth, 0);
        assert_eq!(br.recovery_estimate, RecoveryEstimate::none());
    }

    #[test]
    fn test_impact_score_caps() {
        // spread caps at 55, everything clamps at 100
        assert_eq!(impact_score(10, 6, 10, 10, 5), 100);
        assert_eq!(impact_score(5, 6, 0, 10, 0), 55);
        assert_eq!(impact_score(2, 2, 1, 4, 1), 20 + 10 + 6 + 7);
    }

    #[test]
    fn test_recovery_bands_are_monotonic() {
        let small = RecoveryEstimate::estimate(15, 0, Duration::minutes(2));
        assert_eq!(small.range, "15-30 minutes");

        let medium = RecoveryEstimate::estimate(60, 1, Duration::minutes(10));
        assert_eq!(medium.range, "30-60 minutes");

        let large = RecoveryEstimate::estimate(80, 3, Duration::minutes(30));
        assert_eq!(large.range, "1-2 hours");

        let huge = RecoveryEstimate::estimate(100, 4, Duration::hours(3));
        assert_eq!(huge.range, "2-4 hours");
        assert!(huge.to_string().contains("complex cascading failure"));

        assert!(small.effort_minutes < medium.effort_minutes);
        assert!(medium.effort_minutes < large.effort_minutes);
        assert!(large.effort_minutes < huge.effort_minutes);
    }
}
