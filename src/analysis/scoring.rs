//! Root-cause scoring.
//!
//! Every non-clear alert in a batch becomes a [`RootCauseCandidate`] with a
//! confidence score between 0 and 100. The canonical weights live in
//! [`SreScorer`]:
//!
//! | factor                     | points                                   |
//! |----------------------------|------------------------------------------|
//! | timeline position          | 40 if earliest, else `40 - min(30, 5p)`  |
//! | cascade                    | 30 if followed by >= 2 other resource types within the lookahead |
//! | severity                   | critical 15, warning 7                   |
//! | log-correlation proxy      | 15 if critical                           |
//! | resource impact weight     | memory 10, process 9, disk 8, network 7, cpu 6 |
//!
//! The sum is clamped to `[0, 100]`.

use super::batch::{AlertBatch, AlertIdx};
use super::cascade::{cascade_relation, AlertGroup};
use super::rules::RuleTable;
use super::timeline::Timeline;
use super::AnalysisSettings;
use crate::alert::{AlertStatus, ResourceType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

const POSITION_MAX: i32 = 40;
const POSITION_STEP: i32 = 5;
const POSITION_MAX_PENALTY: i32 = 30;
const CASCADE_BONUS: i32 = 30;
const CASCADE_MIN_TYPES: usize = 2;
const CRITICAL_POINTS: i32 = 15;
const WARNING_POINTS: i32 = 7;
const LOG_PROXY_POINTS: i32 = 15;

/// Static impact weight of a resource type.
pub fn resource_weight(resource_type: ResourceType) -> i32 {
    match resource_type {
        ResourceType::Memory => 10,
        ResourceType::Process => 9,
        ResourceType::Disk => 8,
        ResourceType::Network => 7,
        ResourceType::Cpu => 6,
        ResourceType::Unknown => 0,
    }
}

/// Display band for a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "Very High")]
    VeryHigh,
    High,
    Medium,
    Low,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl ConfidenceLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => ConfidenceLevel::VeryHigh,
            60..=79 => ConfidenceLevel::High,
            40..=59 => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::Low,
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfidenceLevel::VeryHigh => "Very High",
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::NotApplicable => "N/A",
        };
        write!(f, "{}", s)
    }
}

/// Points contributed by each factor, before clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub position: i32,
    pub cascade: i32,
    pub severity: i32,
    pub log_proxy: i32,
    pub resource_weight: i32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u8 {
        let sum =
            self.position + self.cascade + self.severity + self.log_proxy + self.resource_weight;
        sum.clamp(0, 100) as u8
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RootCauseCandidate {
    /// Arena slot in this run's batch. Simultaneous alerts may swap slots
    /// between runs, so it is not serialized; `alert_id` identifies the root.
    #[serde(skip)]
    pub alert: AlertIdx,
    pub alert_id: String,
    pub host: String,
    pub chart: String,
    pub resource_type: ResourceType,
    pub status: AlertStatus,
    pub occurred_at: DateTime<Utc>,
    pub confidence: u8,
    pub breakdown: ScoreBreakdown,
    pub evidence: Vec<String>,
    pub reasoning: String,
    pub position: usize,
    pub is_earliest: bool,
    pub has_cascade: bool,
    pub has_log_errors_proxy: bool,
}

impl RootCauseCandidate {
    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }
}

/// Everything a strategy may look at while scoring one alert.
///
/// The timeline and groups follow arena order, which keeps arrival order
/// among simultaneous alerts. Strategies that must give the same answer for
/// any input order should use the helpers below, which only look at
/// timestamps, types and hosts.
pub struct ScoringContext<'a> {
    pub batch: &'a AlertBatch,
    pub rules: &'a RuleTable,
    pub timeline: &'a Timeline,
    pub groups: &'a [AlertGroup],
    pub settings: &'a AnalysisSettings,
}

impl ScoringContext<'_> {
    /// Distinct resource types, other than the alert's own, of non-clear alerts
    /// that follow it within the cascade lookahead.
    pub fn followers(&self, idx: AlertIdx) -> BTreeSet<ResourceType> {
        let origin = &self.batch[idx];
        let horizon = self.settings.cascade_lookahead();
        self.batch
            .alerts()
            .iter()
            .filter(|a| !a.is_clear() && a.resource_type != origin.resource_type)
            .filter(|a| {
                let delay = a.occurred_at - origin.occurred_at;
                delay > chrono::Duration::zero() && delay <= horizon
            })
            .map(|a| a.resource_type)
            .collect()
    }

    /// Non-clear alerts that some propagation rule lets this alert explain.
    pub fn rule_effects(&self, idx: AlertIdx) -> usize {
        let origin = &self.batch[idx];
        self.batch
            .iter()
            .filter(|&(other, a)| other != idx && !a.is_clear())
            .filter(|(_, a)| {
                self.rules.rules().iter().any(|r| {
                    r.from == origin.resource_type
                        && r.to == a.resource_type
                        && r.admits(a.occurred_at - origin.occurred_at)
                })
            })
            .count()
    }

    /// Non-clear alerts that some propagation rule lets explain this alert.
    pub fn rule_causes(&self, idx: AlertIdx) -> usize {
        let effect = &self.batch[idx];
        self.batch
            .iter()
            .filter(|&(other, a)| other != idx && !a.is_clear())
            .filter(|(_, a)| {
                self.rules
                    .into_type(effect.resource_type)
                    .any(|r| r.from == a.resource_type && r.admits(effect.occurred_at - a.occurred_at))
            })
            .count()
    }

    /// Same-host alerts this one has a cascade relation into.
    pub fn cascade_targets(&self, idx: AlertIdx) -> usize {
        let source = &self.batch[idx];
        let max_delay = self.settings.cascade_delay();
        self.batch
            .iter()
            .filter(|&(other, a)| {
                other != idx && cascade_relation(source, a, max_delay).is_some()
            })
            .count()
    }
}

/// A way of turning one alert into a scored candidate.
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, ctx: &ScoringContext<'_>, idx: AlertIdx) -> RootCauseCandidate;
}

/// Rule-based scorer weighing position, cascade, severity and resource impact.
#[derive(Debug, Clone, Copy, Default)]
pub struct SreScorer;

impl ScoringStrategy for SreScorer {
    fn name(&self) -> &'static str {
        "sre"
    }

    fn score(&self, ctx: &ScoringContext<'_>, idx: AlertIdx) -> RootCauseCandidate {
        let alert = &ctx.batch[idx];
        let position = ctx.batch.position(idx);
        let is_earliest = position == 0;
        let followers = ctx.followers(idx);
        let has_cascade = followers.len() >= CASCADE_MIN_TYPES;
        let has_log_errors_proxy = alert.is_critical();

        let mut breakdown = ScoreBreakdown::default();
        let mut evidence = Vec::new();

        if is_earliest {
            breakdown.position = POSITION_MAX;
            evidence.push("First alert in the incident window".to_string());
        } else {
            let penalty = (POSITION_STEP * position as i32).min(POSITION_MAX_PENALTY);
            breakdown.position = POSITION_MAX - penalty;
            evidence.push(format!("Alert #{} in the timeline", position + 1));
        }

        if has_cascade {
            breakdown.cascade = CASCADE_BONUS;
            let names: Vec<&str> = followers.iter().map(|r| r.as_str()).collect();
            evidence.push(format!(
                "Followed by {} alerts within {} minutes",
                names.join(", "),
                ctx.settings.cascade_lookahead_secs / 60
            ));
        }

        breakdown.severity = match alert.status {
            AlertStatus::Critical => CRITICAL_POINTS,
            AlertStatus::Warning => WARNING_POINTS,
            _ => 0,
        };
        if breakdown.severity > 0 {
            evidence.push(format!("Severity {}", alert.status));
        }

        if has_log_errors_proxy {
            breakdown.log_proxy = LOG_PROXY_POINTS;
            evidence.push("Critical state implies correlated error logs".to_string());
        }

        breakdown.resource_weight = resource_weight(alert.resource_type);

        let effects = ctx.rule_effects(idx);
        if effects > 0 {
            evidence.push(format!(
                "Propagation rules link it to {} subsequent alert(s)",
                effects
            ));
        }
        if ctx.rule_causes(idx) == 0 {
            evidence.push("No earlier alert explains it".to_string());
        }
        let targets = ctx.cascade_targets(idx);
        if targets > 0 {
            evidence.push(format!(
                "Same-host cascade into {} alert(s) within {}s",
                targets, ctx.settings.cascade_delay_secs
            ));
        }

        let confidence = breakdown.total();
        let reasoning = reasoning_for(
            alert.resource_type,
            &alert.host,
            is_earliest,
            has_cascade,
            alert.status,
        );

        RootCauseCandidate {
            alert: idx,
            alert_id: alert.id.clone(),
            host: alert.host.clone(),
            chart: alert.chart.clone(),
            resource_type: alert.resource_type,
            status: alert.status,
            occurred_at: alert.occurred_at,
            confidence,
            breakdown,
            evidence,
            reasoning,
            position,
            is_earliest,
            has_cascade,
            has_log_errors_proxy,
        }
    }
}

fn reasoning_for(
    resource_type: ResourceType,
    host: &str,
    is_earliest: bool,
    has_cascade: bool,
    status: AlertStatus,
) -> String {
    let mut reasoning = format!("{} {} on {}", resource_type, status, host);
    match (is_earliest, has_cascade) {
        (true, true) => {
            reasoning.push_str(" fired first and was followed by a multi-resource cascade")
        }
        (true, false) => reasoning.push_str(" fired first"),
        (false, true) => reasoning.push_str(" preceded a multi-resource cascade"),
        (false, false) => reasoning.push_str(" appeared after other alerts"),
    }
    reasoning
}

/// Score every non-clear alert and sort best-first.
///
/// Ties are broken by earlier timeline position, then by alert id.
pub fn rank_candidates(
    strategy: &dyn ScoringStrategy,
    ctx: &ScoringContext<'_>,
) -> Vec<RootCauseCandidate> {
    let mut candidates: Vec<RootCauseCandidate> = ctx
        .batch
        .iter()
        .filter(|(_, alert)| !alert.is_clear())
        .map(|(idx, _)| strategy.score(ctx, idx))
        .collect();

    candidates.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then(a.position.cmp(&b.position))
            .then_with(|| a.alert_id.cmp(&b.alert_id))
    });

    debug!(
        strategy = strategy.name(),
        candidates = candidates.len(),
        top = candidates.first().map(|c| c.alert_id.as_str()),
        "Ranked root-cause candidates"
    );

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Alert;
    use crate::analysis::cascade::group_alerts;
    use crate::analysis::fixtures::{clear, critical, warning};
    use crate::analysis::rules::RuleTable;
    use crate::analysis::timeline::build_timeline;

    fn rank(alerts: Vec<Alert>) -> (AlertBatch, Vec<RootCauseCandidate>) {
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
        (batch, ranked)
    }

    #[test]
    fn test_cascade_scenario_ranks_origin_first() {
        let (_, ranked) = rank(vec![
            critical("a", "h1", ResourceType::Memory, 0),
            critical("b", "h1", ResourceType::Disk, 60),
            critical("c", "h1", ResourceType::Cpu, 180),
        ]);
        assert_eq!(ranked[0].alert_id, "a");
        assert!(ranked[0].is_earliest);
        assert!(ranked[0].has_cascade);
        // 40 + 30 + 15 + 15 + 10 clamps to 100.
        assert_eq!(ranked[0].confidence, 100);
        assert_eq!(ranked[0].confidence_level(), ConfidenceLevel::VeryHigh);

        // b: 35 + 0 + 15 + 15 + 8
        assert_eq!(ranked[1].alert_id, "b");
        assert_eq!(ranked[1].confidence, 73);
        // c: 30 + 0 + 15 + 15 + 6
        assert_eq!(ranked[2].confidence, 66);
    }

    fn find<'a>(ranked: &'a [RootCauseCandidate], id: &str) -> &'a RootCauseCandidate {
        ranked.iter().find(|c| c.alert_id == id).unwrap()
    }

    #[test]
    fn test_cascade_lookahead_is_inclusive() {
        let (_, ranked) = rank(vec![
            critical("mem", "h1", ResourceType::Memory, 0),
            critical("disk", "h1", ResourceType::Disk, 600),
            critical("cpu", "h2", ResourceType::Cpu, 600),
        ]);
        let mem = find(&ranked, "mem");
        assert!(mem.has_cascade);
        assert_eq!(mem.breakdown.cascade, 30);

        let (_, ranked) = rank(vec![
            critical("mem", "h1", ResourceType::Memory, 0),
            critical("disk", "h1", ResourceType::Disk, 601),
            critical("cpu", "h2", ResourceType::Cpu, 601),
        ]);
        let mem = find(&ranked, "mem");
        assert!(!mem.has_cascade);
        assert_eq!(mem.breakdown.cascade, 0);
    }

    #[test]
    fn test_cascade_bonus_needs_two_other_types() {
        let (_, ranked) = rank(vec![
            critical("mem", "h1", ResourceType::Memory, 0),
            critical("d1", "h1", ResourceType::Disk, 60),
            critical("d2", "h2", ResourceType::Disk, 120),
        ]);
        assert!(!find(&ranked, "mem").has_cascade);

        // A second alert of the origin's own type does not count either.
        let (_, ranked) = rank(vec![
            critical("mem", "h1", ResourceType::Memory, 0),
            critical("mem-again", "h1", ResourceType::Memory, 60),
            critical("disk", "h1", ResourceType::Disk, 120),
        ]);
        let mem = find(&ranked, "mem");
        assert!(!mem.has_cascade);
        assert_eq!(mem.confidence, 40 + 15 + 15 + 10);
    }

    #[test]
    fn test_simultaneous_alerts_score_the_same_in_any_order() {
        let m1 = critical("m1", "h1", ResourceType::Memory, 0).with_value(90.0);
        let m2 = critical("m2", "h1", ResourceType::Memory, 0).with_value(95.0);
        let d = critical("d", "h1", ResourceType::Disk, 60);

        let (_, forward) = rank(vec![m1.clone(), m2.clone(), d.clone()]);
        let (_, swapped) = rank(vec![m2, m1, d]);

        assert_eq!(forward[0].alert_id, "m1");
        assert!(forward[0]
            .evidence
            .contains(&"Propagation rules link it to 1 subsequent alert(s)".to_string()));
        assert!(forward[0]
            .evidence
            .contains(&"No earlier alert explains it".to_string()));
        assert_eq!(
            serde_json::to_value(&forward).unwrap(),
            serde_json::to_value(&swapped).unwrap()
        );
    }

    #[test]
    fn test_clear_alerts_are_never_candidates() {
        let (_, ranked) = rank(vec![
            clear("ok", "h1", ResourceType::Memory, 0),
            warning("w", "h1", ResourceType::Cpu, 30),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].alert_id, "w");
    }

    #[test]
    fn test_warning_scoring() {
        let (_, ranked) = rank(vec![warning("w", "h1", ResourceType::Network, 0)]);
        let c = &ranked[0];
        assert_eq!(c.breakdown.position, 40);
        assert_eq!(c.breakdown.severity, 7);
        assert_eq!(c.breakdown.log_proxy, 0);
        assert!(!c.has_log_errors_proxy);
        assert_eq!(c.confidence, 40 + 7 + 7);
        assert_eq!(c.confidence_level(), ConfidenceLevel::Medium);
    }

    #[test]
    fn test_position_penalty_caps_at_thirty() {
        let mut alerts = Vec::new();
        for i in 0..10 {
            alerts.push(warning(&format!("w{}", i), "h1", ResourceType::Unknown, i * 1000));
        }
        let (batch, ranked) = rank(alerts);
        let last = ranked
            .iter()
            .find(|c| c.alert == batch.index_of("w9").unwrap())
            .unwrap();
        assert_eq!(last.breakdown.position, 10);
    }

    #[test]
    fn test_simultaneous_alerts_share_position() {
        let (_, ranked) = rank(vec![
            critical("z", "h1", ResourceType::Disk, 0),
            critical("y", "h2", ResourceType::Disk, 0),
        ]);
        assert!(ranked.iter().all(|c| c.is_earliest));
        // Equal scores fall back to the alert id.
        assert_eq!(ranked[0].alert_id, "y");
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(ConfidenceLevel::from_score(100), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_score(80), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_score(79), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(40), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(39), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::NotApplicable.to_string(), "N/A");
    }

    struct SeverityOnly;

    impl ScoringStrategy for SeverityOnly {
        fn name(&self) -> &'static str {
            "severity-only"
        }

        fn score(&self, ctx: &ScoringContext<'_>, idx: AlertIdx) -> RootCauseCandidate {
            let mut candidate = SreScorer.score(ctx, idx);
            candidate.breakdown = ScoreBreakdown {
                severity: if candidate.status == AlertStatus::Critical { 90 } else { 10 },
                ..Default::default()
            };
            candidate.confidence = candidate.breakdown.total();
            candidate
        }
    }

    #[test]
    fn test_custom_strategy_is_pluggable() {
        let batch = AlertBatch::new(vec![
            warning("early", "h1", ResourceType::Memory, 0),
            critical("late", "h1", ResourceType::Cpu, 600),
        ]);
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
        let ranked = rank_candidates(&SeverityOnly, &ctx);
        assert_eq!(ranked[0].alert_id, "late");
        assert_eq!(ranked[0].confidence, 90);
    }
}
