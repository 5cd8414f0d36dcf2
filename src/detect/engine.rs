use crate::alert::source::AlertSource;
use crate::alert::Alert;
use crate::analysis::batch::AlertBatch;
use crate::analysis::blast_radius::classify;
use crate::analysis::cascade::group_alerts;
use crate::analysis::rules::RuleTable;
use crate::analysis::scoring::{
    rank_candidates, ConfidenceLevel, ScoringContext, ScoringStrategy, SreScorer,
};
use crate::analysis::timeline::build_timeline;
use crate::analysis::AnalysisSettings;
use crate::detect::incident::IncidentIntelligence;
use crate::detect::DetectError;
use crate::remediation::{self, Remediation};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns alert batches into [`IncidentIntelligence`].
///
/// The engine holds only immutable configuration, so one instance can be
/// shared across tasks behind an `Arc` and every call to [`analyze`] is
/// independent.
///
/// [`analyze`]: IncidentEngine::analyze
#[derive(Clone)]
pub struct IncidentEngine {
    rules: RuleTable,
    settings: AnalysisSettings,
    strategy: Arc<dyn ScoringStrategy>,
}

impl IncidentEngine {
    pub fn new(rules: RuleTable, settings: AnalysisSettings) -> Result<Self, DetectError> {
        settings.validate()?;
        Ok(Self {
            rules,
            settings,
            strategy: Arc::new(SreScorer),
        })
    }

    /// Swap the root-cause scorer.
    pub fn with_strategy(mut self, strategy: impl ScoringStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Run the full pipeline over one batch.
    pub fn analyze(&self, alerts: Vec<Alert>) -> IncidentIntelligence {
        let batch = AlertBatch::new(alerts);

        let timeline = build_timeline(&batch, &self.rules);
        let groups = group_alerts(&batch, &self.settings);
        let ctx = ScoringContext {
            batch: &batch,
            rules: &self.rules,
            timeline: &timeline,
            groups: &groups,
            settings: &self.settings,
        };
        let mut ranked = rank_candidates(self.strategy.as_ref(), &ctx).into_iter();
        let root_cause = ranked.next();
        let alternatives: Vec<_> = ranked.take(self.settings.max_alternatives).collect();

        let blast_radius = classify(&batch, root_cause.as_ref(), &self.settings);

        let (confidence_level, remediation) = match &root_cause {
            Some(root) => (root.confidence_level(), remediation::lookup(root.resource_type)),
            None => (ConfidenceLevel::NotApplicable, Remediation::none()),
        };

        let started_at = batch.earliest();
        let ended_at = batch.latest();
        let duration_secs = batch.elapsed().num_seconds();
        let alert_count = batch.len();

        match &root_cause {
            Some(root) => info!(
                alerts = alert_count,
                groups = groups.len(),
                root_cause = %root.alert_id,
                confidence = root.confidence,
                impact = blast_radius.impact_score,
                "Incident analysis complete"
            ),
            None => info!(alerts = alert_count, "No active alerts, nothing to explain"),
        }
        debug!(
            alternatives = alternatives.len(),
            depth = blast_radius.cascade_depth,
            recovery = %blast_radius.recovery_estimate,
            "Incident details"
        );

        IncidentIntelligence {
            root_cause,
            confidence_level,
            alternatives,
            timeline,
            groups,
            blast_radius,
            remediation,
            started_at,
            ended_at,
            duration_secs,
            alert_count,
            alerts: batch.into_alerts(),
        }
    }

    /// Fetch one batch from `source` and analyze it.
    pub async fn analyze_source(&self, source: &dyn AlertSource) -> Result<IncidentIntelligence> {
        let alerts = source
            .fetch()
            .await
            .with_context(|| format!("failed to fetch alerts from {}", source.name()))?;
        info!(source = source.name(), count = alerts.len(), "Analyzing alert batch");
        Ok(self.analyze(alerts))
    }
}

impl Default for IncidentEngine {
    fn default() -> Self {
        Self {
            rules: RuleTable::builtin(),
            settings: AnalysisSettings::default(),
            strategy: Arc::new(SreScorer),
        }
    }
}

impl std::fmt::Debug for IncidentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentEngine")
            .field("rules", &self.rules.len())
            .field("settings", &self.settings)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::source::StaticSource;
    use crate::alert::ResourceType;
    use crate::analysis::batch::AlertIdx;
    use crate::analysis::fixtures::{clear, critical, warning};

    fn cascade() -> Vec<Alert> {
        vec![
            critical("c", "h1", ResourceType::Cpu, 180),
            critical("a", "h1", ResourceType::Memory, 0),
            critical("b", "h1", ResourceType::Disk, 60),
        ]
    }

    #[test]
    fn test_cascade_end_to_end() {
        let engine = IncidentEngine::default();
        let intel = engine.analyze(cascade());

        assert!(intel.is_incident());
        let root = intel.root_cause.as_ref().unwrap();
        assert_eq!(root.alert_id, "a");
        assert_eq!(root.confidence, 100);
        assert_eq!(intel.confidence_level, ConfidenceLevel::VeryHigh);
        assert_eq!(intel.alternatives.len(), 2);
        assert_eq!(intel.timeline.len(), 3);
        assert_eq!(intel.duration_secs, 180);
        assert_eq!(intel.alert_count, 3);
        assert_eq!(intel.blast_radius.cascade_depth, 2);
        assert_eq!(intel.remediation, remediation::lookup(ResourceType::Memory));
        assert_eq!(intel.alert(AlertIdx(0)).unwrap().id, "a");
        assert!(intel.headline().contains("memory critical on h1"));
    }

    #[test]
    fn test_empty_batch_is_no_incident() {
        let intel = IncidentEngine::default().analyze(vec![]);
        assert!(!intel.is_incident());
        assert_eq!(intel.confidence_level, ConfidenceLevel::NotApplicable);
        assert!(intel.alternatives.is_empty());
        assert!(intel.timeline.is_empty());
        assert_eq!(intel.duration_secs, 0);
        assert_eq!(intel.blast_radius.unaffected.len(), 5);
        assert_eq!(intel.remediation, Remediation::none());
    }

    #[test]
    fn test_all_clear_batch_keeps_timeline() {
        let intel = IncidentEngine::default().analyze(vec![
            clear("ok1", "h1", ResourceType::Cpu, 0),
            clear("ok2", "h1", ResourceType::Disk, 30),
        ]);
        assert!(!intel.is_incident());
        assert_eq!(intel.timeline.len(), 2);
        assert_eq!(intel.headline(), "No incident: no active alerts");
    }

    #[test]
    fn test_alternatives_are_truncated() {
        let settings = AnalysisSettings {
            max_alternatives: 1,
            ..Default::default()
        };
        let engine = IncidentEngine::new(RuleTable::builtin(), settings).unwrap();
        let intel = engine.analyze(cascade());
        assert_eq!(intel.alternatives.len(), 1);
        assert_eq!(intel.alternatives[0].alert_id, "b");
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let settings = AnalysisSettings {
            cascade_delay_secs: -1,
            ..Default::default()
        };
        assert!(IncidentEngine::new(RuleTable::builtin(), settings).is_err());
    }

    #[test]
    fn test_severity_is_highest_seen() {
        let intel = IncidentEngine::default().analyze(vec![
            warning("w", "h1", ResourceType::Cpu, 0),
            critical("c", "h2", ResourceType::Disk, 10),
        ]);
        assert_eq!(intel.severity(), crate::detect::Severity::Critical);
    }

    #[tokio::test]
    async fn test_analyze_source() {
        let engine = IncidentEngine::default();
        let source = StaticSource::new(cascade());
        let intel = engine.analyze_source(&source).await.unwrap();
        assert_eq!(intel.root_cause.unwrap().alert_id, "a");
    }
}
