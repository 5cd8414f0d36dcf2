use crate::alert::Alert;
use crate::analysis::batch::AlertIdx;
use crate::analysis::blast_radius::BlastRadius;
use crate::analysis::cascade::AlertGroup;
use crate::analysis::scoring::{ConfidenceLevel, RootCauseCandidate};
use crate::analysis::timeline::Timeline;
use crate::detect::Severity;
use crate::remediation::Remediation;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything one analysis run learned about a batch of alerts.
///
/// `alerts` is the batch in time order; every `AlertIdx` inside the timeline,
/// groups and candidates indexes into it.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentIntelligence {
    pub root_cause: Option<RootCauseCandidate>,
    pub confidence_level: ConfidenceLevel,
    pub alternatives: Vec<RootCauseCandidate>,
    pub timeline: Timeline,
    pub groups: Vec<AlertGroup>,
    pub blast_radius: BlastRadius,
    pub remediation: Remediation,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: i64,
    pub alert_count: usize,
    pub alerts: Vec<Alert>,
}

impl IncidentIntelligence {
    /// False when the batch held no active alert to blame.
    pub fn is_incident(&self) -> bool {
        self.root_cause.is_some()
    }

    pub fn alert(&self, idx: AlertIdx) -> Option<&Alert> {
        self.alerts.get(idx.0)
    }

    /// Highest severity seen in the batch.
    pub fn severity(&self) -> Severity {
        self.alerts
            .iter()
            .map(Alert::severity)
            .max()
            .unwrap_or(Severity::Info)
    }

    pub fn cascade_groups(&self) -> impl Iterator<Item = &AlertGroup> {
        self.groups.iter().filter(|g| g.is_cascade)
    }

    /// One-line verdict, e.g. for log lines and notification titles.
    pub fn headline(&self) -> String {
        match &self.root_cause {
            Some(root) => format!(
                "{} {} on {} ({}% confidence, {})",
                root.resource_type, root.status, root.host, root.confidence, self.confidence_level
            ),
            None => "No incident: no active alerts".to_string(),
        }
    }
}
