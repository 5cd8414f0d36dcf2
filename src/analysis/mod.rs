//! Causal analysis core: timeline attribution, cascade grouping, root-cause
//! scoring and blast-radius classification.
//!
//! Everything in here is a pure function of one [`batch::AlertBatch`] plus
//! immutable settings, so runs can execute concurrently without locking.

pub mod batch;
pub mod blast_radius;
pub mod cascade;
pub mod rules;
pub mod scoring;
pub mod timeline;

use crate::detect::DetectError;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Longest window any setting or propagation rule may use: one week.
pub const MAX_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

/// Window length as a duration. Values outside `0..=MAX_WINDOW_SECS` are
/// clamped; validation rejects them before an engine is built.
pub(crate) fn bounded_window(secs: i64) -> Duration {
    Duration::seconds(secs.clamp(0, MAX_WINDOW_SECS))
}

/// Tunable windows for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// How far after a group's seed the grouper keeps absorbing alerts.
    pub correlation_window_secs: i64,
    /// Maximum same-host delay for a cascade edge.
    pub cascade_delay_secs: i64,
    /// Lookahead the scorer uses for its cascade bonus.
    pub cascade_lookahead_secs: i64,
    /// Window after the root cause in which other resources count as indirectly hit.
    pub impact_window_secs: i64,
    /// Ranked alternatives kept in the final result.
    pub max_alternatives: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            correlation_window_secs: 5 * 60,
            cascade_delay_secs: 30,
            cascade_lookahead_secs: 10 * 60,
            impact_window_secs: 10 * 60,
            max_alternatives: 5,
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> Result<(), DetectError> {
        let windows = [
            ("correlation_window_secs", self.correlation_window_secs),
            ("cascade_delay_secs", self.cascade_delay_secs),
            ("cascade_lookahead_secs", self.cascade_lookahead_secs),
            ("impact_window_secs", self.impact_window_secs),
        ];
        for (name, secs) in windows {
            if !(1..=MAX_WINDOW_SECS).contains(&secs) {
                return Err(DetectError::InvalidSetting {
                    name,
                    reason: format!(
                        "must be between 1 and {} seconds, got {}",
                        MAX_WINDOW_SECS, secs
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn correlation_window(&self) -> Duration {
        bounded_window(self.correlation_window_secs)
    }

    pub fn cascade_delay(&self) -> Duration {
        bounded_window(self.cascade_delay_secs)
    }

    pub fn cascade_lookahead(&self) -> Duration {
        bounded_window(self.cascade_lookahead_secs)
    }

    pub fn impact_window(&self) -> Duration {
        bounded_window(self.impact_window_secs)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared alert builders for the analysis tests.

    use crate::alert::{Alert, AlertStatus, ResourceType};
    use chrono::{DateTime, Utc};

    pub fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    pub fn critical(id: &str, host: &str, rt: ResourceType, secs: i64) -> Alert {
        Alert::new(id, host, rt, AlertStatus::Critical, at(secs))
    }

    pub fn warning(id: &str, host: &str, rt: ResourceType, secs: i64) -> Alert {
        Alert::new(id, host, rt, AlertStatus::Warning, at(secs))
    }

    pub fn clear(id: &str, host: &str, rt: ResourceType, secs: i64) -> Alert {
        Alert::new(id, host, rt, AlertStatus::Clear, at(secs)).with_previous(AlertStatus::Critical)
    }
}
