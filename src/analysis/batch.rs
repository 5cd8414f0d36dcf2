//! Alert arena for one analysis run.
//!
//! The batch owns its alerts in time order; every derived structure refers to
//! an alert through its [`AlertIdx`] instead of holding a reference.

use crate::alert::{Alert, ResourceType};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Index;

/// Position of an alert inside an [`AlertBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertIdx(pub usize);

#[derive(Debug, Clone, Default)]
pub struct AlertBatch {
    alerts: Vec<Alert>,
}

impl AlertBatch {
    /// Take ownership of an unordered batch and sort it by occurrence time.
    /// The sort is stable: simultaneous alerts keep their input order.
    pub fn new(mut alerts: Vec<Alert>) -> Self {
        alerts.sort_by_key(|a| a.occurred_at);
        Self { alerts }
    }

    pub fn from_slice(alerts: &[Alert]) -> Self {
        Self::new(alerts.to_vec())
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn get(&self, idx: AlertIdx) -> Option<&Alert> {
        self.alerts.get(idx.0)
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn into_alerts(self) -> Vec<Alert> {
        self.alerts
    }

    pub fn iter(&self) -> impl Iterator<Item = (AlertIdx, &Alert)> {
        self.alerts.iter().enumerate().map(|(i, a)| (AlertIdx(i), a))
    }

    /// Indices ordered by `(occurred_at, id)`. Unlike the arena order this
    /// does not depend on how simultaneous alerts arrived.
    pub fn canonical_order(&self) -> Vec<AlertIdx> {
        let mut order: Vec<AlertIdx> = (0..self.alerts.len()).map(AlertIdx).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&self.alerts[a.0], &self.alerts[b.0]);
            a.occurred_at.cmp(&b.occurred_at).then_with(|| a.id.cmp(&b.id))
        });
        order
    }

    pub fn index_of(&self, id: &str) -> Option<AlertIdx> {
        self.alerts.iter().position(|a| a.id == id).map(AlertIdx)
    }

    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.alerts.first().map(|a| a.occurred_at)
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.alerts.last().map(|a| a.occurred_at)
    }

    /// Span between the first and last alert.
    pub fn elapsed(&self) -> Duration {
        match (self.earliest(), self.latest()) {
            (Some(first), Some(last)) => last - first,
            _ => Duration::zero(),
        }
    }

    /// Number of alerts strictly earlier than `idx`. Simultaneous alerts share
    /// a position, so the value does not depend on input order.
    pub fn position(&self, idx: AlertIdx) -> usize {
        let at = self.alerts[idx.0].occurred_at;
        self.alerts.partition_point(|a| a.occurred_at < at)
    }

    pub fn distinct_hosts(&self) -> BTreeSet<&str> {
        self.alerts.iter().map(|a| a.host.as_str()).collect()
    }

    pub fn distinct_resource_types(&self) -> BTreeSet<ResourceType> {
        self.alerts.iter().map(|a| a.resource_type).collect()
    }
}

impl Index<AlertIdx> for AlertBatch {
    type Output = Alert;

    fn index(&self, idx: AlertIdx) -> &Alert {
        &self.alerts[idx.0]
    }
}
