//! Alert sources -- the ingestion boundary in front of the analysis core.

use super::Alert;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Anything that can hand the engine a batch of alerts.
#[async_trait::async_trait]
pub trait AlertSource: Send + Sync {
    /// Short human-readable name used in logs.
    fn name(&self) -> &str;

    /// Fetch one batch. Alerts come back normalized but in source order.
    async fn fetch(&self) -> Result<Vec<Alert>>;
}

/// Accepted document shapes: a bare array or an `{ "alerts": [...] }` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum AlertDocument {
    List(Vec<Alert>),
    Envelope { alerts: Vec<Alert> },
}

impl AlertDocument {
    pub fn into_alerts(self) -> Vec<Alert> {
        let alerts = match self {
            AlertDocument::List(alerts) => alerts,
            AlertDocument::Envelope { alerts } => alerts,
        };
        alerts.into_iter().map(Alert::normalize).collect()
    }
}

/// Parse a JSON alert document from a string.
pub fn parse_alerts(json: &str) -> Result<Vec<Alert>> {
    let doc: AlertDocument =
        serde_json::from_str(json).context("alert document is not a valid alert list")?;
    Ok(doc.into_alerts())
}

/// Reads a JSON alert document from disk.
pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }
}

#[async_trait::async_trait]
impl AlertSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<Alert>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read alert file: {}", self.path.display()))?;
        let alerts = parse_alerts(&content)
            .with_context(|| format!("failed to parse alert file: {}", self.path.display()))?;
        info!(path = %self.path.display(), count = alerts.len(), "Loaded alerts");
        Ok(alerts)
    }
}

/// In-memory source, used by the HTTP handler and in tests.
pub struct StaticSource {
    alerts: Vec<Alert>,
}

impl StaticSource {
    pub fn new(alerts: Vec<Alert>) -> Self {
        Self { alerts }
    }
}

#[async_trait::async_trait]
impl AlertSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<Alert>> {
        debug!(count = self.alerts.len(), "Serving static alert batch");
        Ok(self.alerts.iter().cloned().map(Alert::normalize).collect())
    }
}
