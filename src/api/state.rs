use crate::detect::IncidentEngine;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<IncidentEngine>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: IncidentEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            started_at: Utc::now(),
        }
    }
}
