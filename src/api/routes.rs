//! API route definitions.

use super::state::AppState;
use crate::alert::source::AlertDocument;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/rules", get(list_rules))
        .route("/analyze", post(analyze))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": uptime,
            "strategy": state.engine.strategy_name()
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn list_rules(State(state): State<AppState>) -> Json<Value> {
    let rules = state.engine.rules();
    Json(json!({ "data": rules, "meta": { "total": rules.len() } }))
}

async fn analyze(
    State(state): State<AppState>,
    Json(doc): Json<AlertDocument>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let request_id = Uuid::new_v4();
    let alerts = doc.into_alerts();
    let alert_count = alerts.len();
    info!(%request_id, alerts = alert_count, "Analyze request");

    let engine = state.engine.clone();
    let intel = tokio::task::spawn_blocking(move || engine.analyze(alerts))
        .await
        .map_err(|e| {
            error!(%request_id, error = %e, "Analysis task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "analysis failed", "request_id": request_id })),
            )
        })?;

    Ok(Json(json!({
        "data": intel,
        "meta": {
            "request_id": request_id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "alert_count": alert_count
        }
    })))
}
