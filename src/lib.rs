//! alertlens -- causal analysis for monitoring alert storms.
//!
//! Takes an unordered batch of threshold alerts and explains it: an ordered
//! causal timeline, a scored root cause with ranked alternatives, and the
//! blast radius of the incident.

pub mod alert;
pub mod analysis;
pub mod api;
pub mod config;
pub mod detect;
pub mod remediation;
pub mod report;

use anyhow::{Context, Result};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AlertLensConfig;

/// Start the HTTP API and serve until the listener fails.
pub async fn serve(config: &AlertLensConfig) -> Result<()> {
    let engine = config.engine()?;
    tracing::info!(
        rules = engine.rules().len(),
        strategy = engine.strategy_name(),
        "Incident engine ready"
    );

    let app = api::router(api::state::AppState::new(engine))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));
    let app = if config.server.permissive_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;
    tracing::info!(%addr, "alertlens listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
