use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the durable store is reachable.
    pub db_healthy: bool,
    /// Inspections resident in the hot store.
    pub hot_entries: usize,
    /// Inspections with unflushed mutations.
    pub pending_flushes: usize,
    /// Inspections with at least one live subscriber.
    pub live_channels: usize,
}

/// GET /health -- returns service and durable store health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = state.service.durable_healthy().await;
    let stats = state.service.stats();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        hot_entries: stats.hot_entries,
        pending_flushes: stats.flush.pending,
        live_channels: stats.bus.channels,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
