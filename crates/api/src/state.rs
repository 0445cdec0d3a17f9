use std::sync::Arc;

use vinspect_live::InspectionService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The live inspection core (hot store, writer, broadcaster, flush, reports).
    pub service: Arc<InspectionService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
