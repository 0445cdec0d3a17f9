//! Route definitions for the `/inspections` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::inspection;
use crate::state::AppState;
use crate::ws;

/// Largest accepted photo upload.
const MAX_PHOTO_BYTES: usize = 20 * 1024 * 1024;

/// Routes mounted at `/inspections`.
///
/// ```text
/// POST   /                                              -> create
/// GET    /{id}                                          -> get_by_id
/// POST   /{id}/updates                                  -> apply_update
/// POST   /{id}/sections/{section}/complete              -> complete_section
/// POST   /{id}/sections/{section}/items/{item}/photos   -> add_photo
/// GET    /{id}/report                                   -> report
/// GET    /{id}/ws                                       -> inspection_ws
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(inspection::create))
        .route("/{id}", get(inspection::get_by_id))
        .route("/{id}/updates", post(inspection::apply_update))
        .route(
            "/{id}/sections/{section}/complete",
            post(inspection::complete_section),
        )
        .route(
            "/{id}/sections/{section}/items/{item}/photos",
            post(inspection::add_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES)),
        )
        .route("/{id}/report", get(inspection::report))
        .route("/{id}/ws", get(ws::inspection_ws))
}
