pub mod health;
pub mod inspection;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /inspections                                              create
/// /inspections/{id}                                         get
/// /inspections/{id}/updates                                 apply field update
/// /inspections/{id}/sections/{section}/complete             complete section
/// /inspections/{id}/sections/{section}/items/{item}/photos  upload photo
/// /inspections/{id}/report                                  PDF report
/// /inspections/{id}/ws                                      live updates (WebSocket)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/inspections", inspection::router())
}
