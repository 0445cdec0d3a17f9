//! Acting-user extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use vinspect_core::types::UserId;

use crate::error::AppError;

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf a request is made.
///
/// Authentication happens upstream; this only reads the resolved id:
///
/// ```ignore
/// async fn my_handler(user: ActingUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ActingUser {
    pub user_id: UserId,
}

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?;

        let user_id = raw.trim().parse().map_err(|_| {
            AppError::Unauthorized(format!("{USER_ID_HEADER} must be a UUID"))
        })?;

        Ok(ActingUser { user_id })
    }
}
