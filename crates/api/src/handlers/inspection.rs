//! Handlers for the `/inspections` resource.

use axum::body::{Body, Bytes};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use vinspect_core::types::{InspectionId, Version};
use vinspect_core::{FieldPath, Inspection, InspectionUpdate, NewInspection};

use crate::error::{AppError, AppResult};
use crate::middleware::acting_user::ActingUser;
use crate::response::{DataResponse, PhotoResponse, VersionResponse};
use crate::state::AppState;

/// Body of `POST /inspections/{id}/updates`.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub path: FieldPath,
    #[serde(default)]
    pub value: Value,
    pub expected_version: Version,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

/// Body of `POST /inspections/{id}/sections/{section}/complete`.
#[derive(Debug, Deserialize)]
pub struct CompleteSectionRequest {
    pub expected_version: Version,
}

/// Query of the photo upload route.
#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    pub expected_version: Version,
}

/// POST /api/v1/inspections
pub async fn create(
    State(state): State<AppState>,
    user: ActingUser,
    Json(input): Json<NewInspection>,
) -> AppResult<(StatusCode, Json<DataResponse<Inspection>>)> {
    let inspection = state
        .service
        .create_inspection(input, user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: inspection })))
}

/// GET /api/v1/inspections/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<InspectionId>,
) -> AppResult<Json<DataResponse<Inspection>>> {
    let inspection = state.service.get_inspection(id).await?;
    Ok(Json(DataResponse { data: inspection }))
}

/// POST /api/v1/inspections/{id}/updates
pub async fn apply_update(
    State(state): State<AppState>,
    Path(id): Path<InspectionId>,
    user: ActingUser,
    Json(input): Json<UpdateRequest>,
) -> AppResult<Json<DataResponse<VersionResponse>>> {
    let mut update =
        InspectionUpdate::field(id, input.path, input.value, user.user_id, input.expected_version);
    update.metadata = input.metadata;

    let version = state.service.apply_update_or_reload(update).await?;
    Ok(Json(DataResponse {
        data: VersionResponse {
            inspection_id: id,
            version,
        },
    }))
}

/// POST /api/v1/inspections/{id}/sections/{section}/complete
pub async fn complete_section(
    State(state): State<AppState>,
    Path((id, section)): Path<(InspectionId, String)>,
    user: ActingUser,
    Json(input): Json<CompleteSectionRequest>,
) -> AppResult<Json<DataResponse<VersionResponse>>> {
    let version = state
        .service
        .complete_section(id, &section, user.user_id, input.expected_version)
        .await?;
    Ok(Json(DataResponse {
        data: VersionResponse {
            inspection_id: id,
            version,
        },
    }))
}

/// POST /api/v1/inspections/{id}/sections/{section}/items/{item}/photos
///
/// The request body is the raw image; `expected_version` is a query
/// parameter.
pub async fn add_photo(
    State(state): State<AppState>,
    Path((id, section, item)): Path<(InspectionId, String, String)>,
    query: Result<Query<PhotoQuery>, QueryRejection>,
    user: ActingUser,
    body: Bytes,
) -> AppResult<(StatusCode, Json<DataResponse<PhotoResponse>>)> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let (url, version) = state
        .service
        .add_photo(
            id,
            &section,
            &item,
            body.to_vec(),
            user.user_id,
            query.expected_version,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: PhotoResponse {
                inspection_id: id,
                url,
                version,
            },
        }),
    ))
}

/// GET /api/v1/inspections/{id}/report
pub async fn report(
    State(state): State<AppState>,
    Path(id): Path<InspectionId>,
) -> AppResult<Response> {
    let pdf = state.service.render_report(id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"inspection-{id}.pdf\""),
            ),
        ],
        Body::from(pdf.to_vec()),
    )
        .into_response())
}
