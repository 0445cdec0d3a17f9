//! Shared response envelope types for API handlers.
//!
//! JSON responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use serde::Serialize;
use vinspect_core::types::{InspectionId, Version};

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Result of an accepted mutation.
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub inspection_id: InspectionId,
    pub version: Version,
}

/// Result of a photo upload.
#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub inspection_id: InspectionId,
    pub url: String,
    pub version: Version,
}
