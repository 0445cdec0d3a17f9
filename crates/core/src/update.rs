//! The unit of mutation and of broadcast.
//!
//! An [`InspectionUpdate`] is built by a caller, consumed once by the
//! conflict-checked writer and, once accepted and stamped with its new
//! version, fanned out to every live observer of the inspection.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field_path::FieldPath;
use crate::inspection::Inspection;
use crate::types::{InspectionId, Timestamp, UserId, Version};

/// Semantic tag carried by an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    #[default]
    FieldUpdate,
    PhotoAdded,
    AnnotationAdded,
    SectionCompleted,
    InspectionCreated,
}

impl UpdateKind {
    /// The natural tag for a mutation at `path`.
    pub fn for_path(path: &FieldPath) -> Self {
        match path {
            FieldPath::ItemPhotos { .. } => UpdateKind::PhotoAdded,
            FieldPath::ItemAnnotations { .. } => UpdateKind::AnnotationAdded,
            FieldPath::SectionCompletedAt { .. } => UpdateKind::SectionCompleted,
            _ => UpdateKind::FieldUpdate,
        }
    }
}

/// A single mutation of one inspection document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionUpdate {
    pub inspection_id: InspectionId,

    /// Mutation target. Absent only for lifecycle events such as creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<FieldPath>,

    #[serde(default)]
    pub value: Value,

    pub updated_by: UserId,

    /// The version the writer expects to find in the hot store.
    pub expected_version: Version,

    /// Version assigned on acceptance; `None` until the writer stamps it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,

    #[serde(rename = "type", default)]
    pub kind: UpdateKind,

    #[serde(default = "Utc::now")]
    pub timestamp: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

impl InspectionUpdate {
    /// A field mutation, tagged according to its path.
    pub fn field(
        inspection_id: InspectionId,
        path: FieldPath,
        value: Value,
        updated_by: UserId,
        expected_version: Version,
    ) -> Self {
        Self {
            inspection_id,
            kind: UpdateKind::for_path(&path),
            path: Some(path),
            value,
            updated_by,
            expected_version,
            version: None,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// The `inspection_created` event for a freshly stored inspection.
    pub fn created(inspection: &Inspection, created_by: UserId) -> Self {
        Self {
            inspection_id: inspection.id,
            path: None,
            value: Value::Null,
            updated_by: created_by,
            expected_version: 0,
            version: Some(inspection.version),
            kind: UpdateKind::InspectionCreated,
            timestamp: inspection.created_at,
            metadata: None,
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Default::default)
            .insert(key.into(), value);
        self
    }
}
