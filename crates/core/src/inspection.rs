//! The inspection aggregate and its nested checklist structure.
//!
//! An [`Inspection`] owns a map of named [`Section`]s, each holding a list
//! of [`Item`]s, each of which may carry photo URLs and [`Annotation`]s.
//! Vehicles and inspectors are referenced by id only; loading them is the
//! job of the CRUD layer, never of this crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{InspectionId, Timestamp, UserId, VehicleId, Version};

/// Version assigned to a freshly created inspection.
pub const INITIAL_VERSION: Version = 1;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Why the vehicle is being inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionType {
    Entry,
    Routine,
    Exit,
    Special,
}

impl InspectionType {
    /// Database / wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Routine => "routine",
            Self::Exit => "exit",
            Self::Special => "special",
        }
    }

    /// Parse from the database `kind` column.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "entry" => Ok(Self::Entry),
            "routine" => Ok(Self::Routine),
            "exit" => Ok(Self::Exit),
            "special" => Ok(Self::Special),
            other => Err(CoreError::Validation(format!(
                "Unknown inspection type '{other}'"
            ))),
        }
    }
}

/// Lifecycle status of an inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
    Approved,
}

impl InspectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Approved => "approved",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "draft" => Ok(Self::Draft),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "approved" => Ok(Self::Approved),
            other => Err(CoreError::Validation(format!(
                "Unknown inspection status '{other}'"
            ))),
        }
    }
}

/// Outcome of a single checklist item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Ok,
    Warning,
    Fail,
    #[serde(rename = "na", alias = "not_applicable")]
    NotApplicable,
    #[default]
    Pending,
}

impl ItemStatus {
    /// Label used in rendered reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Fail => "FAIL",
            Self::NotApplicable => "N/A",
            Self::Pending => "PENDING",
        }
    }
}

/// Shape of a photo-overlay annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Arrow,
    Circle,
    Text,
    Damage,
}

// ---------------------------------------------------------------------------
// Document structure
// ---------------------------------------------------------------------------

/// Photo-overlay markup attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    /// Free-form geometry (`x`, `y`, `radius`, ...), interpreted by the client.
    pub coordinates: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: Timestamp,
    pub created_by: UserId,
}

/// A single inspection point inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Item {
    /// An empty, pending item with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            category: String::new(),
            status: ItemStatus::Pending,
            value: None,
            notes: String::new(),
            photos: Vec::new(),
            annotations: Vec::new(),
            updated_at: None,
        }
    }
}

/// A named group of checklist items.
///
/// Besides its items, a section carries free-form checklist fields (e.g.
/// `oil_level`) that are stored inline next to `notes` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Section {
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Get the item with `id`, appending a new pending one if absent.
    pub fn item_mut(&mut self, id: &str) -> &mut Item {
        let index = match self.items.iter().position(|item| item.id == id) {
            Some(index) => index,
            None => {
                self.items.push(Item::new(id));
                self.items.len() - 1
            }
        };
        &mut self.items[index]
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// The inspection aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub id: InspectionId,
    pub vehicle_id: VehicleId,
    pub inspector_id: UserId,
    #[serde(rename = "type")]
    pub kind: InspectionType,
    pub status: InspectionStatus,
    #[serde(default)]
    pub sections: BTreeMap<String, Section>,
    #[serde(default)]
    pub summary: String,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    pub version: Version,
    /// Reference to the most recently rendered report artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Inspection {
    /// Build a fresh draft at [`INITIAL_VERSION`] from a creation request.
    pub fn from_new(id: InspectionId, input: NewInspection, now: Timestamp) -> Self {
        Self {
            id,
            vehicle_id: input.vehicle_id,
            inspector_id: input.inspector_id,
            kind: input.kind,
            status: InspectionStatus::Draft,
            sections: input.sections,
            summary: input.summary,
            started_at: input.started_at.unwrap_or(now),
            completed_at: None,
            version: INITIAL_VERSION,
            pdf_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(
            self.status,
            InspectionStatus::Completed | InspectionStatus::Approved
        )
    }

    /// Whether the checklist is still open for editing.
    pub fn can_edit(&self) -> bool {
        matches!(
            self.status,
            InspectionStatus::Draft | InspectionStatus::InProgress
        )
    }

    /// Get the named section, creating an empty one if absent.
    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        self.sections.entry(name.to_string()).or_default()
    }
}

/// Creation request for an inspection; id, version and status are assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInspection {
    pub vehicle_id: VehicleId,
    pub inspector_id: UserId,
    #[serde(rename = "type")]
    pub kind: InspectionType,
    #[serde(default)]
    pub sections: BTreeMap<String, Section>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
