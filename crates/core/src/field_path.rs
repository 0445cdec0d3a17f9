//! Typed addressing of mutation targets inside an inspection document.
//!
//! On the wire a field path is a dotted string such as
//! `sections.engine.items.oil.photos`. Internally it is parsed once into a
//! [`FieldPath`] so every target the writer can touch is enumerated and
//! checked at compile time; [`Display`](std::fmt::Display) renders the
//! exact wire string back.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::inspection::{Annotation, AnnotationKind, Inspection, InspectionStatus, ItemStatus};
use crate::types::{Timestamp, UserId};

/// Section keys that are structural and cannot be used as free-form fields.
const RESERVED_SECTION_KEYS: &[&str] = &["items", "notes", "completed_at"];

/// A parsed mutation target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldPath {
    /// `summary`
    Summary,
    /// `status`
    Status,
    /// `completed_at`
    CompletedAt,
    /// `sections.<section>.notes`
    SectionNotes { section: String },
    /// `sections.<section>.completed_at`
    SectionCompletedAt { section: String },
    /// `sections.<section>.<field>`
    SectionField { section: String, field: String },
    /// `sections.<section>.items.<item>.status`
    ItemStatus { section: String, item: String },
    /// `sections.<section>.items.<item>.value`
    ItemValue { section: String, item: String },
    /// `sections.<section>.items.<item>.notes`
    ItemNotes { section: String, item: String },
    /// `sections.<section>.items.<item>.photos` (append)
    ItemPhotos { section: String, item: String },
    /// `sections.<section>.items.<item>.annotations` (append)
    ItemAnnotations { section: String, item: String },
}

/// Annotation payload as sent by clients; author and time are stamped by
/// the writer.
#[derive(Debug, Deserialize)]
struct AnnotationInput {
    #[serde(rename = "type")]
    kind: AnnotationKind,
    #[serde(default)]
    coordinates: serde_json::Map<String, Value>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

impl FieldPath {
    /// The section this path targets, if any.
    pub fn section(&self) -> Option<&str> {
        match self {
            FieldPath::Summary | FieldPath::Status | FieldPath::CompletedAt => None,
            FieldPath::SectionNotes { section }
            | FieldPath::SectionCompletedAt { section }
            | FieldPath::SectionField { section, .. }
            | FieldPath::ItemStatus { section, .. }
            | FieldPath::ItemValue { section, .. }
            | FieldPath::ItemNotes { section, .. }
            | FieldPath::ItemPhotos { section, .. }
            | FieldPath::ItemAnnotations { section, .. } => Some(section),
        }
    }

    /// Whether applying this path appends to a list rather than replacing.
    pub fn is_append(&self) -> bool {
        matches!(
            self,
            FieldPath::ItemPhotos { .. } | FieldPath::ItemAnnotations { .. }
        )
    }

    /// Write `value` at this path in `doc`.
    ///
    /// The value is decoded into the target's type before anything is
    /// touched, so a decoding failure leaves `doc` unchanged. Missing
    /// sections and items are created. `doc.updated_at` is set to `at`;
    /// the version is left to the caller.
    pub fn apply(
        &self,
        doc: &mut Inspection,
        value: &Value,
        actor: UserId,
        at: Timestamp,
    ) -> Result<(), CoreError> {
        match self {
            FieldPath::Summary => doc.summary = self.decode(value)?,
            FieldPath::Status => doc.status = self.decode::<InspectionStatus>(value)?,
            FieldPath::CompletedAt => doc.completed_at = self.decode::<Option<Timestamp>>(value)?,
            FieldPath::SectionNotes { section } => {
                let notes: String = self.decode(value)?;
                doc.section_mut(section).notes = notes;
            }
            FieldPath::SectionCompletedAt { section } => {
                let completed_at: Option<Timestamp> = self.decode(value)?;
                doc.section_mut(section).completed_at = completed_at;
            }
            FieldPath::SectionField { section, field } => {
                doc.section_mut(section)
                    .fields
                    .insert(field.clone(), value.clone());
            }
            FieldPath::ItemStatus { section, item } => {
                let status: ItemStatus = self.decode(value)?;
                let target = doc.section_mut(section).item_mut(item);
                target.status = status;
                target.updated_at = Some(at);
            }
            FieldPath::ItemValue { section, item } => {
                let target = doc.section_mut(section).item_mut(item);
                target.value = (!value.is_null()).then(|| value.clone());
                target.updated_at = Some(at);
            }
            FieldPath::ItemNotes { section, item } => {
                let notes: String = self.decode(value)?;
                let target = doc.section_mut(section).item_mut(item);
                target.notes = notes;
                target.updated_at = Some(at);
            }
            FieldPath::ItemPhotos { section, item } => {
                let url: String = self.decode(value)?;
                if url.trim().is_empty() {
                    return Err(CoreError::Validation(format!(
                        "Photo URL for '{self}' must not be empty"
                    )));
                }
                let target = doc.section_mut(section).item_mut(item);
                target.photos.push(url);
                target.updated_at = Some(at);
            }
            FieldPath::ItemAnnotations { section, item } => {
                let input: AnnotationInput = self.decode(value)?;
                let target = doc.section_mut(section).item_mut(item);
                target.annotations.push(Annotation {
                    kind: input.kind,
                    coordinates: input.coordinates,
                    text: input.text,
                    color: input.color,
                    created_at: at,
                    created_by: actor,
                });
                target.updated_at = Some(at);
            }
        }
        doc.updated_at = at;
        Ok(())
    }

    fn decode<T: DeserializeOwned>(&self, value: &Value) -> Result<T, CoreError> {
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Validation(format!("Invalid value for '{self}': {e}")))
    }
}

impl FromStr for FieldPath {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(CoreError::Validation(format!(
                "Field path '{raw}' contains an empty segment"
            )));
        }

        let path = match parts.as_slice() {
            ["summary"] => FieldPath::Summary,
            ["status"] => FieldPath::Status,
            ["completed_at"] => FieldPath::CompletedAt,
            ["sections", section, "notes"] => FieldPath::SectionNotes {
                section: section.to_string(),
            },
            ["sections", section, "completed_at"] => FieldPath::SectionCompletedAt {
                section: section.to_string(),
            },
            ["sections", section, field] if !RESERVED_SECTION_KEYS.contains(field) => {
                FieldPath::SectionField {
                    section: section.to_string(),
                    field: field.to_string(),
                }
            }
            ["sections", section, "items", item, leaf] => {
                let (section, item) = (section.to_string(), item.to_string());
                match *leaf {
                    "status" => FieldPath::ItemStatus { section, item },
                    "value" => FieldPath::ItemValue { section, item },
                    "notes" => FieldPath::ItemNotes { section, item },
                    "photos" => FieldPath::ItemPhotos { section, item },
                    "annotations" => FieldPath::ItemAnnotations { section, item },
                    _ => {
                        return Err(CoreError::Validation(format!(
                            "Unsupported item field '{leaf}' in path '{raw}'"
                        )))
                    }
                }
            }
            _ => {
                return Err(CoreError::Validation(format!(
                    "Unsupported field path '{raw}'"
                )))
            }
        };
        Ok(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Summary => f.write_str("summary"),
            FieldPath::Status => f.write_str("status"),
            FieldPath::CompletedAt => f.write_str("completed_at"),
            FieldPath::SectionNotes { section } => write!(f, "sections.{section}.notes"),
            FieldPath::SectionCompletedAt { section } => {
                write!(f, "sections.{section}.completed_at")
            }
            FieldPath::SectionField { section, field } => write!(f, "sections.{section}.{field}"),
            FieldPath::ItemStatus { section, item } => {
                write!(f, "sections.{section}.items.{item}.status")
            }
            FieldPath::ItemValue { section, item } => {
                write!(f, "sections.{section}.items.{item}.value")
            }
            FieldPath::ItemNotes { section, item } => {
                write!(f, "sections.{section}.items.{item}.notes")
            }
            FieldPath::ItemPhotos { section, item } => {
                write!(f, "sections.{section}.items.{item}.photos")
            }
            FieldPath::ItemAnnotations { section, item } => {
                write!(f, "sections.{section}.items.{item}.annotations")
            }
        }
    }
}

impl TryFrom<String> for FieldPath {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspection::{InspectionType, NewInspection};
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    fn doc() -> Inspection {
        let input = NewInspection {
            vehicle_id: uuid::Uuid::new_v4(),
            inspector_id: uuid::Uuid::new_v4(),
            kind: InspectionType::Routine,
            sections: Default::default(),
            summary: String::new(),
            started_at: None,
        };
        Inspection::from_new(uuid::Uuid::new_v4(), input, Utc::now())
    }

    #[test]
    fn parses_every_wire_form_and_renders_it_back() {
        let cases = [
            "summary",
            "status",
            "completed_at",
            "sections.engine.notes",
            "sections.engine.completed_at",
            "sections.engine.oil_level",
            "sections.engine.items.belt.status",
            "sections.engine.items.belt.value",
            "sections.engine.items.belt.notes",
            "sections.engine.items.belt.photos",
            "sections.engine.items.belt.annotations",
        ];
        for raw in cases {
            let path: FieldPath = raw.parse().unwrap();
            assert_eq!(path.to_string(), raw);
        }
    }

    #[test]
    fn section_field_is_a_free_form_target() {
        let path: FieldPath = "sections.engine.oil_level".parse().unwrap();
        assert_eq!(
            path,
            FieldPath::SectionField {
                section: "engine".into(),
                field: "oil_level".into()
            }
        );
        assert_eq!(path.section(), Some("engine"));
    }

    #[test]
    fn rejects_unknown_and_malformed_paths() {
        for raw in [
            "",
            "vehicle",
            "sections",
            "sections.engine",
            "sections..notes",
            "sections.engine.items",
            "sections.engine.items.belt",
            "sections.engine.items.belt.colour",
            "sections.engine.items.belt.photos.0",
        ] {
            assert_matches!(raw.parse::<FieldPath>(), Err(CoreError::Validation(_)), "{raw}");
        }
    }

    #[test]
    fn deserializes_from_wire_string() {
        let path: FieldPath = serde_json::from_value(json!("sections.body.notes")).unwrap();
        assert_eq!(
            path,
            FieldPath::SectionNotes {
                section: "body".into()
            }
        );
        assert_eq!(serde_json::to_value(&path).unwrap(), json!("sections.body.notes"));
        assert!(serde_json::from_value::<FieldPath>(json!("nope.nope")).is_err());
    }

    #[test]
    fn apply_creates_sections_and_items_on_demand() {
        let mut doc = doc();
        let actor = uuid::Uuid::new_v4();
        let at = Utc::now();

        let path: FieldPath = "sections.engine.items.belt.status".parse().unwrap();
        path.apply(&mut doc, &json!("fail"), actor, at).unwrap();

        let item = doc.sections["engine"].item("belt").unwrap();
        assert_eq!(item.status, ItemStatus::Fail);
        assert_eq!(item.updated_at, Some(at));
        assert_eq!(doc.updated_at, at);
    }

    #[test]
    fn photos_and_annotations_append() {
        let mut doc = doc();
        let actor = uuid::Uuid::new_v4();
        let photos: FieldPath = "sections.body.items.door.photos".parse().unwrap();
        let notes: FieldPath = "sections.body.items.door.annotations".parse().unwrap();

        photos.apply(&mut doc, &json!("https://cdn/a.jpg"), actor, Utc::now()).unwrap();
        photos.apply(&mut doc, &json!("https://cdn/b.jpg"), actor, Utc::now()).unwrap();
        notes
            .apply(
                &mut doc,
                &json!({ "type": "damage", "coordinates": { "x": 10, "y": 20 }, "text": "dent" }),
                actor,
                Utc::now(),
            )
            .unwrap();

        let door = doc.sections["body"].item("door").unwrap();
        assert_eq!(door.photos, vec!["https://cdn/a.jpg", "https://cdn/b.jpg"]);
        assert_eq!(door.annotations.len(), 1);
        assert_eq!(door.annotations[0].created_by, actor);
        assert_eq!(door.annotations[0].kind, AnnotationKind::Damage);
        assert!(photos.is_append());
    }

    #[test]
    fn invalid_value_leaves_document_untouched() {
        let mut doc = doc();
        let before = doc.clone();
        let path: FieldPath = "sections.engine.items.belt.status".parse().unwrap();

        let result = path.apply(&mut doc, &json!("excellent"), uuid::Uuid::new_v4(), Utc::now());

        assert_matches!(result, Err(CoreError::Validation(_)));
        assert_eq!(doc, before);
    }

    #[test]
    fn null_item_value_clears_it() {
        let mut doc = doc();
        let actor = uuid::Uuid::new_v4();
        let path: FieldPath = "sections.engine.items.oil.value".parse().unwrap();

        path.apply(&mut doc, &json!({ "level": 3 }), actor, Utc::now()).unwrap();
        assert!(doc.sections["engine"].item("oil").unwrap().value.is_some());

        path.apply(&mut doc, &Value::Null, actor, Utc::now()).unwrap();
        assert!(doc.sections["engine"].item("oil").unwrap().value.is_none());
    }
}
