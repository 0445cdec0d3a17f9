//! Domain types for live vehicle-inspection documents.
//!
//! This crate has no IO: it defines the inspection model, the typed field
//! paths that address mutation targets inside a document, the update
//! envelope broadcast to observers, the error taxonomy, and the PDF report
//! layout. Storage, fan-out and write-behind live in the other crates.

pub mod error;
pub mod field_path;
pub mod inspection;
pub mod report;
pub mod types;
pub mod update;

pub use error::CoreError;
pub use field_path::FieldPath;
pub use inspection::{
    Annotation, AnnotationKind, Inspection, InspectionStatus, InspectionType, Item, ItemStatus,
    NewInspection, Section,
};
pub use update::{InspectionUpdate, UpdateKind};
