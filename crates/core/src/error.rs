use crate::types::{InspectionId, Version};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound {
        entity: &'static str,
        id: InspectionId,
    },

    /// The caller's expected version has been superseded by another writer.
    #[error("Version conflict on inspection {id}: expected {expected}, current {current}")]
    VersionConflict {
        id: InspectionId,
        expected: Version,
        current: Version,
    },

    /// The inspection is not resident in the hot store; reload it first.
    #[error("Inspection {0} is not loaded in the hot store")]
    NotHot(InspectionId),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Convenience constructor for a missing inspection.
    pub fn inspection_not_found(id: InspectionId) -> Self {
        CoreError::NotFound {
            entity: "inspection",
            id,
        }
    }
}
