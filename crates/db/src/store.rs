//! The durable record store contract.

use async_trait::async_trait;
use vinspect_core::types::InspectionId;
use vinspect_core::Inspection;

use crate::error::StoreError;

/// System of record for inspections.
///
/// Written only by the creation path and by the write-behind reconciler;
/// field-mutation writers never touch it directly.
///
/// ## Overwrite semantics
///
/// `overwrite` replaces the whole record (sections included) but only if the
/// stored version is not newer than the incoming one. Writing the same state
/// twice is therefore idempotent, and a delayed flush of an older snapshot
/// can never regress the record. The report reference is kept when the
/// incoming document has none.
#[async_trait]
pub trait InspectionStore: Send + Sync + 'static {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn create(&self, inspection: &Inspection) -> Result<(), StoreError>;

    /// Fetch a record by id.
    async fn get_by_id(&self, id: InspectionId) -> Result<Option<Inspection>, StoreError>;

    /// Replace a record with a newer (or identical) snapshot.
    ///
    /// Returns `false` when nothing was written because the record is
    /// missing or already holds a newer version.
    async fn overwrite(&self, inspection: &Inspection) -> Result<bool, StoreError>;

    /// Attach a rendered-report reference without touching the version.
    async fn set_report_url(&self, id: InspectionId, url: &str) -> Result<bool, StoreError>;

    /// Verify the store is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
