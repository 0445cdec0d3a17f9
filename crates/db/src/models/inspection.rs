//! Row mapping for the `inspections` table.

use std::collections::BTreeMap;

use sqlx::types::Json;
use sqlx::FromRow;
use vinspect_core::inspection::{InspectionStatus, InspectionType, Section};
use vinspect_core::types::{InspectionId, Timestamp, UserId, VehicleId, Version};
use vinspect_core::Inspection;

use crate::error::StoreError;

/// Column list for `inspections` queries.
pub const INSPECTION_COLUMNS: &str = "id, vehicle_id, inspector_id, kind, status, sections, \
                                      summary, started_at, completed_at, version, pdf_url, \
                                      created_at, updated_at";

/// A row from the `inspections` table.
#[derive(Debug, Clone, FromRow)]
pub struct InspectionRow {
    pub id: InspectionId,
    pub vehicle_id: VehicleId,
    pub inspector_id: UserId,
    pub kind: String,
    pub status: String,
    pub sections: Json<BTreeMap<String, Section>>,
    pub summary: String,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub version: Version,
    pub pdf_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<InspectionRow> for Inspection {
    type Error = StoreError;

    fn try_from(row: InspectionRow) -> Result<Self, Self::Error> {
        let kind =
            InspectionType::from_name(&row.kind).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let status = InspectionStatus::from_name(&row.status)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Inspection {
            id: row.id,
            vehicle_id: row.vehicle_id,
            inspector_id: row.inspector_id,
            kind,
            status,
            sections: row.sections.0,
            summary: row.summary,
            started_at: row.started_at,
            completed_at: row.completed_at,
            version: row.version,
            pdf_url: row.pdf_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
