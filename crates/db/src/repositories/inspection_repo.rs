//! Repository for the `inspections` table.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use vinspect_core::types::InspectionId;
use vinspect_core::Inspection;

use crate::error::StoreError;
use crate::models::inspection::{InspectionRow, INSPECTION_COLUMNS};
use crate::store::InspectionStore;

/// Provides queries for durable inspection records.
pub struct InspectionRepo;

impl InspectionRepo {
    /// Insert a new inspection row.
    pub async fn insert(pool: &PgPool, inspection: &Inspection) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO inspections \
                (id, vehicle_id, inspector_id, kind, status, sections, summary, \
                 started_at, completed_at, version, pdf_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(inspection.id)
        .bind(inspection.vehicle_id)
        .bind(inspection.inspector_id)
        .bind(inspection.kind.as_str())
        .bind(inspection.status.as_str())
        .bind(Json(&inspection.sections))
        .bind(&inspection.summary)
        .bind(inspection.started_at)
        .bind(inspection.completed_at)
        .bind(inspection.version)
        .bind(&inspection.pdf_url)
        .bind(inspection.created_at)
        .bind(inspection.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find an inspection row by id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: InspectionId,
    ) -> Result<Option<InspectionRow>, sqlx::Error> {
        let query = format!("SELECT {INSPECTION_COLUMNS} FROM inspections WHERE id = $1");
        sqlx::query_as::<_, InspectionRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Replace every mutable column, unless the stored version is newer.
    ///
    /// `pdf_url` is only replaced when the incoming document carries one.
    /// Returns `true` if a row was written.
    pub async fn overwrite(pool: &PgPool, inspection: &Inspection) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE inspections SET \
                status = $2, sections = $3, summary = $4, started_at = $5, \
                completed_at = $6, version = $7, pdf_url = COALESCE($8, pdf_url), \
                updated_at = $9 \
             WHERE id = $1 AND version <= $7",
        )
        .bind(inspection.id)
        .bind(inspection.status.as_str())
        .bind(Json(&inspection.sections))
        .bind(&inspection.summary)
        .bind(inspection.started_at)
        .bind(inspection.completed_at)
        .bind(inspection.version)
        .bind(&inspection.pdf_url)
        .bind(inspection.updated_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the rendered-report reference. Does not change `version`.
    pub async fn set_pdf_url(pool: &PgPool, id: InspectionId, url: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE inspections SET pdf_url = $2 WHERE id = $1")
            .bind(id)
            .bind(url)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// PgInspectionStore
// ---------------------------------------------------------------------------

/// [`InspectionStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgInspectionStore {
    pool: PgPool,
}

impl PgInspectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InspectionStore for PgInspectionStore {
    async fn create(&self, inspection: &Inspection) -> Result<(), StoreError> {
        InspectionRepo::insert(&self.pool, inspection).await?;
        Ok(())
    }

    async fn get_by_id(&self, id: InspectionId) -> Result<Option<Inspection>, StoreError> {
        InspectionRepo::find_by_id(&self.pool, id)
            .await?
            .map(Inspection::try_from)
            .transpose()
    }

    async fn overwrite(&self, inspection: &Inspection) -> Result<bool, StoreError> {
        Ok(InspectionRepo::overwrite(&self.pool, inspection).await?)
    }

    async fn set_report_url(&self, id: InspectionId, url: &str) -> Result<bool, StoreError> {
        Ok(InspectionRepo::set_pdf_url(&self.pool, id, url).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
