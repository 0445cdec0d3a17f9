//! In-process [`InspectionStore`] for local development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use vinspect_core::types::InspectionId;
use vinspect_core::Inspection;

use crate::error::StoreError;
use crate::store::InspectionStore;

/// Durable store kept in a process-local map.
///
/// Follows the same overwrite rules as the PostgreSQL store. Availability
/// can be toggled to simulate an outage.
pub struct MemoryInspectionStore {
    records: RwLock<HashMap<InspectionId, Inspection>>,
    available: AtomicBool,
    overwrites: AtomicU64,
}

impl MemoryInspectionStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            overwrites: AtomicU64::new(0),
        }
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`]
    /// (`false`) or succeed again (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of overwrites that actually wrote a record.
    pub fn overwrite_count(&self) -> u64 {
        self.overwrites.load(Ordering::SeqCst)
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "in-memory store marked unavailable".into(),
            ))
        }
    }
}

impl Default for MemoryInspectionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InspectionStore for MemoryInspectionStore {
    async fn create(&self, inspection: &Inspection) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut records = self.records.write().await;
        if records.contains_key(&inspection.id) {
            return Err(StoreError::Duplicate(format!(
                "inspection {} already exists",
                inspection.id
            )));
        }
        records.insert(inspection.id, inspection.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: InspectionId) -> Result<Option<Inspection>, StoreError> {
        self.ensure_available()?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn overwrite(&self, inspection: &Inspection) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut records = self.records.write().await;
        let Some(stored) = records.get_mut(&inspection.id) else {
            return Ok(false);
        };
        if stored.version > inspection.version {
            return Ok(false);
        }

        let pdf_url = inspection.pdf_url.clone().or_else(|| stored.pdf_url.take());
        *stored = Inspection {
            pdf_url,
            // Identity columns are fixed at creation.
            vehicle_id: stored.vehicle_id,
            inspector_id: stored.inspector_id,
            kind: stored.kind,
            created_at: stored.created_at,
            ..inspection.clone()
        };
        self.overwrites.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn set_report_url(&self, id: InspectionId, url: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        match self.records.write().await.get_mut(&id) {
            Some(stored) => {
                stored.pdf_url = Some(url.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_available()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
