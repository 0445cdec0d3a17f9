//! Downstream surface of the live editing core.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use vinspect_core::types::{InspectionId, UserId, Version};
use vinspect_core::{CoreError, FieldPath, Inspection, InspectionUpdate, NewInspection};
use vinspect_db::{InspectionStore, ObjectStore};
use vinspect_events::{BusStats, InspectionBus, Subscription};

use crate::config::LiveConfig;
use crate::hot_store::HotStore;
use crate::renderer::ReportRenderer;
use crate::write_behind::{FlushStats, WriteBehind};
use crate::writer::ConflictCheckedWriter;

/// Point-in-time counters across the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveStats {
    pub hot_entries: usize,
    pub bus: BusStats,
    pub flush: FlushStats,
    pub reports_rendered: u64,
    pub report_cache_hits: u64,
    pub reports_cached: usize,
}

/// What one expiry pass evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Purged {
    pub hot_entries: usize,
    pub reports: usize,
}

/// Creates, reads, mutates, observes and renders inspections.
///
/// The hot store and bus are passed in so the assembling layer can share
/// them with background tasks (the expiry sweeper) and tear them down.
pub struct InspectionService {
    hot: Arc<HotStore>,
    bus: InspectionBus,
    writer: ConflictCheckedWriter,
    write_behind: WriteBehind,
    renderer: ReportRenderer,
    durable: Arc<dyn InspectionStore>,
    objects: Arc<dyn ObjectStore>,
    config: LiveConfig,
}

impl InspectionService {
    /// Wire up the core. Must be called inside a tokio runtime; the
    /// write-behind task is spawned here.
    pub fn new(
        hot: Arc<HotStore>,
        bus: InspectionBus,
        durable: Arc<dyn InspectionStore>,
        objects: Arc<dyn ObjectStore>,
        config: LiveConfig,
    ) -> Self {
        let writer = ConflictCheckedWriter::new(Arc::clone(&hot), bus.clone());
        let write_behind = WriteBehind::start(Arc::clone(&hot), Arc::clone(&durable), config.flush);
        let renderer = ReportRenderer::new(
            Arc::clone(&hot),
            Arc::clone(&durable),
            Arc::clone(&objects),
            config.report_cache_ttl,
        );
        Self {
            hot,
            bus,
            writer,
            write_behind,
            renderer,
            durable,
            objects,
            config,
        }
    }

    pub fn hot_store(&self) -> &Arc<HotStore> {
        &self.hot
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    // -- creation and reads ------------------------------------------------

    /// Persist a new inspection at version 1, make it hot, and announce it.
    pub async fn create_inspection(
        &self,
        input: NewInspection,
        created_by: UserId,
    ) -> Result<Inspection, CoreError> {
        let inspection = Inspection::from_new(uuid::Uuid::now_v7(), input, Utc::now());
        self.durable.create(&inspection).await?;
        self.hot.put(inspection.clone(), self.config.hot_ttl);
        self.bus
            .publish(InspectionUpdate::created(&inspection, created_by));

        tracing::info!(
            inspection_id = %inspection.id,
            vehicle_id = %inspection.vehicle_id,
            kind = inspection.kind.as_str(),
            "Inspection created"
        );
        Ok(inspection)
    }

    /// Current document: the hot copy if resident, otherwise the durable
    /// record, which is then made hot.
    pub async fn get_inspection(&self, id: InspectionId) -> Result<Inspection, CoreError> {
        if let Some(doc) = self.hot.get(id) {
            return Ok(doc);
        }
        let doc = self
            .durable
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::inspection_not_found(id))?;
        tracing::debug!(inspection_id = %id, version = doc.version, "Inspection reloaded from durable store");
        Ok(self.hot.put_if_absent(doc, self.config.hot_ttl))
    }

    // -- mutation ----------------------------------------------------------

    /// Apply a mutation against the hot copy and schedule its flush.
    ///
    /// Fails with [`CoreError::NotHot`] if the inspection is not resident;
    /// see [`Self::apply_update_or_reload`].
    pub fn apply_update(&self, update: InspectionUpdate) -> Result<Version, CoreError> {
        let id = update.inspection_id;
        let version = self.writer.apply(update)?;
        self.write_behind.schedule(id);
        Ok(version)
    }

    /// Like [`Self::apply_update`], but on `NotHot` reloads the inspection
    /// from durable storage once and retries.
    ///
    /// The retry still checks the caller's expected version, so a reload of
    /// an older durable copy yields a conflict rather than a lost update.
    pub async fn apply_update_or_reload(
        &self,
        update: InspectionUpdate,
    ) -> Result<Version, CoreError> {
        match self.apply_update(update.clone()) {
            Err(CoreError::NotHot(id)) => {
                self.get_inspection(id).await?;
                self.apply_update(update)
            }
            other => other,
        }
    }

    /// Stamp `sections.<section>.completed_at` with the current time.
    pub async fn complete_section(
        &self,
        id: InspectionId,
        section: &str,
        user: UserId,
        expected_version: Version,
    ) -> Result<Version, CoreError> {
        let path = FieldPath::SectionCompletedAt {
            section: section_segment(section)?,
        };
        let update = InspectionUpdate::field(id, path, json!(Utc::now()), user, expected_version);
        self.apply_update_or_reload(update).await
    }

    /// Upload a photo and append its URL to the item's photo list.
    ///
    /// Returns the stored URL and the new version. The version is checked
    /// before uploading so a stale caller does not leave an orphan object in
    /// the common case.
    pub async fn add_photo(
        &self,
        id: InspectionId,
        section: &str,
        item: &str,
        bytes: Vec<u8>,
        user: UserId,
        expected_version: Version,
    ) -> Result<(String, Version), CoreError> {
        let path = FieldPath::ItemPhotos {
            section: section_segment(section)?,
            item: section_segment(item)?,
        };
        if bytes.is_empty() {
            return Err(CoreError::Validation("Photo body must not be empty".into()));
        }

        let current = self.get_inspection(id).await?.version;
        if current != expected_version {
            return Err(CoreError::VersionConflict {
                id,
                expected: expected_version,
                current,
            });
        }

        let filename = format!("{item}_{}.jpg", uuid::Uuid::new_v4());
        let object_path = format!("inspections/{id}/{section}/{filename}");
        let size = bytes.len();
        let url = self.objects.put(&object_path, bytes).await?;

        let update = InspectionUpdate::field(id, path, json!(url), user, expected_version)
            .with_metadata("filename", json!(filename))
            .with_metadata("size", json!(size));
        let version = self.apply_update_or_reload(update).await?;

        tracing::info!(inspection_id = %id, section, item, size, version, "Photo added");
        Ok((url, version))
    }

    // -- observation and rendering -----------------------------------------

    /// Live updates accepted from now on. Read the document first (or after
    /// subscribing) and drop updates not newer than that snapshot.
    pub fn subscribe(&self, id: InspectionId) -> Subscription {
        self.bus.subscribe(id)
    }

    /// PDF of the current document, rendered at most once per version.
    pub async fn render_report(&self, id: InspectionId) -> Result<Arc<[u8]>, CoreError> {
        let snapshot = self.get_inspection(id).await?;
        Ok(self.renderer.render(&snapshot).await)
    }

    // -- lifecycle ---------------------------------------------------------

    pub fn stats(&self) -> LiveStats {
        let (reports_rendered, report_cache_hits) = self.renderer.counts();
        LiveStats {
            hot_entries: self.hot.len(),
            bus: self.bus.stats(),
            flush: self.write_behind.stats(),
            reports_rendered,
            report_cache_hits,
            reports_cached: self.renderer.cached_count(),
        }
    }

    /// Evict expired hot entries and cached reports.
    pub fn purge_expired(&self) -> Purged {
        Purged {
            hot_entries: self.hot.purge_expired(),
            reports: self.renderer.purge_expired(),
        }
    }

    /// Whether the durable store answers.
    pub async fn durable_healthy(&self) -> bool {
        self.durable.ping().await.is_ok()
    }

    /// Flush pending mutations (bounded by `timeout`) and close every
    /// subscriber stream.
    pub async fn shutdown(&self, timeout: Duration) {
        self.write_behind.shutdown(timeout).await;
        self.bus.close_all();
    }
}

/// Section and item names become path and object-key segments.
fn section_segment(name: &str) -> Result<String, CoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name.to_string())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid section or item name '{name}'"
        )))
    }
}
