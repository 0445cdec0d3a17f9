//! Versioned PDF report cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use vinspect_core::report::{render_pdf, report_object_path};
use vinspect_core::types::{InspectionId, Version};
use vinspect_core::Inspection;
use vinspect_db::{InspectionStore, ObjectStore};

use crate::hot_store::HotStore;

struct CachedReport {
    version: Version,
    bytes: Arc<[u8]>,
    rendered_at: Instant,
}

/// Renders inspection snapshots to PDF, at most once per
/// `(inspection, version)` while the cache entry lives.
///
/// Only the newest rendered version of each inspection is kept. Rendering
/// never changes the document version; the artifact URL is recorded on the
/// hot and durable copies as a side note.
pub struct ReportRenderer {
    cache: DashMap<InspectionId, CachedReport>,
    ttl: Duration,
    hot: Arc<HotStore>,
    durable: Arc<dyn InspectionStore>,
    objects: Arc<dyn ObjectStore>,
    renders: AtomicU64,
    hits: AtomicU64,
}

impl ReportRenderer {
    pub fn new(
        hot: Arc<HotStore>,
        durable: Arc<dyn InspectionStore>,
        objects: Arc<dyn ObjectStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
            hot,
            durable,
            objects,
            renders: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// PDF bytes for `snapshot` at its current version.
    ///
    /// On a cache miss the report is rendered, cached, and stored under
    /// `reports/<id>/v<version>.pdf`. Storage problems are logged and do not
    /// fail the render.
    pub async fn render(&self, snapshot: &Inspection) -> Arc<[u8]> {
        if let Some(bytes) = self.cached(snapshot.id, snapshot.version) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(inspection_id = %snapshot.id, version = snapshot.version, "Report cache hit");
            return bytes;
        }

        let bytes: Arc<[u8]> = render_pdf(snapshot).into();
        self.renders.fetch_add(1, Ordering::Relaxed);
        self.remember(snapshot.id, snapshot.version, Arc::clone(&bytes));
        tracing::info!(
            inspection_id = %snapshot.id,
            version = snapshot.version,
            size = bytes.len(),
            "Report rendered"
        );

        self.store_artifact(snapshot, &bytes).await;
        bytes
    }

    /// `(renders, cache hits)` since start.
    pub fn counts(&self) -> (u64, u64) {
        (
            self.renders.load(Ordering::Relaxed),
            self.hits.load(Ordering::Relaxed),
        )
    }

    /// Drop every cache entry older than the TTL. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, report| report.rendered_at.elapsed() < self.ttl);
        before.saturating_sub(self.cache.len())
    }

    /// Reports currently held in the cache.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, id: InspectionId, version: Version) -> Option<Arc<[u8]>> {
        let (cached_version, expired) = {
            let entry = self.cache.get(&id)?;
            if entry.version == version && entry.rendered_at.elapsed() < self.ttl {
                return Some(Arc::clone(&entry.bytes));
            }
            (entry.version, entry.rendered_at.elapsed() >= self.ttl)
        };
        if expired {
            self.cache.remove_if(&id, |_, report| {
                report.version == cached_version && report.rendered_at.elapsed() >= self.ttl
            });
        }
        None
    }

    fn remember(&self, id: InspectionId, version: Version, bytes: Arc<[u8]>) {
        let report = CachedReport {
            version,
            bytes,
            rendered_at: Instant::now(),
        };
        match self.cache.entry(id) {
            // A concurrent render of a newer version wins.
            Entry::Occupied(mut existing) => {
                if existing.get().version <= version {
                    existing.insert(report);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(report);
            }
        }
    }

    async fn store_artifact(&self, snapshot: &Inspection, bytes: &[u8]) {
        let path = report_object_path(snapshot);
        let url = match self.objects.put(&path, bytes.to_vec()).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(inspection_id = %snapshot.id, path = %path, error = %e, "Failed to store report");
                return;
            }
        };

        // A report of an older version must not label the current document.
        if !self.hot.attach_report(snapshot.id, snapshot.version, &url) {
            tracing::debug!(
                inspection_id = %snapshot.id,
                version = snapshot.version,
                "Document moved on before the report was stored, URL not recorded"
            );
            return;
        }
        if let Err(e) = self.durable.set_report_url(snapshot.id, &url).await {
            tracing::warn!(inspection_id = %snapshot.id, error = %e, "Failed to record report URL");
        }
    }
}
