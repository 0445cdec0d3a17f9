//! Optimistic-concurrency gate in front of the hot store.

use std::sync::Arc;

use chrono::Utc;
use vinspect_core::types::Version;
use vinspect_core::{CoreError, InspectionUpdate};
use vinspect_events::InspectionBus;

use crate::hot_store::HotStore;

/// Applies [`InspectionUpdate`]s to the hot store and broadcasts the
/// accepted ones.
///
/// Accepted updates are published in the same critical section that bumps
/// the version, so every observer sees updates of one inspection in strictly
/// increasing version order with no gaps caused by reordering.
#[derive(Clone)]
pub struct ConflictCheckedWriter {
    hot: Arc<HotStore>,
    bus: InspectionBus,
}

impl ConflictCheckedWriter {
    pub fn new(hot: Arc<HotStore>, bus: InspectionBus) -> Self {
        Self { hot, bus }
    }

    /// Apply `update` iff its `expected_version` is current and return the
    /// new version.
    ///
    /// The update is stamped with the assigned version and the commit time
    /// before it is published. It never touches durable storage.
    pub fn apply(&self, mut update: InspectionUpdate) -> Result<Version, CoreError> {
        let id = update.inspection_id;
        let Some(path) = update.path.take() else {
            return Err(CoreError::Validation(
                "Update must name the field path it mutates".into(),
            ));
        };
        let value = std::mem::take(&mut update.value);
        let expected = update.expected_version;
        let at = Utc::now();

        let result = self.hot.apply_field(
            id,
            &path,
            &value,
            expected,
            update.updated_by,
            at,
            |committed| {
                update.version = Some(committed.version);
                update.timestamp = at;
                update.path = Some(path.clone());
                update.value = value.clone();
                self.bus.publish(update);
            },
        );

        match &result {
            Ok(version) => {
                tracing::debug!(inspection_id = %id, version, path = %path, "Update accepted");
            }
            Err(CoreError::VersionConflict { current, .. }) => {
                tracing::debug!(
                    inspection_id = %id,
                    expected,
                    current,
                    path = %path,
                    "Update rejected: version conflict"
                );
            }
            Err(e) => {
                tracing::debug!(inspection_id = %id, path = %path, error = %e, "Update rejected");
            }
        }
        result
    }
}
