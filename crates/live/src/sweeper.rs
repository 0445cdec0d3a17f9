//! Periodic eviction of expired hot entries and cached reports.
//!
//! Expiry is also enforced lazily on every access; the sweep only bounds the
//! memory held by inspections nobody touches anymore.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::service::InspectionService;

/// Run the expiry sweep every `sweep_interval` until `cancel` is triggered.
pub async fn run(service: Arc<InspectionService>, cancel: CancellationToken) {
    let config = service.config();
    let interval = config.sweep_interval;
    tracing::info!(
        interval_secs = interval.as_secs(),
        ttl_secs = config.hot_ttl.as_secs(),
        report_ttl_secs = config.report_cache_ttl.as_secs(),
        "Expiry sweeper started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Expiry sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                let purged = service.purge_expired();
                if purged.hot_entries > 0 || purged.reports > 0 {
                    tracing::info!(
                        hot_entries = purged.hot_entries,
                        reports = purged.reports,
                        remaining = service.hot_store().len(),
                        "Expiry sweep: evicted expired entries"
                    );
                } else {
                    tracing::debug!("Expiry sweep: nothing expired");
                }
            }
        }
    }
}
