#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use vinspect_core::inspection::{InspectionType, NewInspection};
use vinspect_db::{MemoryInspectionStore, MemoryObjectStore};
use vinspect_events::InspectionBus;
use vinspect_live::{FlushPolicy, HotStore, InspectionService, LiveConfig};

pub struct Harness {
    pub service: Arc<InspectionService>,
    pub hot: Arc<HotStore>,
    pub bus: InspectionBus,
    pub durable: Arc<MemoryInspectionStore>,
    pub objects: Arc<MemoryObjectStore>,
}

/// Short timings so paused-clock tests stay readable.
pub fn test_config() -> LiveConfig {
    LiveConfig {
        hot_ttl: Duration::from_secs(60),
        sweep_interval: Duration::from_secs(5),
        flush: FlushPolicy {
            debounce: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            retry_base: Duration::from_millis(50),
            retry_max: Duration::from_millis(400),
        },
        subscriber_queue_capacity: 16,
        report_cache_ttl: Duration::from_secs(600),
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: LiveConfig) -> Harness {
    let hot = Arc::new(HotStore::new(config.hot_ttl));
    let bus = InspectionBus::new(config.subscriber_queue_capacity);
    let durable = Arc::new(MemoryInspectionStore::new());
    let objects = Arc::new(MemoryObjectStore::new("/files"));
    let service = Arc::new(InspectionService::new(
        Arc::clone(&hot),
        bus.clone(),
        durable.clone(),
        objects.clone(),
        config,
    ));
    Harness {
        service,
        hot,
        bus,
        durable,
        objects,
    }
}

pub fn new_inspection() -> NewInspection {
    NewInspection {
        vehicle_id: uuid::Uuid::new_v4(),
        inspector_id: uuid::Uuid::new_v4(),
        kind: InspectionType::Entry,
        sections: Default::default(),
        summary: String::new(),
        started_at: None,
    }
}
