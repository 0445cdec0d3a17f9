//! Integration tests for the PostgreSQL durable store.
//!
//! These need a running PostgreSQL reachable through `DATABASE_URL`; run
//! them with `cargo test -p vinspect-db -- --ignored`.

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use vinspect_core::inspection::{InspectionType, NewInspection};
use vinspect_core::{FieldPath, Inspection};
use vinspect_db::{InspectionStore, PgInspectionStore, StoreError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_inspection() -> Inspection {
    let input = NewInspection {
        vehicle_id: uuid::Uuid::new_v4(),
        inspector_id: uuid::Uuid::new_v4(),
        kind: InspectionType::Routine,
        sections: Default::default(),
        summary: "initial".into(),
        started_at: None,
    };
    // Postgres keeps microseconds; truncate so round-trips compare equal.
    let now = Utc::now();
    let now = now - chrono::Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos() % 1000));
    Inspection::from_new(uuid::Uuid::new_v4(), input, now)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn create_then_get_round_trips_sections(pool: PgPool) {
    let store = PgInspectionStore::new(pool);
    let mut record = new_inspection();
    let path: FieldPath = "sections.engine.oil_level".parse().unwrap();
    let (actor, at) = (record.inspector_id, record.updated_at);
    path.apply(&mut record, &json!("Bajo"), actor, at).unwrap();

    store.create(&record).await.unwrap();
    let loaded = store.get_by_id(record.id).await.unwrap().unwrap();

    assert_eq!(loaded, record);
    assert_eq!(loaded.sections["engine"].fields["oil_level"], "Bajo");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_create_is_rejected(pool: PgPool) {
    let store = PgInspectionStore::new(pool);
    let record = new_inspection();

    store.create(&record).await.unwrap();
    let err = store.create(&record).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn overwrite_is_version_guarded(pool: PgPool) {
    let store = PgInspectionStore::new(pool);
    let mut record = new_inspection();
    store.create(&record).await.unwrap();

    record.version = 4;
    record.summary = "v4".into();
    assert!(store.overwrite(&record).await.unwrap());
    assert!(store.overwrite(&record).await.unwrap());

    let mut stale = record.clone();
    stale.version = 3;
    stale.summary = "v3".into();
    assert!(!store.overwrite(&stale).await.unwrap());

    let loaded = store.get_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(loaded.version, 4);
    assert_eq!(loaded.summary, "v4");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn report_url_does_not_bump_version(pool: PgPool) {
    let store = PgInspectionStore::new(pool);
    let record = new_inspection();
    store.create(&record).await.unwrap();

    assert!(store
        .set_report_url(record.id, "/files/reports/x.pdf")
        .await
        .unwrap());
    assert!(store.overwrite(&record).await.unwrap());

    let loaded = store.get_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(loaded.version, record.version);
    assert_eq!(loaded.pdf_url.as_deref(), Some("/files/reports/x.pdf"));
}
