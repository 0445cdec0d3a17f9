//! Durable storage for inspections and their binary artifacts.
//!
//! - [`InspectionStore`]: the durable record store contract, implemented
//!   for PostgreSQL ([`PgInspectionStore`]) and in process
//!   ([`MemoryInspectionStore`]).
//! - [`ObjectStore`]: `(path, bytes) -> URL` storage for photos and
//!   rendered reports, implemented on the local filesystem and in process.

pub mod error;
pub mod memory;
pub mod models;
pub mod object_store;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use error::StoreError;
pub use memory::MemoryInspectionStore;
pub use object_store::{LocalObjectStore, MemoryObjectStore, ObjectStore};
pub use repositories::PgInspectionStore;
pub use store::InspectionStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify connectivity.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
