pub mod inspection_repo;

pub use inspection_repo::{InspectionRepo, PgInspectionStore};
