//! The live editing core for inspection documents.
//!
//! - [`HotStore`]: TTL-bounded, versioned in-memory documents, one entry
//!   per active inspection.
//! - [`ConflictCheckedWriter`]: applies a single field mutation iff the
//!   caller's expected version is current, and publishes the accepted
//!   update while still holding the entry.
//! - [`WriteBehind`]: per-inspection debounced flush of hot documents
//!   into the durable store, with retry and a final flush on shutdown.
//! - [`ReportRenderer`]: PDF rendering cached per `(inspection, version)`.
//! - [`InspectionService`]: the downstream surface tying these together.
//!
//! ## Consistency gap
//!
//! A mutation is acknowledged (and broadcast) once it is in the hot store.
//! Its durable copy is written later by [`WriteBehind`]. If the process dies
//! between acknowledgement and flush, that mutation is lost from durable
//! storage even though observers have seen it; if the hot entry then also
//! expires, a later read-through returns the older durable record. The
//! window is bounded by the flush debounce and maximum delay in
//! [`LiveConfig`].

pub mod config;
pub mod hot_store;
pub mod renderer;
pub mod service;
pub mod sweeper;
pub mod write_behind;
pub mod writer;

pub use config::{FlushPolicy, LiveConfig};
pub use hot_store::HotStore;
pub use renderer::ReportRenderer;
pub use service::{InspectionService, LiveStats, Purged};
pub use write_behind::{FlushStats, WriteBehind};
pub use writer::ConflictCheckedWriter;
