//! Live update fan-out for inspection documents.
//!
//! [`InspectionBus`] keeps one bounded broadcast channel per inspection id,
//! created on first subscription and torn down when the last
//! [`Subscription`] goes away. Publishing never waits on subscribers: a
//! subscriber that falls behind loses the oldest updates and the loss is
//! counted and logged.

pub mod bus;

pub use bus::{BusStats, InspectionBus, Subscription};
