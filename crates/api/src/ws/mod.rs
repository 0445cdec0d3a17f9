//! WebSocket streaming of live inspection updates.
//!
//! Each connection is bound to one inspection: it receives a snapshot of
//! the current document, then every accepted update as a JSON text frame.
//! The server pings idle connections and drops peers that stop answering.

mod handler;
mod heartbeat;

pub use handler::inspection_ws;
