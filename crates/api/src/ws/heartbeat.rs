use std::time::Duration;

use tokio::time::Instant;

/// Interval between Ping frames on an idle connection.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Heartbeats a peer may miss before it is considered gone.
const MAX_SILENT_INTERVALS: u32 = 2;

/// Tracks when a peer last showed signs of life.
///
/// Any inbound frame counts, not just Pong.
#[derive(Debug)]
pub struct Liveness {
    interval: Duration,
    last_seen: Instant,
}

impl Liveness {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Whether the peer has been silent for longer than the allowance.
    pub fn is_dead(&self) -> bool {
        self.last_seen.elapsed() > self.interval * MAX_SILENT_INTERVALS
    }
}
