//! Per-inspection update bus backed by `tokio::sync::broadcast` channels.
//!
//! [`InspectionBus`] is cheap to clone and is meant to be shared between the
//! conflict-checked writer (which publishes) and any number of observers
//! (which subscribe).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::broadcast;
use vinspect_core::types::InspectionId;
use vinspect_core::InspectionUpdate;

/// Default per-inspection buffer capacity.
pub const DEFAULT_CAPACITY: usize = 100;

type UpdateSender = broadcast::Sender<Arc<InspectionUpdate>>;
type UpdateReceiver = broadcast::Receiver<Arc<InspectionUpdate>>;

// ---------------------------------------------------------------------------
// InspectionBus
// ---------------------------------------------------------------------------

struct BusInner {
    channels: DashMap<InspectionId, UpdateSender>,
    capacity: usize,
    published: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of bus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Channels currently open (inspections with at least one subscriber).
    pub channels: usize,
    /// Updates handed to at least one subscriber.
    pub published: u64,
    /// Updates lost by lagging subscribers, summed over all subscribers.
    pub dropped: u64,
}

/// Fan-out hub with one logical channel per inspection.
///
/// # Usage
///
/// ```rust
/// use vinspect_events::InspectionBus;
///
/// let bus = InspectionBus::default();
/// let id = uuid::Uuid::new_v4();
/// let subscription = bus.subscribe(id);
/// assert_eq!(bus.subscriber_count(id), 1);
/// drop(subscription);
/// assert_eq!(bus.subscriber_count(id), 0);
/// ```
#[derive(Clone)]
pub struct InspectionBus {
    inner: Arc<BusInner>,
}

impl InspectionBus {
    /// Create a bus whose per-inspection channels buffer `capacity` updates.
    ///
    /// When a subscriber's buffer is full, the oldest un-consumed updates are
    /// overwritten for that subscriber only.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: DashMap::new(),
                capacity: capacity.max(1),
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Publish an accepted update to every current subscriber of its
    /// inspection.
    ///
    /// Never blocks. Returns the number of subscribers the update was
    /// queued for; with no subscribers the update is discarded.
    pub fn publish(&self, update: InspectionUpdate) -> usize {
        let Some(sender) = self.inner.channels.get(&update.inspection_id) else {
            return 0;
        };
        // A SendError only means every receiver has just gone away.
        let delivered = sender.send(Arc::new(update)).unwrap_or(0);
        if delivered > 0 {
            self.inner.published.fetch_add(1, Ordering::Relaxed);
        }
        delivered
    }

    /// Subscribe to updates accepted from now on for `inspection_id`.
    ///
    /// History is not replayed: read the current document first, then
    /// subscribe, and discard updates whose version is not newer than the
    /// snapshot.
    pub fn subscribe(&self, inspection_id: InspectionId) -> Subscription {
        let capacity = self.inner.capacity;
        let receiver = self
            .inner
            .channels
            .entry(inspection_id)
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();

        tracing::debug!(inspection_id = %inspection_id, "Subscriber attached");

        Subscription {
            inspection_id,
            receiver: Some(receiver),
            inner: Arc::clone(&self.inner),
            dropped: 0,
        }
    }

    /// Number of live subscribers for one inspection.
    pub fn subscriber_count(&self, inspection_id: InspectionId) -> usize {
        self.inner
            .channels
            .get(&inspection_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Number of inspections with an open channel.
    pub fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }

    /// Close the channel of one inspection; its subscribers see end of stream.
    pub fn close(&self, inspection_id: InspectionId) {
        self.inner.channels.remove(&inspection_id);
    }

    /// Close every channel. Used during shutdown.
    pub fn close_all(&self) {
        let count = self.inner.channels.len();
        self.inner.channels.clear();
        tracing::info!(count, "Closed all inspection update channels");
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            channels: self.channel_count(),
            published: self.inner.published.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for InspectionBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live, non-restartable sequence of updates for one inspection.
///
/// Dropping the subscription unsubscribes it; the channel itself is removed
/// once its last subscriber is gone.
pub struct Subscription {
    inspection_id: InspectionId,
    receiver: Option<UpdateReceiver>,
    inner: Arc<BusInner>,
    dropped: u64,
}

impl Subscription {
    /// Updates this subscriber lost to overflow so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Wait for the next update.
    ///
    /// Returns `None` once the channel has been closed. Overflow is not an
    /// error here: the lost updates are counted and the next retained update
    /// is returned.
    pub async fn recv(&mut self) -> Option<InspectionUpdate> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(update) => return Some(Arc::unwrap_or_clone(update)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.dropped += skipped;
                    self.inner.dropped.fetch_add(skipped, Ordering::Relaxed);
                    tracing::warn!(
                        inspection_id = %self.inspection_id,
                        skipped,
                        "Subscriber lagged, oldest updates dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Turn the subscription into a [`Stream`] of updates.
    pub fn into_stream(self) -> impl Stream<Item = InspectionUpdate> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|update| (update, subscription))
        })
    }

    /// Explicitly unsubscribe. Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Release our receiver first so it no longer counts.
        drop(self.receiver.take());
        let removed = self
            .inner
            .channels
            .remove_if(&self.inspection_id, |_, sender| sender.receiver_count() == 0);
        if removed.is_some() {
            tracing::debug!(inspection_id = %self.inspection_id, "Last subscriber left, channel removed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
