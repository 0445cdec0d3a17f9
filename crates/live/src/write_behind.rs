//! Debounced write-behind from the hot store to the durable store.
//!
//! Every accepted mutation schedules its inspection here. A background task
//! keeps one timer per inspection in a [`DelayQueue`]:
//!
//! - a new mutation pushes the timer back to `now + debounce`, but never
//!   past `first_mutation + max_delay`;
//! - when the timer fires, the *current* hot snapshot is written with a
//!   version-guarded overwrite, so a burst of mutations costs one write;
//! - a failed write is retried with exponential backoff and the inspection
//!   stays pending until a write succeeds or its hot entry is gone.
//!
//! On shutdown the loop stops and every pending inspection gets one final,
//! best-effort flush.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::time::{delay_queue, DelayQueue};
use vinspect_core::types::InspectionId;
use vinspect_db::InspectionStore;

use crate::config::FlushPolicy;
use crate::hot_store::HotStore;

/// Snapshot of reconciler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Successful durable writes (including no-op overwrites).
    pub flushes: u64,
    /// Failed durable writes; each one was rescheduled.
    pub failures: u64,
    /// Inspections whose hot entry vanished before they could be flushed.
    pub abandoned: u64,
    /// Inspections currently waiting for a flush.
    pub pending: usize,
}

#[derive(Default)]
struct Counters {
    flushes: AtomicU64,
    failures: AtomicU64,
    abandoned: AtomicU64,
    pending: AtomicUsize,
}

/// Handle to the background reconciler task.
///
/// Dropping the handle stops the task without a final flush; call
/// [`WriteBehind::shutdown`] for an orderly stop.
pub struct WriteBehind {
    tx: mpsc::UnboundedSender<InspectionId>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
    _stop_on_drop: DropGuard,
}

impl WriteBehind {
    /// Spawn the reconciler on the current tokio runtime.
    pub fn start(hot: Arc<HotStore>, durable: Arc<dyn InspectionStore>, policy: FlushPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let reconciler = Reconciler {
            hot,
            durable,
            policy,
            queue: DelayQueue::new(),
            pending: HashMap::new(),
            counters: Arc::clone(&counters),
        };
        let task = tokio::spawn(reconciler.run(rx, cancel.clone()));

        tracing::info!(
            debounce_ms = policy.debounce.as_millis() as u64,
            max_delay_ms = policy.max_delay.as_millis() as u64,
            "Write-behind reconciler started"
        );

        Self {
            tx,
            _stop_on_drop: cancel.clone().drop_guard(),
            cancel,
            task: Mutex::new(Some(task)),
            counters,
        }
    }

    /// Note that `id` has an unflushed mutation. Never blocks.
    pub fn schedule(&self, id: InspectionId) {
        if self.tx.send(id).is_err() {
            tracing::warn!(inspection_id = %id, "Write-behind stopped, flush not scheduled");
        }
    }

    pub fn stats(&self) -> FlushStats {
        FlushStats {
            flushes: self.counters.flushes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
            pending: self.counters.pending.load(Ordering::Relaxed),
        }
    }

    /// Stop the timer loop and flush everything still pending, waiting at
    /// most `timeout` for the final flush.
    ///
    /// Idempotent: later calls return immediately.
    pub async fn shutdown(&self, timeout: Duration) {
        let Some(task) = self.task.lock().take() else {
            return;
        };
        self.cancel.cancel();

        let abort = task.abort_handle();
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(())) => tracing::info!("Write-behind reconciler stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Write-behind task failed"),
            Err(_) => {
                abort.abort();
                tracing::error!(
                    timeout_secs = timeout.as_secs(),
                    pending = self.counters.pending.load(Ordering::Relaxed),
                    "Final flush timed out, pending mutations lost"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

struct Pending {
    key: delay_queue::Key,
    first_scheduled: Instant,
    /// Failed attempts so far; non-zero means the timer is a retry backoff.
    attempts: u32,
}

struct Reconciler {
    hot: Arc<HotStore>,
    durable: Arc<dyn InspectionStore>,
    policy: FlushPolicy,
    queue: DelayQueue<InspectionId>,
    pending: HashMap<InspectionId, Pending>,
    counters: Arc<Counters>,
}

enum FlushOutcome {
    Written,
    Failed,
    Abandoned,
}

impl Reconciler {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<InspectionId>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(id) = rx.recv() => self.touch(id),
                Some(expired) = self.queue.next(), if !self.queue.is_empty() => {
                    let id = expired.into_inner();
                    self.flush_due(id).await;
                }
            }
        }

        // Mutations acknowledged just before the stop still count.
        rx.close();
        while let Ok(id) = rx.try_recv() {
            self.touch(id);
        }
        self.final_flush().await;
    }

    fn touch(&mut self, id: InspectionId) {
        let now = Instant::now();
        match self.pending.get(&id) {
            // A retry is already scheduled; it will write the latest snapshot.
            Some(pending) if pending.attempts > 0 => {}
            Some(pending) => {
                let deadline =
                    (now + self.policy.debounce).min(pending.first_scheduled + self.policy.max_delay);
                self.queue.reset_at(&pending.key, deadline);
            }
            None => {
                let key = self.queue.insert(id, self.policy.debounce);
                self.pending.insert(
                    id,
                    Pending {
                        key,
                        first_scheduled: now,
                        attempts: 0,
                    },
                );
            }
        }
        self.publish_pending();
    }

    async fn flush_due(&mut self, id: InspectionId) {
        let Some(mut pending) = self.pending.remove(&id) else {
            return;
        };

        if let FlushOutcome::Failed = self.flush(id, pending.attempts + 1).await {
            pending.attempts += 1;
            let delay = self.policy.backoff(pending.attempts);
            pending.key = self.queue.insert(id, delay);
            tracing::warn!(
                inspection_id = %id,
                attempt = pending.attempts,
                retry_in_ms = delay.as_millis() as u64,
                "Flush failed, rescheduled"
            );
            self.pending.insert(id, pending);
        }
        self.publish_pending();
    }

    async fn flush(&self, id: InspectionId, attempt: u32) -> FlushOutcome {
        let Some(snapshot) = self.hot.get(id) else {
            self.counters.abandoned.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                inspection_id = %id,
                "Hot entry gone before flush, durable copy may be stale"
            );
            return FlushOutcome::Abandoned;
        };

        match self.durable.overwrite(&snapshot).await {
            Ok(written) => {
                self.counters.flushes.fetch_add(1, Ordering::Relaxed);
                if written {
                    tracing::debug!(inspection_id = %id, version = snapshot.version, "Flushed to durable store");
                } else {
                    tracing::debug!(
                        inspection_id = %id,
                        version = snapshot.version,
                        "Durable store already current or record missing"
                    );
                }
                FlushOutcome::Written
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(inspection_id = %id, attempt, error = %e, "Durable overwrite failed");
                FlushOutcome::Failed
            }
        }
    }

    async fn final_flush(&mut self) {
        let ids: Vec<InspectionId> = self.pending.drain().map(|(id, _)| id).collect();
        self.queue.clear();
        self.publish_pending();
        if ids.is_empty() {
            return;
        }

        tracing::info!(count = ids.len(), "Final write-behind flush");
        for id in ids {
            if let FlushOutcome::Failed = self.flush(id, 1).await {
                tracing::error!(inspection_id = %id, "Final flush failed, mutations lost");
            }
        }
    }

    fn publish_pending(&self) {
        self.counters
            .pending
            .store(self.pending.len(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use vinspect_core::inspection::{InspectionType, NewInspection};
    use vinspect_core::{FieldPath, Inspection};
    use vinspect_db::MemoryInspectionStore;

    fn policy() -> FlushPolicy {
        FlushPolicy {
            debounce: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
            retry_base: Duration::from_millis(50),
            retry_max: Duration::from_millis(400),
        }
    }

    async fn seeded() -> (Arc<HotStore>, Arc<MemoryInspectionStore>, Inspection) {
        let hot = Arc::new(HotStore::new(Duration::from_secs(3_600)));
        let durable = Arc::new(MemoryInspectionStore::new());
        let input = NewInspection {
            vehicle_id: uuid::Uuid::new_v4(),
            inspector_id: uuid::Uuid::new_v4(),
            kind: InspectionType::Exit,
            sections: Default::default(),
            summary: String::new(),
            started_at: None,
        };
        let doc = Inspection::from_new(uuid::Uuid::new_v4(), input, Utc::now());
        durable.create(&doc).await.unwrap();
        hot.put(doc.clone(), hot.default_ttl());
        (hot, durable, doc)
    }

    fn bump(hot: &HotStore, id: InspectionId, expected: i64) {
        hot.apply_field(
            id,
            &FieldPath::Summary,
            &json!(format!("edit {expected}")),
            expected,
            uuid::Uuid::nil(),
            Utc::now(),
            |_| {},
        )
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_edits_are_flushed_by_max_delay() {
        let (hot, durable, doc) = seeded().await;
        let wb = WriteBehind::start(Arc::clone(&hot), durable.clone(), policy());

        // One edit every 50ms for 1.5s never leaves a 100ms quiet window.
        for expected in 1..=30 {
            bump(&hot, doc.id, expected);
            wb.schedule(doc.id);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert!(durable.overwrite_count() >= 1);
        let stored = durable.get_by_id(doc.id).await.unwrap().unwrap();
        assert!(stored.version > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_of_an_evicted_entry_is_abandoned() {
        let (hot, durable, doc) = seeded().await;
        let wb = WriteBehind::start(Arc::clone(&hot), durable.clone(), policy());

        bump(&hot, doc.id, 1);
        wb.schedule(doc.id);
        hot.remove(doc.id);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = wb.stats();
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(durable.overwrite_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (hot, durable, _doc) = seeded().await;
        let wb = WriteBehind::start(hot, durable, policy());
        wb.shutdown(Duration::from_secs(1)).await;
        wb.shutdown(Duration::from_secs(1)).await;
        assert_eq!(wb.stats(), FlushStats::default());
    }
}
