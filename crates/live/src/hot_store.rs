//! TTL-bounded, versioned in-memory documents.
//!
//! Each resident inspection lives in its own [`HotEntry`] behind a
//! `parking_lot::Mutex`, so the version check, mutation, version bump, TTL
//! rearm and broadcast of one write form a single critical section, while
//! writes to different inspections never contend.
//!
//! Lock order: an entry mutex is never held while touching the map's shard
//! locks. Eviction marks the entry first, releases it, then removes it from
//! the map only if the map still points at that same entry.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use vinspect_core::types::{InspectionId, Timestamp, UserId, Version};
use vinspect_core::{CoreError, FieldPath, Inspection};

/// One resident document.
#[derive(Debug)]
struct HotEntry {
    document: Inspection,
    ttl: Duration,
    expires_at: Instant,
    /// Set once the entry has left the map; holders must look up again.
    evicted: bool,
}

impl HotEntry {
    fn new(document: Inspection, ttl: Duration) -> Self {
        Self {
            document,
            ttl,
            expires_at: Instant::now() + ttl,
            evicted: false,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn rearm(&mut self, now: Instant) {
        self.expires_at = now + self.ttl;
    }
}

type SharedEntry = Arc<Mutex<HotEntry>>;

/// The hot document store.
///
/// Construct one per process and hand the same `Arc<HotStore>` to every
/// component that reads or writes inspections.
pub struct HotStore {
    entries: DashMap<InspectionId, SharedEntry>,
    default_ttl: Duration,
}

/// Guards against a pathological run of concurrent replacements.
const MAX_LOOKUPS: usize = 8;

impl HotStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Snapshot of the resident document, version included.
    ///
    /// Expired entries are evicted on access and reported as absent. Reads
    /// do not extend the TTL.
    pub fn get(&self, id: InspectionId) -> Option<Inspection> {
        self.with_live_entry(id, |entry| entry.document.clone())
    }

    /// Version of the resident document, if any.
    pub fn version(&self, id: InspectionId) -> Option<Version> {
        self.with_live_entry(id, |entry| entry.document.version)
    }

    /// Replace (or create) the entry for `document.id` with a fresh TTL.
    ///
    /// A write in flight on the old entry finishes before the swap; later
    /// writers find the old entry evicted and look up the new one.
    pub fn put(&self, document: Inspection, ttl: Duration) {
        let id = document.id;
        let version = document.version;
        let fresh: SharedEntry = Arc::new(Mutex::new(HotEntry::new(document, ttl)));
        loop {
            let current = self.lookup(id);
            if let Some(old) = &current {
                old.lock().evicted = true;
            }
            match self.entries.entry(id) {
                Entry::Occupied(mut occupied) => {
                    let same = current
                        .as_ref()
                        .is_some_and(|old| Arc::ptr_eq(old, occupied.get()));
                    if same {
                        occupied.insert(Arc::clone(&fresh));
                        break;
                    }
                    // Replaced concurrently; mark that one too.
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(Arc::clone(&fresh));
                    break;
                }
            }
        }
        tracing::debug!(inspection_id = %id, version, "Hot entry stored");
    }

    /// Insert `document` unless a live entry already exists, and return
    /// whichever document is now resident.
    ///
    /// Used by read-through repopulation so that a durable copy never
    /// clobbers a newer hot entry loaded or written concurrently.
    pub fn put_if_absent(&self, document: Inspection, ttl: Duration) -> Inspection {
        let id = document.id;
        for _ in 0..MAX_LOOKUPS {
            if let Some(resident) = self.get(id) {
                return resident;
            }
            match self.entries.entry(id) {
                Entry::Vacant(vacant) => {
                    vacant.insert(Arc::new(Mutex::new(HotEntry::new(document.clone(), ttl))));
                    tracing::debug!(inspection_id = %id, version = document.version, "Hot entry loaded");
                    return document;
                }
                // Someone inserted between our lookup and the entry call;
                // the next lookup sees (or evicts) it.
                Entry::Occupied(_) => continue,
            }
        }
        self.put(document.clone(), ttl);
        document
    }

    /// Apply one field mutation iff `expected_version` is current.
    ///
    /// On success the version is bumped by exactly one, the TTL is rearmed
    /// and `on_commit` runs with the committed document while the entry is
    /// still locked, so no other write to this inspection can interleave
    /// between commit and whatever `on_commit` does (typically publishing).
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotHot`] if the inspection is not resident or expired.
    /// - [`CoreError::VersionConflict`] if another write got there first.
    /// - [`CoreError::Validation`] if `value` does not fit `path`.
    ///
    /// The document is unchanged on every error.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_field<F>(
        &self,
        id: InspectionId,
        path: &FieldPath,
        value: &serde_json::Value,
        expected_version: Version,
        actor: UserId,
        at: Timestamp,
        on_commit: F,
    ) -> Result<Version, CoreError>
    where
        F: FnOnce(&Inspection),
    {
        for _ in 0..MAX_LOOKUPS {
            let Some(shared) = self.lookup(id) else {
                return Err(CoreError::NotHot(id));
            };

            let now = Instant::now();
            let mut entry = shared.lock();
            if entry.evicted {
                continue;
            }
            if entry.is_expired(now) {
                entry.evicted = true;
                drop(entry);
                self.remove_entry(id, &shared);
                return Err(CoreError::NotHot(id));
            }

            let current = entry.document.version;
            if current != expected_version {
                return Err(CoreError::VersionConflict {
                    id,
                    expected: expected_version,
                    current,
                });
            }

            path.apply(&mut entry.document, value, actor, at)?;
            entry.document.version = current + 1;
            entry.rearm(now);
            on_commit(&entry.document);
            return Ok(current + 1);
        }
        Err(CoreError::NotHot(id))
    }

    /// Record the report rendered from `version` on the resident document,
    /// without bumping its version or extending its TTL.
    ///
    /// Returns `false` if the inspection is not resident or has moved past
    /// `version`.
    pub fn attach_report(&self, id: InspectionId, version: Version, url: &str) -> bool {
        self.with_live_entry_mut(id, |entry| {
            let current = entry.document.version == version;
            if current {
                entry.document.pdf_url = Some(url.to_string());
            }
            current
        })
        .unwrap_or(false)
    }

    /// Drop the entry for `id`, if any.
    pub fn remove(&self, id: InspectionId) -> bool {
        for _ in 0..MAX_LOOKUPS {
            let Some(shared) = self.lookup(id) else {
                return false;
            };
            shared.lock().evicted = true;
            if self.remove_entry(id, &shared) {
                return true;
            }
        }
        false
    }

    /// Evict every expired entry. Returns how many were evicted.
    pub fn purge_expired(&self) -> usize {
        // Collect first so no shard lock is held while locking entries.
        let candidates: Vec<(InspectionId, SharedEntry)> = self
            .entries
            .iter()
            .map(|kv| (*kv.key(), Arc::clone(kv.value())))
            .collect();

        let now = Instant::now();
        let mut purged = 0;
        for (id, shared) in candidates {
            let mut entry = shared.lock();
            if entry.evicted || !entry.is_expired(now) {
                continue;
            }
            entry.evicted = true;
            let version = entry.document.version;
            drop(entry);
            if self.remove_entry(id, &shared) {
                tracing::debug!(inspection_id = %id, version, "Hot entry expired");
                purged += 1;
            }
        }
        purged
    }

    /// Number of entries in the map, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -- internals ---------------------------------------------------------

    fn lookup(&self, id: InspectionId) -> Option<SharedEntry> {
        self.entries.get(&id).map(|shared| Arc::clone(shared.value()))
    }

    fn remove_entry(&self, id: InspectionId, shared: &SharedEntry) -> bool {
        self.entries
            .remove_if(&id, |_, current| Arc::ptr_eq(current, shared))
            .is_some()
    }

    fn with_live_entry<R>(&self, id: InspectionId, f: impl FnOnce(&HotEntry) -> R) -> Option<R> {
        self.with_live_entry_mut(id, |entry| f(entry))
    }

    fn with_live_entry_mut<R>(
        &self,
        id: InspectionId,
        f: impl FnOnce(&mut HotEntry) -> R,
    ) -> Option<R> {
        for _ in 0..MAX_LOOKUPS {
            let Some(shared) = self.lookup(id) else {
                return None;
            };
            let mut entry = shared.lock();
            if entry.evicted {
                continue;
            }
            if entry.is_expired(Instant::now()) {
                entry.evicted = true;
                drop(entry);
                self.remove_entry(id, &shared);
                return None;
            }
            return Some(f(&mut entry));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;
    use vinspect_core::inspection::{InspectionType, NewInspection};

    const TTL: Duration = Duration::from_secs(60);

    fn doc() -> Inspection {
        let input = NewInspection {
            vehicle_id: uuid::Uuid::new_v4(),
            inspector_id: uuid::Uuid::new_v4(),
            kind: InspectionType::Routine,
            sections: Default::default(),
            summary: String::new(),
            started_at: None,
        };
        Inspection::from_new(uuid::Uuid::new_v4(), input, Utc::now())
    }

    fn set_summary(
        store: &HotStore,
        id: InspectionId,
        text: &str,
        expected: Version,
    ) -> Result<Version, CoreError> {
        store.apply_field(
            id,
            &FieldPath::Summary,
            &json!(text),
            expected,
            uuid::Uuid::nil(),
            Utc::now(),
            |_| {},
        )
    }

    #[tokio::test]
    async fn apply_bumps_version_by_one() {
        let store = HotStore::new(TTL);
        let doc = doc();
        let id = doc.id;
        store.put(doc, TTL);

        assert_eq!(set_summary(&store, id, "a", 1).unwrap(), 2);
        assert_eq!(set_summary(&store, id, "b", 2).unwrap(), 3);

        let resident = store.get(id).unwrap();
        assert_eq!(resident.version, 3);
        assert_eq!(resident.summary, "b");
    }

    #[tokio::test]
    async fn stale_version_is_rejected_without_change() {
        let store = HotStore::new(TTL);
        let doc = doc();
        let id = doc.id;
        store.put(doc, TTL);
        set_summary(&store, id, "first", 1).unwrap();

        let err = set_summary(&store, id, "stale", 1).unwrap_err();
        assert_matches!(
            err,
            CoreError::VersionConflict { expected: 1, current: 2, .. }
        );
        assert_eq!(store.get(id).unwrap().summary, "first");
    }

    #[tokio::test]
    async fn malformed_value_leaves_version_untouched() {
        let store = HotStore::new(TTL);
        let doc = doc();
        let id = doc.id;
        store.put(doc, TTL);

        let err = store
            .apply_field(
                id,
                &FieldPath::Status,
                &json!("exploded"),
                1,
                uuid::Uuid::nil(),
                Utc::now(),
                |_| panic!("must not commit"),
            )
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert_eq!(store.version(id), Some(1));
    }

    #[tokio::test]
    async fn unknown_inspection_is_not_hot() {
        let store = HotStore::new(TTL);
        let id = uuid::Uuid::new_v4();
        assert_matches!(set_summary(&store, id, "x", 1), Err(CoreError::NotHot(got)) if got == id);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl_and_mutations_rearm() {
        let store = HotStore::new(TTL);
        let doc = doc();
        let id = doc.id;
        store.put(doc, TTL);

        tokio::time::advance(Duration::from_secs(50)).await;
        set_summary(&store, id, "keep alive", 1).unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(store.get(id).is_some(), "mutation should have rearmed the TTL");

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.get(id).is_none());
        assert_matches!(set_summary(&store, id, "late", 2), Err(CoreError::NotHot(_)));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_evicts_only_expired_entries() {
        let store = HotStore::new(TTL);
        let (short, long) = (doc(), doc());
        let long_id = long.id;
        store.put(short, Duration::from_secs(1));
        store.put(long, TTL);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(long_id).is_some());
    }

    #[tokio::test]
    async fn put_if_absent_keeps_the_newer_resident() {
        let store = HotStore::new(TTL);
        let stale = doc();
        let id = stale.id;
        store.put(stale.clone(), TTL);
        set_summary(&store, id, "fresh", 1).unwrap();

        let resident = store.put_if_absent(stale, TTL);
        assert_eq!(resident.version, 2);
        assert_eq!(resident.summary, "fresh");
    }

    #[tokio::test]
    async fn attach_report_does_not_bump_version() {
        let store = HotStore::new(TTL);
        let doc = doc();
        let id = doc.id;
        store.put(doc, TTL);

        assert!(store.attach_report(id, 1, "/files/reports/x/v1.pdf"));
        let resident = store.get(id).unwrap();
        assert_eq!(resident.version, 1);
        assert_eq!(resident.pdf_url.as_deref(), Some("/files/reports/x/v1.pdf"));
        assert!(!store.attach_report(uuid::Uuid::new_v4(), 1, "/nowhere"));

        set_summary(&store, id, "edited", 1).unwrap();
        assert!(!store.attach_report(id, 1, "/files/reports/x/v1-again.pdf"));
        assert_eq!(
            store.get(id).unwrap().pdf_url.as_deref(),
            Some("/files/reports/x/v1.pdf")
        );
    }

    #[test]
    fn put_waits_for_a_commit_in_flight_on_the_old_entry() {
        let store = Arc::new(HotStore::new(TTL));
        let first = doc();
        let id = first.id;
        store.put(first.clone(), TTL);
        let old = store.lookup(id).unwrap();

        // Stands in for a writer that is mid-commit on the old entry.
        let guard = old.lock();
        let replacer = {
            let store = Arc::clone(&store);
            let mut second = first.clone();
            second.summary = "replacement".into();
            std::thread::spawn(move || store.put(second, TTL))
        };
        std::thread::sleep(Duration::from_millis(50));
        assert!(Arc::ptr_eq(&store.lookup(id).unwrap(), &old));
        drop(guard);
        replacer.join().unwrap();

        assert!(old.lock().evicted);
        assert!(!Arc::ptr_eq(&store.lookup(id).unwrap(), &old));
        assert_eq!(store.get(id).unwrap().summary, "replacement");
    }

    #[test]
    fn removed_entry_is_marked_before_it_leaves_the_map() {
        let store = HotStore::new(TTL);
        let doc = doc();
        let id = doc.id;
        store.put(doc, TTL);
        let old = store.lookup(id).unwrap();

        assert!(store.remove(id));
        assert!(old.lock().evicted);
        assert!(store.lookup(id).is_none());
        assert!(!store.remove(id));
    }

    #[tokio::test]
    async fn replaced_entry_is_not_written_through() {
        let store = HotStore::new(TTL);
        let doc = doc();
        let id = doc.id;
        store.put(doc.clone(), TTL);
        store.put(doc, TTL);

        assert_eq!(set_summary(&store, id, "x", 1).unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.remove(id));
        assert!(store.get(id).is_none());
    }
}
