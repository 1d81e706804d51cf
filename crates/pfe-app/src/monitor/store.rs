//! Keyed table of per-transfer activity records.

use std::collections::HashMap;
use std::time::Instant;

use pfe_torrent_core::{ContentHash, TransferActivity, TransferId};

/// Activity records keyed by engine identity, owned by the tick loop.
#[derive(Debug, Default)]
pub struct ActivityStore {
    records: HashMap<TransferId, TransferActivity>,
}

impl ActivityStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing record for `id`, or a zero-initialised one stamped `now`.
    ///
    /// `derive_hash` runs only when a record is created.
    pub fn get_or_create(
        &mut self,
        id: TransferId,
        now: Instant,
        derive_hash: impl FnOnce() -> Option<ContentHash>,
    ) -> &mut TransferActivity {
        self.records
            .entry(id)
            .or_insert_with(|| TransferActivity::new(id, derive_hash(), now))
    }

    /// Record for `id`, if one exists.
    #[must_use]
    pub fn get(&self, id: TransferId) -> Option<&TransferActivity> {
        self.records.get(&id)
    }

    /// Mutable record for `id`, if one exists.
    pub fn get_mut(&mut self, id: TransferId) -> Option<&mut TransferActivity> {
        self.records.get_mut(&id)
    }

    /// Drop the record for `id`, returning it.
    pub fn forget(&mut self, id: TransferId) -> Option<TransferActivity> {
        self.records.remove(&id)
    }

    /// Copies of every record ordered by identity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TransferActivity> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfe_torrent_core::{ActivityState, HASH_LEN};

    #[test]
    fn get_or_create_derives_hash_once() {
        let mut store = ActivityStore::new();
        let now = Instant::now();
        let id = TransferId::new(7);
        let hash = ContentHash::from_bytes([1; HASH_LEN]);
        let mut derivations = 0;

        let record = store.get_or_create(id, now, || {
            derivations += 1;
            Some(hash)
        });
        assert_eq!(record.hash, Some(hash));
        assert_eq!(record.state, ActivityState::Active);
        assert_eq!(record.last_activity, now);
        record.progress_percent = 40;

        let again = store.get_or_create(id, now, || {
            derivations += 1;
            None
        });
        assert_eq!(again.progress_percent, 40);
        assert_eq!(derivations, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn records_without_hash_are_still_created() {
        let mut store = ActivityStore::new();
        let record = store.get_or_create(TransferId::new(1), Instant::now(), || None);
        assert!(record.hash.is_none());
        assert!(!store.is_empty());
    }

    #[test]
    fn snapshot_is_ordered_and_forget_removes() {
        let mut store = ActivityStore::new();
        let now = Instant::now();
        for raw in [3, 1, 2] {
            let _ = store.get_or_create(TransferId::new(raw), now, || None);
        }
        let ids: Vec<u64> = store.snapshot().iter().map(|record| record.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert!(store.forget(TransferId::new(2)).is_some());
        assert!(store.forget(TransferId::new(2)).is_none());
        assert!(store.get(TransferId::new(2)).is_none());
        assert_eq!(store.len(), 2);
    }
}
