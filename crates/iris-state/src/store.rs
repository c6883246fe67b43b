//! # Record Card Store
//!
//! In-memory record storage backed by `DashMap`.
//!
//! [`RecordCardStore::try_update`] is the only way to change a stored
//! record. It runs read-validate-update under the entry's write lock, so
//! two concurrent changes to one record are serialized and neither applies
//! against a stale state.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use iris_core::RecordCardId;

use crate::error::EngineError;
use crate::record::RecordCard;

pub struct RecordCardStore {
    records: DashMap<RecordCardId, RecordCard>,
    next_id: AtomicU64,
}

impl RecordCardStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Hydrate from existing records. Later duplicates replace earlier ones.
    pub fn with_records(records: impl IntoIterator<Item = RecordCard>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Reserve a fresh id.
    pub fn allocate_id(&self) -> RecordCardId {
        RecordCardId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Insert a record directly, bypassing validation.
    pub fn insert(&self, record: RecordCard) {
        self.next_id.fetch_max(record.id.get() + 1, Ordering::SeqCst);
        self.records.insert(record.id, record);
    }

    /// Drop a record. Used to roll back an insert that was never linked.
    pub fn remove(&self, id: RecordCardId) -> Option<RecordCard> {
        self.records.remove(&id).map(|(_, record)| record)
    }

    pub fn get(&self, id: RecordCardId) -> Option<RecordCard> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: RecordCardId) -> bool {
        self.records.contains_key(&id)
    }

    /// All records in ascending id order.
    pub fn list(&self) -> Vec<RecordCard> {
        let mut records: Vec<RecordCard> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        records
    }

    /// Ids of records in an open state, ascending.
    pub fn open_ids(&self) -> Vec<RecordCardId> {
        let mut ids: Vec<RecordCardId> = self
            .records
            .iter()
            .filter(|r| r.value().state.is_open())
            .map(|r| *r.key())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply `change` to a record under its entry lock.
    ///
    /// `change` works on a copy. The stored record is replaced, and its
    /// version bumped, only when `change` succeeds and actually modified
    /// the copy. With `expected_version` set, a record at any other version
    /// is rejected with [`EngineError::ConcurrentModification`] before
    /// `change` runs.
    ///
    /// `change` must not touch this store: the entry lock is held.
    pub fn try_update<T>(
        &self,
        id: RecordCardId,
        expected_version: Option<u64>,
        change: impl FnOnce(&mut RecordCard) -> Result<T, EngineError>,
    ) -> Result<(RecordCard, T), EngineError> {
        let mut entry = self.records.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        let current = entry.value_mut();

        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(EngineError::ConcurrentModification {
                    record: id,
                    expected,
                    actual: current.version,
                });
            }
        }

        let mut draft = current.clone();
        let output = change(&mut draft)?;
        if draft != *current {
            draft.version = current.version + 1;
            *current = draft;
        }
        Ok((current.clone(), output))
    }
}

impl Default for RecordCardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecordCardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCardStore")
            .field("records_count", &self.records.len())
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::{GroupId, RecordState, Timestamp};

    fn record(id: u64, state: RecordState) -> RecordCard {
        let at = Timestamp::parse("2026-05-01T00:00:00Z").unwrap();
        RecordCard {
            id: RecordCardId(id),
            normalized_record_id: format!("{id}AAA"),
            state,
            theme: None,
            district: None,
            responsible_group: GroupId(1),
            creation_group: GroupId(1),
            validated: false,
            validated_at: None,
            created_at: at,
            updated_at: at,
            ans_limit_date: None,
            ans_limit_nearexpire: None,
            response_limit_date: None,
            closing_date: None,
            alarms: Default::default(),
            claimed_from: None,
            claimed_by: None,
            claims_number: 1,
            messages: Vec::new(),
            version: 0,
        }
    }

    #[test]
    fn ids_continue_after_hydration() {
        let store = RecordCardStore::with_records(vec![record(7, RecordState::Planned)]);
        assert_eq!(store.allocate_id(), RecordCardId(8));
        assert_eq!(store.allocate_id(), RecordCardId(9));
    }

    #[test]
    fn update_bumps_version_only_on_change() {
        let store = RecordCardStore::with_records(vec![record(1, RecordState::Planned)]);
        let (after, ()) = store.try_update(RecordCardId(1), Some(0), |_| Ok(())).unwrap();
        assert_eq!(after.version, 0);
        let (after, ()) = store
            .try_update(RecordCardId(1), Some(0), |r| {
                r.state = RecordState::InSolution;
                Ok(())
            })
            .unwrap();
        assert_eq!(after.version, 1);
        assert_eq!(store.get(RecordCardId(1)).unwrap().state, RecordState::InSolution);
    }

    #[test]
    fn stale_version_rejected() {
        let store = RecordCardStore::with_records(vec![record(1, RecordState::Planned)]);
        let err = store.try_update(RecordCardId(1), Some(3), |_| Ok(())).unwrap_err();
        assert_eq!(
            err,
            EngineError::ConcurrentModification {
                record: RecordCardId(1),
                expected: 3,
                actual: 0
            }
        );
    }

    #[test]
    fn failed_change_leaves_record_untouched() {
        let store = RecordCardStore::with_records(vec![record(1, RecordState::Planned)]);
        let err = store
            .try_update(RecordCardId(1), None, |r| -> Result<(), EngineError> {
                r.state = RecordState::Closed;
                Err(EngineError::NotFound(RecordCardId(99)))
            })
            .unwrap_err();
        assert_eq!(err, EngineError::NotFound(RecordCardId(99)));
        assert_eq!(store.get(RecordCardId(1)).unwrap().state, RecordState::Planned);
        assert!(matches!(
            store.try_update(RecordCardId(5), None, |_| Ok(())),
            Err(EngineError::NotFound(RecordCardId(5)))
        ));
    }

    #[test]
    fn open_ids_sorted() {
        let store = RecordCardStore::with_records(vec![
            record(3, RecordState::Planned),
            record(1, RecordState::Closed),
            record(2, RecordState::PendingReply),
        ]);
        assert_eq!(store.open_ids(), vec![RecordCardId(2), RecordCardId(3)]);
        assert_eq!(store.list().len(), 3);
        assert_eq!(store.remove(RecordCardId(1)).unwrap().state, RecordState::Closed);
        assert!(store.remove(RecordCardId(1)).is_none());
        assert_eq!(store.len(), 2);
    }
}
