//! # Audit History
//!
//! Two append-only logs per record:
//!
//! - **State history**: one row per committed transition. Sequence numbers
//!   start at 1 and increase by one; `created_at` never goes backwards.
//! - **Reasignations**: one row per change of responsible group, with the
//!   reason. Derivation rows are skipped when working out when a record
//!   entered its current ambit.
//!
//! The engine writes both through [`AuditSink::append`] as a single
//! [`AuditBatch`], so a transition that also reassigns either lands whole
//! or not at all. Rows are never mutated.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use iris_core::{GroupId, RecordCardId, RecordState, Timestamp, UserId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("history of {record} expected sequence {expected}, got {actual}")]
    OutOfSequence {
        record: RecordCardId,
        expected: u64,
        actual: u64,
    },

    #[error("history of {record} would go back in time from {previous} to {next}")]
    NonMonotonic {
        record: RecordCardId,
        previous: Timestamp,
        next: Timestamp,
    },

    #[error("audit batch for {batch} carries a row for {row}")]
    MismatchedRecord { batch: RecordCardId, row: RecordCardId },

    #[error("audit storage unavailable: {0}")]
    Unavailable(String),
}

/// A committed state history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHistoryEntry {
    pub record: RecordCardId,
    pub sequence: u64,
    pub previous_state: RecordState,
    pub next_state: RecordState,
    /// Group that performed the change.
    pub group: GroupId,
    pub user: UserId,
    pub created_at: Timestamp,
    /// Set for changes made by the system rather than a person.
    #[serde(default)]
    pub automatic: bool,
}

/// A state change waiting to be sequenced by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub previous_state: RecordState,
    pub next_state: RecordState,
    pub group: GroupId,
    pub user: UserId,
    pub created_at: Timestamp,
    pub automatic: bool,
}

/// Why the responsible group changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasignationReason {
    /// Automatic move dictated by the theme's derivation tables.
    Derivation,
    /// Manual move by a group.
    Reasignation,
    /// Responsibility inherited by a claim.
    Claim,
    /// Manual move to a group outside the current ambit.
    OutOfAmbit,
}

impl ReasignationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Derivation => "derivation",
            Self::Reasignation => "reasignation",
            Self::Claim => "claim",
            Self::OutOfAmbit => "out_of_ambit",
        }
    }

    pub fn is_derivation(&self) -> bool {
        matches!(self, Self::Derivation)
    }
}

impl std::fmt::Display for ReasignationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change of responsible group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reasignation {
    pub record: RecordCardId,
    pub previous_group: GroupId,
    pub next_group: GroupId,
    pub reason: ReasignationReason,
    pub user: UserId,
    pub created_at: Timestamp,
}

/// Rows to append for one record in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditBatch {
    pub record: RecordCardId,
    pub state_change: Option<StateChange>,
    pub reasignation: Option<Reasignation>,
}

impl AuditBatch {
    pub fn new(record: RecordCardId) -> Self {
        Self {
            record,
            state_change: None,
            reasignation: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state_change.is_none() && self.reasignation.is_none()
    }
}

/// Append-only audit storage.
pub trait AuditSink: Send + Sync {
    /// Append every row of `batch` or none of them. Returns the sequenced
    /// state history row, if the batch had one.
    fn append(&self, batch: AuditBatch) -> Result<Option<StateHistoryEntry>, AuditError>;

    /// State history of a record, oldest first.
    fn state_history(&self, record: RecordCardId) -> Vec<StateHistoryEntry>;

    /// Reasignations of a record, oldest first.
    fn reasignations(&self, record: RecordCardId) -> Vec<Reasignation>;
}

#[derive(Debug, Default)]
struct Logs {
    history: BTreeMap<RecordCardId, Vec<StateHistoryEntry>>,
    reasignations: BTreeMap<RecordCardId, Vec<Reasignation>>,
}

/// Audit storage held in memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    logs: Mutex<Logs>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously exported rows, checking sequence and time order.
    pub fn import(
        history: impl IntoIterator<Item = StateHistoryEntry>,
        reasignations: impl IntoIterator<Item = Reasignation>,
    ) -> Result<Self, AuditError> {
        let mut logs = Logs::default();
        for entry in history {
            let rows = logs.history.entry(entry.record).or_default();
            check_next(entry.record, rows, entry.sequence, entry.created_at)?;
            rows.push(entry);
        }
        for row in reasignations {
            logs.reasignations.entry(row.record).or_default().push(row);
        }
        Ok(Self {
            logs: Mutex::new(logs),
        })
    }

    /// Every row, grouped by record in ascending id order.
    pub fn export(&self) -> (Vec<StateHistoryEntry>, Vec<Reasignation>) {
        let logs = self.logs.lock();
        (
            logs.history.values().flatten().cloned().collect(),
            logs.reasignations.values().flatten().cloned().collect(),
        )
    }

    pub fn history_len(&self) -> usize {
        self.logs.lock().history.values().map(Vec::len).sum()
    }
}

fn check_next(
    record: RecordCardId,
    rows: &[StateHistoryEntry],
    sequence: u64,
    created_at: Timestamp,
) -> Result<(), AuditError> {
    let expected = rows.last().map_or(1, |last| last.sequence + 1);
    if sequence != expected {
        return Err(AuditError::OutOfSequence {
            record,
            expected,
            actual: sequence,
        });
    }
    if let Some(last) = rows.last() {
        if created_at < last.created_at {
            return Err(AuditError::NonMonotonic {
                record,
                previous: last.created_at,
                next: created_at,
            });
        }
    }
    Ok(())
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, batch: AuditBatch) -> Result<Option<StateHistoryEntry>, AuditError> {
        if let Some(row) = &batch.reasignation {
            if row.record != batch.record {
                return Err(AuditError::MismatchedRecord {
                    batch: batch.record,
                    row: row.record,
                });
            }
        }

        let mut logs = self.logs.lock();
        let entry = match batch.state_change {
            Some(change) => {
                let rows = logs.history.get(&batch.record).map(Vec::as_slice).unwrap_or(&[]);
                let sequence = rows.last().map_or(1, |last| last.sequence + 1);
                check_next(batch.record, rows, sequence, change.created_at)?;
                Some(StateHistoryEntry {
                    record: batch.record,
                    sequence,
                    previous_state: change.previous_state,
                    next_state: change.next_state,
                    group: change.group,
                    user: change.user,
                    created_at: change.created_at,
                    automatic: change.automatic,
                })
            }
            None => None,
        };

        // Validation is done; from here both writes happen.
        if let Some(entry) = &entry {
            logs.history.entry(batch.record).or_default().push(entry.clone());
        }
        if let Some(row) = batch.reasignation {
            logs.reasignations.entry(batch.record).or_default().push(row);
        }
        Ok(entry)
    }

    fn state_history(&self, record: RecordCardId) -> Vec<StateHistoryEntry> {
        self.logs.lock().history.get(&record).cloned().unwrap_or_default()
    }

    fn reasignations(&self, record: RecordCardId) -> Vec<Reasignation> {
        self.logs.lock().reasignations.get(&record).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn change(from: RecordState, to: RecordState, at: &str) -> StateChange {
        StateChange {
            previous_state: from,
            next_state: to,
            group: GroupId(4),
            user: UserId::new("operator"),
            created_at: ts(at),
            automatic: false,
        }
    }

    #[test]
    fn sequences_start_at_one_and_increase() {
        let log = InMemoryAuditLog::new();
        let record = RecordCardId(1);
        let mut batch = AuditBatch::new(record);
        batch.state_change = Some(change(
            RecordState::PendingValidate,
            RecordState::Planned,
            "2026-05-01T10:00:00Z",
        ));
        let first = log.append(batch.clone()).unwrap().unwrap();
        assert_eq!(first.sequence, 1);
        batch.state_change = Some(change(
            RecordState::Planned,
            RecordState::InSolution,
            "2026-05-01T10:00:00Z",
        ));
        let second = log.append(batch).unwrap().unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(log.state_history(record).len(), 2);
        assert!(log.state_history(RecordCardId(2)).is_empty());
    }

    #[test]
    fn time_never_goes_backwards() {
        let log = InMemoryAuditLog::new();
        let record = RecordCardId(1);
        let mut batch = AuditBatch::new(record);
        batch.state_change = Some(change(
            RecordState::PendingValidate,
            RecordState::Planned,
            "2026-05-02T00:00:00Z",
        ));
        log.append(batch.clone()).unwrap();
        batch.state_change = Some(change(
            RecordState::Planned,
            RecordState::InSolution,
            "2026-05-01T00:00:00Z",
        ));
        batch.reasignation = Some(Reasignation {
            record,
            previous_group: GroupId(4),
            next_group: GroupId(5),
            reason: ReasignationReason::Reasignation,
            user: UserId::new("operator"),
            created_at: ts("2026-05-01T00:00:00Z"),
        });
        assert!(matches!(log.append(batch).unwrap_err(), AuditError::NonMonotonic { .. }));
        // Nothing from the rejected batch was written.
        assert_eq!(log.state_history(record).len(), 1);
        assert!(log.reasignations(record).is_empty());
    }

    #[test]
    fn mismatched_reasignation_rejected() {
        let log = InMemoryAuditLog::new();
        let mut batch = AuditBatch::new(RecordCardId(1));
        batch.reasignation = Some(Reasignation {
            record: RecordCardId(2),
            previous_group: GroupId(4),
            next_group: GroupId(5),
            reason: ReasignationReason::Claim,
            user: UserId::system(),
            created_at: ts("2026-05-01T00:00:00Z"),
        });
        assert!(matches!(log.append(batch).unwrap_err(), AuditError::MismatchedRecord { .. }));
    }

    #[test]
    fn import_checks_sequences() {
        let row = |sequence: u64| StateHistoryEntry {
            record: RecordCardId(1),
            sequence,
            previous_state: RecordState::PendingValidate,
            next_state: RecordState::Planned,
            group: GroupId(4),
            user: UserId::new("operator"),
            created_at: ts("2026-05-01T00:00:00Z"),
            automatic: false,
        };
        let log = InMemoryAuditLog::import(vec![row(1), row(2)], Vec::new()).unwrap();
        assert_eq!(log.history_len(), 2);
        assert_eq!(log.export().0.len(), 2);
        assert!(matches!(
            InMemoryAuditLog::import(vec![row(1), row(3)], Vec::new()).unwrap_err(),
            AuditError::OutOfSequence { expected: 2, actual: 3, .. }
        ));
    }

    #[test]
    fn derivation_reason() {
        assert!(ReasignationReason::Derivation.is_derivation());
        assert!(!ReasignationReason::OutOfAmbit.is_derivation());
        assert_eq!(ReasignationReason::OutOfAmbit.to_string(), "out_of_ambit");
    }
}
