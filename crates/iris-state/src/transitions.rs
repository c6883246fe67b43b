//! # Transition Allow-Table
//!
//! ```text
//! PENDING_VALIDATE ─┬─▶ PLANNED ─────────┬─▶ IN_SOLUTION ◀──▶ PENDING_REPLY
//!                   ├─▶ IN_SOLUTION      │        │                │
//!                   ├─▶ PENDING_REPLY    │        ▼                ▼
//!                   └─▶ EXTERNAL_PROCESSING ──▶ EXTERNAL_RETURNED  CLOSED
//! ```
//!
//! | from                | to                                                        |
//! |---------------------|-----------------------------------------------------------|
//! | PENDING_VALIDATE    | PLANNED, IN_SOLUTION, PENDING_REPLY, EXTERNAL_PROCESSING, |
//! |                     | CANCELLED, NOT_PROCESSED                                  |
//! | PLANNED             | IN_SOLUTION, PENDING_REPLY, CANCELLED, NOT_PROCESSED      |
//! | IN_SOLUTION         | PENDING_REPLY, CLOSED, CANCELLED, NOT_PROCESSED           |
//! | PENDING_REPLY       | IN_SOLUTION, CLOSED, CANCELLED                            |
//! | EXTERNAL_PROCESSING | EXTERNAL_RETURNED, CLOSED, CANCELLED                      |
//! | EXTERNAL_RETURNED   | PENDING_VALIDATE, PLANNED, IN_SOLUTION, CANCELLED         |
//!
//! Closed states have no exits. Reopening a closed record is a claim,
//! which creates a new record.

use iris_core::RecordState;

/// Whether `from → to` is in the allow-table.
pub fn is_valid_transition(from: RecordState, to: RecordState) -> bool {
    use RecordState::*;
    matches!(
        (from, to),
        (PendingValidate, Planned)
            | (PendingValidate, InSolution)
            | (PendingValidate, PendingReply)
            | (PendingValidate, ExternalProcessing)
            | (PendingValidate, Cancelled)
            | (PendingValidate, NotProcessed)
            | (Planned, InSolution)
            | (Planned, PendingReply)
            | (Planned, Cancelled)
            | (Planned, NotProcessed)
            | (InSolution, PendingReply)
            | (InSolution, Closed)
            | (InSolution, Cancelled)
            | (InSolution, NotProcessed)
            | (PendingReply, InSolution)
            | (PendingReply, Closed)
            | (PendingReply, Cancelled)
            | (ExternalProcessing, ExternalReturned)
            | (ExternalProcessing, Closed)
            | (ExternalProcessing, Cancelled)
            | (ExternalReturned, PendingValidate)
            | (ExternalReturned, Planned)
            | (ExternalReturned, InSolution)
            | (ExternalReturned, Cancelled)
    )
}

/// Every state reachable from `from` in one step, in canonical order.
pub fn valid_transitions(from: RecordState) -> Vec<RecordState> {
    RecordState::all()
        .iter()
        .copied()
        .filter(|to| is_valid_transition(from, *to))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_states_are_terminal() {
        for state in RecordState::all() {
            if state.is_closed() {
                assert!(valid_transitions(*state).is_empty(), "{state} must be terminal");
            } else {
                assert!(!valid_transitions(*state).is_empty(), "{state} must have exits");
            }
        }
    }

    #[test]
    fn no_self_transitions() {
        for state in RecordState::all() {
            assert!(!is_valid_transition(*state, *state));
        }
    }

    #[test]
    fn table_size() {
        let total: usize = RecordState::all().iter().map(|s| valid_transitions(*s).len()).sum();
        assert_eq!(total, 24);
    }

    #[test]
    fn pending_reply_round_trip() {
        assert!(is_valid_transition(RecordState::InSolution, RecordState::PendingReply));
        assert!(is_valid_transition(RecordState::PendingReply, RecordState::InSolution));
        assert!(!is_valid_transition(RecordState::PendingReply, RecordState::NotProcessed));
    }
}
