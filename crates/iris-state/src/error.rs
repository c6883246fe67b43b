//! # Engine Errors
//!
//! Validation failures (`InvalidTransition`, `GroupNotEligible`,
//! `ClaimNotAllowed`, `ConcurrentModification`) are rejected operations:
//! the record is untouched and the caller may correct and retry. `Audit`
//! and `Tree` are infrastructure faults for the single operation.

use thiserror::Error;

use iris_core::{GroupId, RecordCardId, RecordState, Timestamp};
use iris_groups::GroupTreeError;

use crate::history::AuditError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The pair is not in the allow-table.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: RecordState, to: RecordState },

    /// The acting or target group fails an ambit or reassignment check.
    #[error("{group} is not eligible: {reason}")]
    GroupNotEligible { group: GroupId, reason: String },

    /// The caller's view of the record is stale.
    #[error("{record} was modified concurrently (expected version {expected}, found {actual})")]
    ConcurrentModification {
        record: RecordCardId,
        expected: u64,
        actual: u64,
    },

    #[error("{0} not found")]
    NotFound(RecordCardId),

    /// The operation needs an open record.
    #[error("{0} is closed")]
    RecordClosed(RecordCardId),

    #[error("message {message} not found on {record}")]
    MessageNotFound { record: RecordCardId, message: u64 },

    #[error("claim on {record} not allowed: {reason}")]
    ClaimNotAllowed { record: RecordCardId, reason: String },

    /// A deadline counted from `start` lies past the end of representable time.
    #[error("deadline counted from {start} is out of range")]
    DeadlineOutOfRange { start: Timestamp },

    /// Structural problem with the group tree, including cycles.
    #[error(transparent)]
    Tree(#[from] GroupTreeError),

    #[error("audit append failed: {0}")]
    Audit(#[from] AuditError),
}

impl EngineError {
    pub(crate) fn not_eligible(group: GroupId, reason: impl Into<String>) -> Self {
        Self::GroupNotEligible {
            group,
            reason: reason.into(),
        }
    }

    /// Short label for the `reason` metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::GroupNotEligible { .. } => "group_not_eligible",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::NotFound(_) | Self::MessageNotFound { .. } => "not_found",
            Self::ClaimNotAllowed { .. } => "claim_not_allowed",
            Self::RecordClosed(_) => "record_closed",
            Self::DeadlineOutOfRange { .. } => "deadline_out_of_range",
            Self::Tree(GroupTreeError::TreeCycleDetected { .. }) => "tree_cycle_detected",
            Self::Tree(_) => "tree",
            Self::Audit(_) => "audit",
        }
    }
}
