//! # Record State: Single Source of Truth
//!
//! The nine states a record card can be in. This is the one definition used
//! by the theme derivation tables, the state machine allow-table, history
//! rows and the CLI. Every `match` on it is exhaustive.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::IrisError;

/// Lifecycle state of a record card.
///
/// | State                 | Meaning                                          |
/// |-----------------------|--------------------------------------------------|
/// | `PendingValidate`     | Created, waiting for the responsible group       |
/// | `Planned`             | Validated, work scheduled                        |
/// | `InSolution`          | Being resolved                                   |
/// | `PendingReply`        | Resolved, the citizen must be answered           |
/// | `Closed`              | Answered and closed (terminal)                   |
/// | `Cancelled`           | Cancelled (terminal)                             |
/// | `NotProcessed`        | Closed without processing (terminal)             |
/// | `ExternalProcessing`  | Handed to an external body                       |
/// | `ExternalReturned`    | Returned by the external body                    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    PendingValidate,
    Planned,
    InSolution,
    PendingReply,
    Closed,
    Cancelled,
    NotProcessed,
    ExternalProcessing,
    ExternalReturned,
}

/// Total number of record states.
pub const RECORD_STATE_COUNT: usize = 9;

impl RecordState {
    /// All states in canonical order.
    pub fn all() -> &'static [RecordState] {
        &[
            Self::PendingValidate,
            Self::Planned,
            Self::InSolution,
            Self::PendingReply,
            Self::Closed,
            Self::Cancelled,
            Self::NotProcessed,
            Self::ExternalProcessing,
            Self::ExternalReturned,
        ]
    }

    /// The snake_case identifier, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingValidate => "pending_validate",
            Self::Planned => "planned",
            Self::InSolution => "in_solution",
            Self::PendingReply => "pending_reply",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
            Self::NotProcessed => "not_processed",
            Self::ExternalProcessing => "external_processing",
            Self::ExternalReturned => "external_returned",
        }
    }

    /// Whether the record is finished. Closed states accept no transition;
    /// a closed record can only be reopened through a claim.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled | Self::NotProcessed)
    }

    /// Whether the record still counts against its deadlines.
    pub fn is_open(&self) -> bool {
        !self.is_closed()
    }
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordState {
    type Err = IrisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| IrisError::Validation(format!("unknown record state: {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_states_count_and_unique() {
        let states = RecordState::all();
        assert_eq!(states.len(), RECORD_STATE_COUNT);
        let unique: std::collections::HashSet<_> = states.iter().collect();
        assert_eq!(unique.len(), RECORD_STATE_COUNT);
    }

    #[test]
    fn test_closed_states() {
        let closed: Vec<_> = RecordState::all().iter().filter(|s| s.is_closed()).collect();
        assert_eq!(
            closed,
            vec![&RecordState::Closed, &RecordState::Cancelled, &RecordState::NotProcessed]
        );
        assert!(RecordState::PendingReply.is_open());
        assert!(RecordState::ExternalProcessing.is_open());
    }

    #[test]
    fn test_as_str_roundtrip() {
        for state in RecordState::all() {
            let parsed: RecordState = state.as_str().parse().unwrap();
            assert_eq!(*state, parsed);
        }
        assert!("PLANNED".parse::<RecordState>().is_err());
    }

    #[test]
    fn test_serde_format_matches_as_str() {
        for state in RecordState::all() {
            let json = serde_json::to_string(state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }
}
