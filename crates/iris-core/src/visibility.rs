//! # Soft-Delete Visibility
//!
//! Groups and themes are never physically deleted. Every lookup that can
//! return soft-deleted rows takes an explicit [`IncludeDeleted`] argument
//! instead of relying on per-collection hidden state.

use serde::{Deserialize, Serialize};

/// Whether soft-deleted rows are visible to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IncludeDeleted {
    /// Only rows that are not soft-deleted.
    #[default]
    No,
    /// Soft-deleted rows are returned as well (history, audits).
    Yes,
}

impl IncludeDeleted {
    /// Whether a row with the given deletion status passes this filter.
    pub fn admits(&self, deleted: bool) -> bool {
        match self {
            Self::Yes => true,
            Self::No => !deleted,
        }
    }
}
