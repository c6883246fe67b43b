//! # Group Permissions
//!
//! Permission codes are plain strings granted per group. The engine only
//! asks yes/no questions through [`PermissionProvider`]; where the grants
//! come from is up to the host.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use iris_core::GroupId;

/// Permission codes consulted by the engine.
pub mod codes {
    /// Coordinators get a longer window to move a validated record to a
    /// theme outside their ambit.
    pub const RECARD_COORDINATOR_VALIDATION: &str = "RECARD_COORDINATOR_VALIDATION";
}

/// Source of permission grants.
pub trait PermissionProvider: Send + Sync {
    /// All permission codes held by `group`.
    fn permissions(&self, group: GroupId) -> BTreeSet<String>;

    /// Whether `group` holds `code`.
    fn has_permission(&self, group: GroupId, code: &str) -> bool {
        self.permissions(group).contains(code)
    }
}

/// A fixed permission table, loaded from configuration or built in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticPermissions {
    grants: BTreeMap<GroupId, BTreeSet<String>>,
}

impl StaticPermissions {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `code` to `group`.
    pub fn grant(&mut self, group: GroupId, code: impl Into<String>) {
        self.grants.entry(group).or_default().insert(code.into());
    }

    /// Builder form of [`grant`](Self::grant).
    pub fn with(mut self, group: GroupId, code: impl Into<String>) -> Self {
        self.grant(group, code);
        self
    }

    /// Remove `code` from `group`. Returns whether it was held.
    pub fn revoke(&mut self, group: GroupId, code: &str) -> bool {
        self.grants
            .get_mut(&group)
            .is_some_and(|set| set.remove(code))
    }
}

impl PermissionProvider for StaticPermissions {
    fn permissions(&self, group: GroupId) -> BTreeSet<String> {
        self.grants.get(&group).cloned().unwrap_or_default()
    }

    fn has_permission(&self, group: GroupId, code: &str) -> bool {
        self.grants.get(&group).is_some_and(|set| set.contains(code))
    }
}
