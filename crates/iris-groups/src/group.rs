//! # Group
//!
//! A node of the responsibility tree.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use iris_core::{GroupId, Timestamp};

/// Errors raised when constructing or editing a single group.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// A group cannot be its own parent.
    #[error("{0} cannot be its own parent")]
    SelfParent(GroupId),
}

/// A responsibility group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group identifier.
    pub id: GroupId,
    /// Display name.
    pub name: String,
    /// Parent group, `None` for a root.
    #[serde(default)]
    pub parent: Option<GroupId>,
    /// Marks the top of an administrative scope.
    #[serde(default)]
    pub is_ambit: bool,
    /// Soft-delete marker. A deleted group stays in the tree as history.
    #[serde(default)]
    pub deleted_at: Option<Timestamp>,
    /// Materialized ancestor path, maintained by [`crate::GroupTree`].
    #[serde(default)]
    pub plate: String,
}

impl Group {
    /// A root group.
    pub fn root(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            is_ambit: false,
            deleted_at: None,
            plate: String::new(),
        }
    }

    /// A group under `parent`.
    pub fn child(
        id: GroupId,
        name: impl Into<String>,
        parent: GroupId,
    ) -> Result<Self, GroupError> {
        let mut group = Self::root(id, name);
        group.set_parent(Some(parent))?;
        Ok(group)
    }

    /// Mark this group as an ambit root.
    pub fn with_ambit(mut self) -> Self {
        self.is_ambit = true;
        self
    }

    /// Change the parent link. The plate is stale until the next rebuild.
    pub fn set_parent(&mut self, parent: Option<GroupId>) -> Result<(), GroupError> {
        if parent == Some(self.id) {
            return Err(GroupError::SelfParent(self.id));
        }
        self.parent = parent;
        Ok(())
    }

    /// Whether the group may own records.
    pub fn is_enabled(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Whether the group has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_parent_is_rejected() {
        assert_eq!(
            Group::child(GroupId(3), "loop", GroupId(3)).unwrap_err(),
            GroupError::SelfParent(GroupId(3))
        );
        let mut g = Group::root(GroupId(5), "root");
        assert!(g.set_parent(Some(GroupId(5))).is_err());
        assert_eq!(g.parent, None);
    }

    #[test]
    fn soft_delete_disables() {
        let mut g = Group::root(GroupId(1), "DAIR");
        assert!(g.is_enabled());
        g.deleted_at = Some(Timestamp::parse("2026-01-01T00:00:00Z").unwrap());
        assert!(!g.is_enabled());
        assert!(g.is_deleted());
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{"id": 4, "name": "Districte 4", "parent": 1}"#;
        let g: Group = serde_json::from_str(json).unwrap();
        assert_eq!(g.parent, Some(GroupId(1)));
        assert!(!g.is_ambit);
        assert!(g.plate.is_empty());
    }
}
