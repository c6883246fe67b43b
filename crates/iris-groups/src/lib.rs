//! # iris-groups: Responsibility Group Tree
//!
//! The organisational chart that owns record cards. Each group carries a
//! materialized *plate*, the concatenation of its ancestor ids
//! (`"1-4-9-"`), so ancestry checks are a prefix comparison.
//!
//! ## Structure
//!
//! - [`group`]: the `Group` node and its soft-delete marker.
//! - [`tree`]: `GroupTree`, which owns the nodes, rebuilds plates
//!   top-down, detects cycles, and publishes immutable
//!   [`TreeSnapshot`]s that readers hold while a rebuild runs.
//! - [`permissions`]: permission codes granted to groups and the
//!   `PermissionProvider` seam the engine queries.
//!
//! ## Invariants
//!
//! - A published snapshot always has plates consistent with its parent
//!   links. A rebuild that fails leaves the previous snapshot published.
//! - A group is never its own parent and never physically removed.

pub mod group;
pub mod permissions;
pub mod tree;

pub use group::{Group, GroupError};
pub use permissions::{codes, PermissionProvider, StaticPermissions};
pub use tree::{GroupTree, GroupTreeError, RebuildReport, TreeSnapshot, MAX_TREE_DEPTH};
