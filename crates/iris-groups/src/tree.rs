//! # Group Tree
//!
//! Owns the responsibility groups and their materialized plates.
//!
//! ## Plates
//!
//! ```text
//! 1 DAIR                 plate "1-"
//! ├── 4 Districte Gràcia plate "1-4-"
//! │   └── 9 Manteniment  plate "1-4-9-"
//! └── 7 Mobilitat        plate "1-7-"
//! ```
//!
//! A plate is the parent's plate followed by the node id and a dash. Because
//! every id is terminated by `-`, `"1-4-"` is a prefix of `"1-4-9-"` but not
//! of `"1-45-"`, so ancestry is a plain prefix test.
//!
//! ## Rebuilds and Snapshots
//!
//! Readers call [`GroupTree::snapshot()`] and keep the returned
//! `Arc<TreeSnapshot>` for the duration of a decision. Every structural
//! edit recomputes all plates from the roots down into a fresh snapshot and
//! swaps it in under the write lock, so a reader never observes a half
//! rebuilt tree. Edits are serialized by a writer mutex. If the new layout
//! is inconsistent (cycle, unknown parent, excessive depth) nothing is
//! published.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;

use iris_core::{GroupId, IncludeDeleted, Timestamp};

use crate::group::{Group, GroupError};

/// Maximum depth of the tree, counting roots as depth 1.
pub const MAX_TREE_DEPTH: usize = 32;

/// Errors raised by structural operations on the tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupTreeError {
    /// The parent links form a cycle; reported with one group on it.
    #[error("group tree contains a cycle through {group}")]
    TreeCycleDetected {
        /// A group that lies on the cycle.
        group: GroupId,
    },

    /// The tree is deeper than [`MAX_TREE_DEPTH`].
    #[error("group tree exceeds depth {max} at {group}")]
    DepthExceeded {
        /// The first group found beyond the limit.
        group: GroupId,
        /// The configured limit.
        max: usize,
    },

    /// A group points at a parent that does not exist.
    #[error("{group} references unknown parent {parent}")]
    UnknownParent {
        /// The group with the dangling link.
        group: GroupId,
        /// The missing parent.
        parent: GroupId,
    },

    /// No group with this id.
    #[error("{0} not found")]
    NotFound(GroupId),

    /// A group with this id already exists.
    #[error("{0} already exists")]
    Duplicate(GroupId),

    /// Invalid edit of a single group.
    #[error(transparent)]
    Group(#[from] GroupError),
}

/// Outcome of a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Generation of the snapshot published after the operation.
    pub generation: u64,
    /// Groups whose plate changed, in ascending id order.
    pub updated: Vec<GroupId>,
}

impl RebuildReport {
    /// Whether the rebuild left every plate untouched.
    pub fn is_noop(&self) -> bool {
        self.updated.is_empty()
    }
}

// ─── Snapshot ────────────────────────────────────────────────────────

/// An immutable, internally consistent view of the tree.
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    generation: u64,
    groups: BTreeMap<GroupId, Group>,
    children: BTreeMap<GroupId, Vec<GroupId>>,
}

impl TreeSnapshot {
    /// Monotonic counter, bumped whenever a different tree is published.
    /// Caches keyed on the tree compare against it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of groups, deleted ones included.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the tree has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Look up a group.
    pub fn get(&self, id: GroupId, visibility: IncludeDeleted) -> Option<&Group> {
        self.groups
            .get(&id)
            .filter(|g| visibility.admits(g.is_deleted()))
    }

    /// All groups in ascending id order.
    pub fn groups(&self, visibility: IncludeDeleted) -> impl Iterator<Item = &Group> {
        self.groups
            .values()
            .filter(move |g| visibility.admits(g.is_deleted()))
    }

    /// Whether the group exists and is not soft-deleted.
    pub fn is_enabled(&self, id: GroupId) -> bool {
        self.get(id, IncludeDeleted::No).is_some()
    }

    /// The plate of a group.
    pub fn plate(&self, id: GroupId) -> Option<&str> {
        self.groups.get(&id).map(|g| g.plate.as_str())
    }

    /// Whether `candidate` lies strictly below `ancestor`.
    ///
    /// Irreflexive: a group is not its own descendant. Unknown ids are
    /// never descendants of anything.
    pub fn is_descendant_of(&self, candidate: GroupId, ancestor: GroupId) -> bool {
        if candidate == ancestor {
            return false;
        }
        match (self.plate(candidate), self.plate(ancestor)) {
            (Some(c), Some(a)) => !a.is_empty() && c.len() > a.len() && c.starts_with(a),
            _ => false,
        }
    }

    /// Whether `ancestor` is `candidate` itself or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: GroupId, candidate: GroupId) -> bool {
        (ancestor == candidate && self.groups.contains_key(&candidate))
            || self.is_descendant_of(candidate, ancestor)
    }

    /// Parent of a group.
    pub fn parent(&self, id: GroupId) -> Option<GroupId> {
        self.groups.get(&id).and_then(|g| g.parent)
    }

    /// Ancestors of a group, root first, excluding the group itself.
    pub fn ancestors(&self, id: GroupId) -> Vec<GroupId> {
        let Some(plate) = self.plate(id) else {
            return Vec::new();
        };
        let mut path: Vec<GroupId> = plate
            .split('-')
            .filter(|segment| !segment.is_empty())
            .filter_map(|segment| segment.parse::<u64>().ok())
            .map(GroupId)
            .collect();
        path.pop();
        path
    }

    /// Direct children of a group, ascending id order.
    pub fn children(&self, id: GroupId, visibility: IncludeDeleted) -> Vec<&Group> {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.get(*child, visibility))
            .collect()
    }

    /// All groups strictly below `id`, in pre-order.
    ///
    /// With [`IncludeDeleted::No`] a deleted group is skipped but its
    /// live descendants are still listed.
    pub fn descendants(&self, id: GroupId, visibility: IncludeDeleted) -> Vec<&Group> {
        let mut out = Vec::new();
        let mut stack: Vec<GroupId> = self
            .children
            .get(&id)
            .map(|kids| kids.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if let Some(group) = self.get(next, visibility) {
                out.push(group);
            }
            if let Some(kids) = self.children.get(&next) {
                stack.extend(kids.iter().rev().copied());
            }
        }
        out
    }

    /// The ambit root governing a group: the nearest ancestor-or-self
    /// flagged `is_ambit`, or the tree root when none is.
    pub fn ambit_of(&self, id: GroupId) -> Option<GroupId> {
        let group = self.groups.get(&id)?;
        if group.is_ambit {
            return Some(id);
        }
        let ancestors = self.ancestors(id);
        ancestors
            .iter()
            .rev()
            .copied()
            .find(|a| self.groups.get(a).is_some_and(|g| g.is_ambit))
            .or_else(|| ancestors.first().copied())
            .or(Some(id))
    }

    /// Whether two groups fall under the same ambit root.
    pub fn same_ambit(&self, a: GroupId, b: GroupId) -> bool {
        match (self.ambit_of(a), self.ambit_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Lay out `groups` and stamp their plates.
    fn build(
        mut groups: BTreeMap<GroupId, Group>,
        generation: u64,
    ) -> Result<Self, GroupTreeError> {
        let layout = layout(&groups)?;
        for (id, plate) in layout.plates {
            if let Some(group) = groups.get_mut(&id) {
                group.plate = plate;
            }
        }
        Ok(Self {
            generation,
            groups,
            children: layout.children,
        })
    }
}

// ─── Layout ──────────────────────────────────────────────────────────

struct Layout {
    plates: BTreeMap<GroupId, String>,
    children: BTreeMap<GroupId, Vec<GroupId>>,
}

/// Compute every plate by a pre-order walk from the roots.
///
/// Children are visited in ascending id order, so the output depends only
/// on the shape of the tree.
fn layout(groups: &BTreeMap<GroupId, Group>) -> Result<Layout, GroupTreeError> {
    let mut children: BTreeMap<GroupId, Vec<GroupId>> = BTreeMap::new();
    let mut roots = Vec::new();
    for group in groups.values() {
        match group.parent {
            None => roots.push(group.id),
            Some(parent) if parent == group.id => {
                return Err(GroupError::SelfParent(group.id).into());
            }
            Some(parent) => {
                if !groups.contains_key(&parent) {
                    return Err(GroupTreeError::UnknownParent {
                        group: group.id,
                        parent,
                    });
                }
                children.entry(parent).or_default().push(group.id);
            }
        }
    }

    let mut plates = BTreeMap::new();
    let mut stack: Vec<(GroupId, String, usize)> =
        roots.iter().rev().map(|id| (*id, String::new(), 1)).collect();
    while let Some((id, parent_plate, depth)) = stack.pop() {
        if depth > MAX_TREE_DEPTH {
            return Err(GroupTreeError::DepthExceeded {
                group: id,
                max: MAX_TREE_DEPTH,
            });
        }
        let plate = format!("{parent_plate}{}-", id.get());
        if let Some(kids) = children.get(&id) {
            for kid in kids.iter().rev() {
                stack.push((*kid, plate.clone(), depth + 1));
            }
        }
        plates.insert(id, plate);
    }

    // Every parent exists, so a group unreachable from the roots hangs off a cycle.
    if let Some(stranded) = groups.keys().find(|id| !plates.contains_key(id)) {
        return Err(GroupTreeError::TreeCycleDetected {
            group: cycle_member(groups, *stranded),
        });
    }

    Ok(Layout { plates, children })
}

/// Follow parent links from `start` until a group repeats.
fn cycle_member(groups: &BTreeMap<GroupId, Group>, start: GroupId) -> GroupId {
    let mut seen = BTreeSet::new();
    let mut current = start;
    while seen.insert(current) {
        match groups.get(&current).and_then(|g| g.parent) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

// ─── The Tree ────────────────────────────────────────────────────────

/// Process-wide, read-mostly group tree.
#[derive(Debug, Default)]
pub struct GroupTree {
    current: RwLock<Arc<TreeSnapshot>>,
    writer: Mutex<()>,
}

impl GroupTree {
    /// Build a tree, computing every plate.
    pub fn new(groups: impl IntoIterator<Item = Group>) -> Result<Self, GroupTreeError> {
        Self::load(groups).map(|(tree, _)| tree)
    }

    /// Build a tree and report which of the supplied plates were stale.
    pub fn load(
        groups: impl IntoIterator<Item = Group>,
    ) -> Result<(Self, RebuildReport), GroupTreeError> {
        let mut by_id = BTreeMap::new();
        for group in groups {
            let id = group.id;
            if by_id.insert(id, group).is_some() {
                return Err(GroupTreeError::Duplicate(id));
            }
        }
        let supplied: BTreeMap<GroupId, String> =
            by_id.iter().map(|(id, g)| (*id, g.plate.clone())).collect();
        let snapshot = TreeSnapshot::build(by_id, 1)?;
        let report = RebuildReport {
            generation: snapshot.generation,
            updated: changed_plates(&supplied, &snapshot),
        };
        tracing::info!(
            groups = snapshot.len(),
            stale_plates = report.updated.len(),
            "group tree loaded"
        );
        Ok((
            Self {
                current: RwLock::new(Arc::new(snapshot)),
                writer: Mutex::new(()),
            },
            report,
        ))
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<TreeSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Recompute every plate from the roots down.
    ///
    /// On a consistent tree this is a fixed point: nothing changes and the
    /// generation is not bumped.
    pub fn rebuild(&self) -> Result<RebuildReport, GroupTreeError> {
        let _guard = self.writer.lock();
        let current = self.snapshot();
        self.publish(current.groups.clone(), &current)
    }

    /// Insert a new group.
    pub fn add_group(&self, group: Group) -> Result<RebuildReport, GroupTreeError> {
        let _guard = self.writer.lock();
        let current = self.snapshot();
        if current.groups.contains_key(&group.id) {
            return Err(GroupTreeError::Duplicate(group.id));
        }
        let mut groups = current.groups.clone();
        groups.insert(group.id, group);
        self.publish(groups, &current)
    }

    /// Move a group under a new parent (or make it a root).
    pub fn reparent(
        &self,
        id: GroupId,
        parent: Option<GroupId>,
    ) -> Result<RebuildReport, GroupTreeError> {
        self.edit(id, |group| group.set_parent(parent).map_err(GroupTreeError::from))
    }

    /// Set or clear the ambit flag of a group.
    pub fn set_ambit(&self, id: GroupId, is_ambit: bool) -> Result<RebuildReport, GroupTreeError> {
        self.edit(id, |group| {
            group.is_ambit = is_ambit;
            Ok(())
        })
    }

    /// Soft-delete a group. It stays in the tree; its descendants keep
    /// their plates.
    pub fn soft_delete(&self, id: GroupId, at: Timestamp) -> Result<RebuildReport, GroupTreeError> {
        self.edit(id, |group| {
            if group.deleted_at.is_none() {
                group.deleted_at = Some(at);
            }
            Ok(())
        })
    }

    fn edit(
        &self,
        id: GroupId,
        apply: impl FnOnce(&mut Group) -> Result<(), GroupTreeError>,
    ) -> Result<RebuildReport, GroupTreeError> {
        let _guard = self.writer.lock();
        let current = self.snapshot();
        let mut groups = current.groups.clone();
        let group = groups.get_mut(&id).ok_or(GroupTreeError::NotFound(id))?;
        apply(group)?;
        self.publish(groups, &current)
    }

    /// Lay out `groups` and swap the result in. Caller holds the writer lock.
    fn publish(
        &self,
        groups: BTreeMap<GroupId, Group>,
        previous: &TreeSnapshot,
    ) -> Result<RebuildReport, GroupTreeError> {
        let candidate = match TreeSnapshot::build(groups, previous.generation + 1) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "group tree rebuild aborted; keeping previous snapshot"
                );
                return Err(err);
            }
        };

        let previous_plates: BTreeMap<GroupId, String> = previous
            .groups
            .iter()
            .map(|(id, g)| (*id, g.plate.clone()))
            .collect();
        let updated = changed_plates(&previous_plates, &candidate);

        if candidate.groups == previous.groups {
            tracing::debug!(generation = previous.generation, "group tree unchanged");
            return Ok(RebuildReport {
                generation: previous.generation,
                updated,
            });
        }

        let report = RebuildReport {
            generation: candidate.generation,
            updated,
        };
        *self.current.write() = Arc::new(candidate);
        metrics::counter!("iris_tree_rebuilds_total").increment(1);
        tracing::info!(
            generation = report.generation,
            updated = report.updated.len(),
            "group tree rebuilt"
        );
        Ok(report)
    }
}

fn changed_plates(before: &BTreeMap<GroupId, String>, after: &TreeSnapshot) -> Vec<GroupId> {
    after
        .groups
        .values()
        .filter(|g| before.get(&g.id) != Some(&g.plate))
        .map(|g| g.id)
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn g(id: u64, parent: Option<u64>) -> Group {
        let mut group = Group::root(GroupId(id), format!("group {id}"));
        group.parent = parent.map(GroupId);
        group
    }

    /// 1 ─┬─ 4 ── 9
    ///    └─ 7
    /// 2 ── 45
    fn sample_tree() -> GroupTree {
        GroupTree::new(vec![
            g(1, None),
            g(4, Some(1)),
            g(9, Some(4)),
            g(7, Some(1)),
            g(2, None),
            g(45, Some(2)),
        ])
        .unwrap()
    }

    #[test]
    fn plates_follow_parent_chain() {
        let snap = sample_tree().snapshot();
        assert_eq!(snap.plate(GroupId(1)), Some("1-"));
        assert_eq!(snap.plate(GroupId(4)), Some("1-4-"));
        assert_eq!(snap.plate(GroupId(9)), Some("1-4-9-"));
        assert_eq!(snap.plate(GroupId(7)), Some("1-7-"));
        assert_eq!(snap.plate(GroupId(45)), Some("2-45-"));
    }

    #[test]
    fn descendant_checks() {
        let snap = sample_tree().snapshot();
        assert!(snap.is_descendant_of(GroupId(9), GroupId(1)));
        assert!(snap.is_descendant_of(GroupId(9), GroupId(4)));
        assert!(!snap.is_descendant_of(GroupId(4), GroupId(9)));
        assert!(!snap.is_descendant_of(GroupId(7), GroupId(4)));
        // "2-45-" does not start with "4-" and "1-4-" is not a prefix of it.
        assert!(!snap.is_descendant_of(GroupId(45), GroupId(4)));
        assert!(!snap.is_descendant_of(GroupId(99), GroupId(1)));
    }

    #[test]
    fn descendant_is_irreflexive() {
        let snap = sample_tree().snapshot();
        for group in snap.groups(IncludeDeleted::Yes) {
            assert!(!snap.is_descendant_of(group.id, group.id));
            assert!(snap.is_ancestor_or_self(group.id, group.id));
        }
    }

    #[test]
    fn ancestors_and_descendants() {
        let snap = sample_tree().snapshot();
        assert_eq!(snap.ancestors(GroupId(9)), vec![GroupId(1), GroupId(4)]);
        assert!(snap.ancestors(GroupId(1)).is_empty());
        let below: Vec<_> = snap
            .descendants(GroupId(1), IncludeDeleted::Yes)
            .iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(below, vec![GroupId(4), GroupId(9), GroupId(7)]);
    }

    #[test]
    fn rebuild_on_consistent_tree_is_fixed_point() {
        let tree = sample_tree();
        let before = tree.snapshot();
        let report = tree.rebuild().unwrap();
        assert!(report.is_noop());
        assert_eq!(report.generation, before.generation());
        let after = tree.snapshot();
        for group in before.groups(IncludeDeleted::Yes) {
            assert_eq!(after.plate(group.id), Some(group.plate.as_str()));
        }
    }

    #[test]
    fn load_reports_stale_plates() {
        let mut stale = g(4, Some(1));
        stale.plate = "3-4-".to_string();
        let mut fresh = g(1, None);
        fresh.plate = "1-".to_string();
        let (tree, report) = GroupTree::load(vec![fresh, stale]).unwrap();
        assert_eq!(report.updated, vec![GroupId(4)]);
        assert_eq!(tree.snapshot().plate(GroupId(4)), Some("1-4-"));
    }

    #[test]
    fn reparent_recomputes_subtree() {
        let tree = sample_tree();
        let report = tree.reparent(GroupId(4), Some(GroupId(2))).unwrap();
        assert_eq!(report.updated, vec![GroupId(4), GroupId(9)]);
        let snap = tree.snapshot();
        assert_eq!(snap.plate(GroupId(9)), Some("2-4-9-"));
        assert!(snap.is_descendant_of(GroupId(9), GroupId(2)));
        assert!(!snap.is_descendant_of(GroupId(9), GroupId(1)));
    }

    #[test]
    fn cycle_is_detected_and_previous_snapshot_kept() {
        let tree = sample_tree();
        let before = tree.snapshot();
        let err = tree.reparent(GroupId(4), Some(GroupId(9))).unwrap_err();
        match err {
            GroupTreeError::TreeCycleDetected { group } => {
                assert!(group == GroupId(4) || group == GroupId(9));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        let after = tree.snapshot();
        assert_eq!(after.generation(), before.generation());
        assert_eq!(after.parent(GroupId(4)), Some(GroupId(1)));
        assert_eq!(after.plate(GroupId(9)), Some("1-4-9-"));
    }

    #[test]
    fn cycle_without_roots_is_detected_at_load() {
        let err = GroupTree::new(vec![g(1, Some(2)), g(2, Some(1))]).unwrap_err();
        assert!(matches!(err, GroupTreeError::TreeCycleDetected { .. }));
    }

    #[test]
    fn unknown_parent_and_duplicates_rejected() {
        assert_eq!(
            GroupTree::new(vec![g(1, None), g(3, Some(8))]).unwrap_err(),
            GroupTreeError::UnknownParent {
                group: GroupId(3),
                parent: GroupId(8)
            }
        );
        assert_eq!(
            GroupTree::new(vec![g(1, None), g(1, None)]).unwrap_err(),
            GroupTreeError::Duplicate(GroupId(1))
        );
        let tree = sample_tree();
        assert_eq!(
            tree.add_group(g(4, Some(1))).unwrap_err(),
            GroupTreeError::Duplicate(GroupId(4))
        );
    }

    #[test]
    fn depth_guard() {
        let mut chain = vec![g(1, None)];
        for id in 2..=(MAX_TREE_DEPTH as u64 + 1) {
            chain.push(g(id, Some(id - 1)));
        }
        assert!(matches!(
            GroupTree::new(chain).unwrap_err(),
            GroupTreeError::DepthExceeded { .. }
        ));
    }

    #[test]
    fn soft_delete_keeps_structure() {
        let tree = sample_tree();
        let at = Timestamp::parse("2026-05-01T00:00:00Z").unwrap();
        let report = tree.soft_delete(GroupId(4), at).unwrap();
        assert!(report.is_noop());
        let snap = tree.snapshot();
        assert!(snap.get(GroupId(4), IncludeDeleted::No).is_none());
        assert!(snap.get(GroupId(4), IncludeDeleted::Yes).is_some());
        assert!(!snap.is_enabled(GroupId(4)));
        assert!(snap.is_descendant_of(GroupId(9), GroupId(4)));
        let live: Vec<_> = snap
            .descendants(GroupId(1), IncludeDeleted::No)
            .iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(live, vec![GroupId(9), GroupId(7)]);
        assert!(snap.generation() > 1);
    }

    #[test]
    fn ambit_resolution() {
        let tree = GroupTree::new(vec![
            g(1, None),
            g(4, Some(1)).with_ambit(),
            g(9, Some(4)),
            g(7, Some(1)),
        ])
        .unwrap();
        let snap = tree.snapshot();
        assert_eq!(snap.ambit_of(GroupId(9)), Some(GroupId(4)));
        assert_eq!(snap.ambit_of(GroupId(4)), Some(GroupId(4)));
        assert_eq!(snap.ambit_of(GroupId(7)), Some(GroupId(1)));
        assert_eq!(snap.ambit_of(GroupId(1)), Some(GroupId(1)));
        assert!(snap.same_ambit(GroupId(4), GroupId(9)));
        assert!(!snap.same_ambit(GroupId(9), GroupId(7)));
        assert_eq!(snap.ambit_of(GroupId(99)), None);

        tree.set_ambit(GroupId(4), false).unwrap();
        assert!(tree.snapshot().same_ambit(GroupId(9), GroupId(7)));
    }

    #[test]
    fn readers_keep_their_snapshot_across_rebuilds() {
        let tree = sample_tree();
        let held = tree.snapshot();
        tree.reparent(GroupId(7), Some(GroupId(2))).unwrap();
        assert_eq!(held.plate(GroupId(7)), Some("1-7-"));
        assert_eq!(tree.snapshot().plate(GroupId(7)), Some("2-7-"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Random forests: node `i` either is a root or hangs off an earlier node.
    fn forest() -> impl Strategy<Value = Vec<Group>> {
        prop::collection::vec(prop::option::weighted(0.8, any::<prop::sample::Index>()), 1..40)
            .prop_map(|links| {
                links
                    .into_iter()
                    .enumerate()
                    .map(|(i, link)| {
                        let id = i as u64 + 1;
                        let mut group = Group::root(GroupId(id), format!("g{id}"));
                        if i > 0 {
                            group.parent = link.map(|ix| GroupId(ix.index(i) as u64 + 1));
                        }
                        group
                    })
                    .collect()
            })
    }

    proptest! {
        /// A second rebuild never changes a plate.
        #[test]
        fn rebuild_is_fixed_point(groups in forest()) {
            let depth_ok = GroupTree::new(groups.clone());
            prop_assume!(depth_ok.is_ok());
            let tree = depth_ok.unwrap();
            let report = tree.rebuild().unwrap();
            prop_assert!(report.is_noop());
        }

        /// Descendant-of agrees with walking the parent links.
        #[test]
        fn descendant_matches_parent_walk(groups in forest()) {
            let built = GroupTree::new(groups.clone());
            prop_assume!(built.is_ok());
            let snap = built.unwrap().snapshot();
            for a in &groups {
                for c in &groups {
                    let mut walk = snap.parent(c.id);
                    let mut found = false;
                    while let Some(p) = walk {
                        if p == a.id {
                            found = true;
                            break;
                        }
                        walk = snap.parent(p);
                    }
                    prop_assert_eq!(snap.is_descendant_of(c.id, a.id), found);
                }
            }
        }

        /// Ancestry is transitive.
        #[test]
        fn descendant_is_transitive(groups in forest()) {
            let built = GroupTree::new(groups.clone());
            prop_assume!(built.is_ok());
            let snap = built.unwrap().snapshot();
            for c in &groups {
                let ancestors = snap.ancestors(c.id);
                for (i, upper) in ancestors.iter().enumerate() {
                    prop_assert!(snap.is_descendant_of(c.id, *upper));
                    for lower in &ancestors[i + 1..] {
                        prop_assert!(snap.is_descendant_of(*lower, *upper));
                    }
                }
            }
        }
    }
}
