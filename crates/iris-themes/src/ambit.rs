//! # Ambit Resolution
//!
//! Decides whether a group may act on a record card without cross-ambit
//! restrictions.
//!
//! ## Rules, in order
//!
//! 1. A record whose theme is unset or soft-deleted belongs only to the
//!    group that created it.
//! 2. An ambit root, or any ancestor-or-self of the responsible group, is
//!    always within ambit.
//! 3. Otherwise the group is within ambit when some derivation of the
//!    theme for the record's state (direct, or district-scoped for the
//!    record's district) targets a group under the same ambit root.
//!
//! The set of ambit roots a theme reaches is cached per theme and
//! invalidated when either the tree generation or the catalog revision
//! moves.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;

use iris_core::{DistrictId, GroupId, IncludeDeleted, RecordState, ThemeId};
use iris_groups::{GroupTree, TreeSnapshot};

use crate::catalog::ThemeCatalog;

/// What the resolver needs to know about a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbitQuery {
    pub theme: Option<ThemeId>,
    pub state: RecordState,
    pub district: Option<DistrictId>,
    pub responsible: GroupId,
    pub creation_group: GroupId,
}

#[derive(Debug, Clone)]
struct CachedAmbits {
    generation: u64,
    revision: u64,
    roots: BTreeSet<GroupId>,
}

/// Ambit decisions over a shared tree and theme catalog.
#[derive(Debug)]
pub struct AmbitResolver {
    tree: Arc<GroupTree>,
    themes: Arc<ThemeCatalog>,
    cache: DashMap<ThemeId, CachedAmbits>,
}

impl AmbitResolver {
    pub fn new(tree: Arc<GroupTree>, themes: Arc<ThemeCatalog>) -> Self {
        Self {
            tree,
            themes,
            cache: DashMap::new(),
        }
    }

    pub fn tree(&self) -> &Arc<GroupTree> {
        &self.tree
    }

    pub fn themes(&self) -> &Arc<ThemeCatalog> {
        &self.themes
    }

    /// Whether `group` is within the ambit of the record described by `query`.
    pub fn is_within_ambit(&self, query: &AmbitQuery, group: GroupId) -> bool {
        let snapshot = self.tree.snapshot();
        self.is_within_ambit_in(&snapshot, query, group)
    }

    /// [`is_within_ambit`](Self::is_within_ambit) against a snapshot the
    /// caller already holds.
    pub fn is_within_ambit_in(
        &self,
        snapshot: &TreeSnapshot,
        query: &AmbitQuery,
        group: GroupId,
    ) -> bool {
        let Some(theme) = query
            .theme
            .and_then(|id| self.themes.get(id, IncludeDeleted::No))
        else {
            return group == query.creation_group;
        };

        let is_ambit_root = snapshot
            .get(group, IncludeDeleted::Yes)
            .is_some_and(|g| g.is_ambit);
        if is_ambit_root || snapshot.is_ancestor_or_self(group, query.responsible) {
            return true;
        }

        let within = theme
            .derivation_groups(query.state, query.district)
            .any(|target| snapshot.same_ambit(group, target));
        tracing::debug!(
            %group,
            theme = %theme.id,
            state = %query.state,
            within,
            "ambit checked against derivations"
        );
        within
    }

    /// Ambit roots reached by any derivation of `theme`.
    ///
    /// Empty for unknown or deleted themes.
    pub fn theme_ambit_groups(&self, theme: ThemeId) -> BTreeSet<GroupId> {
        let snapshot = self.tree.snapshot();
        let revision = self.themes.revision();
        if let Some(cached) = self.cache.get(&theme) {
            if cached.generation == snapshot.generation() && cached.revision == revision {
                return cached.roots.clone();
            }
        }

        let roots: BTreeSet<GroupId> = self
            .themes
            .get(theme, IncludeDeleted::No)
            .map(|detail| {
                detail
                    .all_targets()
                    .filter_map(|target| snapshot.ambit_of(target))
                    .collect()
            })
            .unwrap_or_default();
        self.cache.insert(
            theme,
            CachedAmbits {
                generation: snapshot.generation(),
                revision,
                roots: roots.clone(),
            },
        );
        roots
    }

    /// Whether `theme` is derived to somewhere under `group`'s ambit root.
    pub fn theme_in_group_ambit(&self, theme: ThemeId, group: GroupId) -> bool {
        let Some(root) = self.tree.snapshot().ambit_of(group) else {
            return false;
        };
        self.theme_ambit_groups(theme).contains(&root)
    }

    /// The enabled group a record of `theme` in `state` derives to.
    pub fn derivation_target(
        &self,
        theme: ThemeId,
        state: RecordState,
        district: Option<DistrictId>,
    ) -> Option<GroupId> {
        let target = self
            .themes
            .get(theme, IncludeDeleted::No)?
            .derivation_target(state, district)?;
        if self.tree.snapshot().is_enabled(target) {
            Some(target)
        } else {
            tracing::warn!(
                %theme,
                %target,
                state = %state,
                "derivation target is disabled; ignoring"
            );
            None
        }
    }
}
