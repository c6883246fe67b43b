//! # Reassignment Policy
//!
//! Gates moving a record's responsibility to a group outside its current
//! ambit.
//!
//! [`only_ambit_themes`] decides, in this order:
//!
//! 1. A validated record that is still open is restricted to its ambit.
//! 2. A group holding the coordinator validation permission may move it
//!    out of ambit until `DIES_CANVI_TEMATICA_FORA_AREA_COORD` days
//!    (default 10) have passed since it entered the current ambit.
//! 3. Any other group until `DIES_CANVI_TEMATICA_FORA_AREA` days
//!    (default 8).
//! 4. Past the applicable threshold the record is restricted.
//!
//! The decision is a pure function of [`ReassignmentInputs`] and
//! [`ReassignmentThresholds`]; [`ReassignmentPolicy`] materializes the
//! inputs from the tree, the permission provider and the reasignation log.

use std::sync::Arc;

use serde::Serialize;

use iris_core::{keys, GroupId, IncludeDeleted, ParameterStore, Timestamp};
use iris_groups::{codes, PermissionProvider, TreeSnapshot};
use iris_themes::AmbitResolver;

use crate::error::EngineError;
use crate::history::{Reasignation, ReasignationReason};
use crate::record::RecordCard;

/// Day thresholds for out-of-ambit moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReassignmentThresholds {
    pub coordinator_days: i64,
    pub default_days: i64,
}

impl Default for ReassignmentThresholds {
    fn default() -> Self {
        Self {
            coordinator_days: keys::DEFAULT_DIES_CANVI_TEMATICA_FORA_AREA_COORD,
            default_days: keys::DEFAULT_DIES_CANVI_TEMATICA_FORA_AREA,
        }
    }
}

impl ReassignmentThresholds {
    pub fn from_parameters(params: &dyn ParameterStore) -> Self {
        Self {
            coordinator_days: params.days_or_default(
                keys::DIES_CANVI_TEMATICA_FORA_AREA_COORD,
                keys::DEFAULT_DIES_CANVI_TEMATICA_FORA_AREA_COORD,
            ),
            default_days: params.days_or_default(
                keys::DIES_CANVI_TEMATICA_FORA_AREA,
                keys::DEFAULT_DIES_CANVI_TEMATICA_FORA_AREA,
            ),
        }
    }
}

/// Materialized facts the decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReassignmentInputs {
    pub validated: bool,
    pub closed: bool,
    /// The acting group holds the coordinator validation permission.
    pub coordinator: bool,
    /// Whole days since the record entered its current ambit.
    pub days_in_ambit: i64,
}

/// Whether the record may only move within its current ambit.
pub fn only_ambit_themes(inputs: &ReassignmentInputs, thresholds: &ReassignmentThresholds) -> bool {
    if inputs.validated && !inputs.closed {
        return true;
    }
    let threshold = if inputs.coordinator {
        thresholds.coordinator_days
    } else {
        thresholds.default_days
    };
    inputs.days_in_ambit > threshold
}

/// Whole days since `record` entered the ambit of its responsible group.
///
/// The entry point is the latest non-derivation reasignation that came
/// from a group under a different ambit root; without one, the record's
/// creation.
pub fn days_in_ambit(
    record: &RecordCard,
    reasignations: &[Reasignation],
    snapshot: &TreeSnapshot,
    now: Timestamp,
) -> i64 {
    let current = snapshot.ambit_of(record.responsible_group);
    let entered = reasignations
        .iter()
        .rev()
        .filter(|r| !r.reason.is_derivation())
        .find(|r| snapshot.ambit_of(r.previous_group) != current)
        .map_or(record.created_at, |r| r.created_at);
    now.whole_days_since(&entered).max(0)
}

/// Reassignment checks against live collaborators.
pub struct ReassignmentPolicy {
    resolver: Arc<AmbitResolver>,
    permissions: Arc<dyn PermissionProvider>,
    thresholds: ReassignmentThresholds,
}

impl ReassignmentPolicy {
    pub fn new(
        resolver: Arc<AmbitResolver>,
        permissions: Arc<dyn PermissionProvider>,
        thresholds: ReassignmentThresholds,
    ) -> Self {
        Self {
            resolver,
            permissions,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> ReassignmentThresholds {
        self.thresholds
    }

    pub fn inputs(
        &self,
        snapshot: &TreeSnapshot,
        record: &RecordCard,
        reasignations: &[Reasignation],
        actor: GroupId,
        now: Timestamp,
    ) -> ReassignmentInputs {
        ReassignmentInputs {
            validated: record.validated,
            closed: record.is_closed(),
            coordinator: self
                .permissions
                .has_permission(actor, codes::RECARD_COORDINATOR_VALIDATION),
            days_in_ambit: days_in_ambit(record, reasignations, snapshot, now),
        }
    }

    /// Whether `target` counts as inside the record's current ambit.
    fn target_in_ambit(
        &self,
        snapshot: &TreeSnapshot,
        record: &RecordCard,
        target: GroupId,
    ) -> bool {
        snapshot.same_ambit(target, record.responsible_group)
            || record
                .theme
                .is_some_and(|theme| self.resolver.theme_in_group_ambit(theme, target))
    }

    /// Validate moving `record` to `target` on behalf of `actor`.
    ///
    /// Returns the reason to log: [`ReasignationReason::Reasignation`]
    /// inside the ambit, [`ReasignationReason::OutOfAmbit`] outside it.
    pub fn check_reassignment(
        &self,
        snapshot: &TreeSnapshot,
        record: &RecordCard,
        reasignations: &[Reasignation],
        actor: GroupId,
        target: GroupId,
        now: Timestamp,
    ) -> Result<ReasignationReason, EngineError> {
        if record.is_closed() {
            return Err(EngineError::not_eligible(target, "closed records cannot be reassigned"));
        }
        if !snapshot.is_enabled(target) {
            return Err(EngineError::not_eligible(target, "target group is disabled or unknown"));
        }
        if target == record.responsible_group {
            return Err(EngineError::not_eligible(target, "already responsible"));
        }
        if !self
            .resolver
            .is_within_ambit_in(snapshot, &record.ambit_query(), actor)
        {
            return Err(EngineError::not_eligible(actor, "outside the record's ambit"));
        }

        if self.target_in_ambit(snapshot, record, target) {
            return Ok(ReasignationReason::Reasignation);
        }
        let inputs = self.inputs(snapshot, record, reasignations, actor, now);
        if only_ambit_themes(&inputs, &self.thresholds) {
            tracing::debug!(record = %record.id, %target, ?inputs, "out-of-ambit move refused");
            return Err(EngineError::not_eligible(target, "record is restricted to its ambit"));
        }
        Ok(ReasignationReason::OutOfAmbit)
    }

    /// Every enabled group `actor` may move `record` to.
    pub fn reassignment_options(
        &self,
        snapshot: &TreeSnapshot,
        record: &RecordCard,
        reasignations: &[Reasignation],
        actor: GroupId,
        now: Timestamp,
    ) -> Vec<GroupId> {
        snapshot
            .groups(IncludeDeleted::No)
            .map(|g| g.id)
            .filter(|target| {
                self.check_reassignment(snapshot, record, reasignations, actor, *target, now)
                    .is_ok()
            })
            .collect()
    }
}

impl std::fmt::Debug for ReassignmentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReassignmentPolicy")
            .field("thresholds", &self.thresholds)
            .finish()
    }
}
