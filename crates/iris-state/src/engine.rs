//! # State Machine
//!
//! The entry point for every change to a record card.
//!
//! ## A Transition, Step by Step
//!
//! Inside the record's store lock, stamped with the time read under that
//! lock so history rows of one record never go back in time:
//!
//! 1. Reject a stale `expected_version` (`ConcurrentModification`).
//! 2. Reject a pair outside the allow-table (`InvalidTransition`).
//! 3. Work out the new responsible group: an explicit `reassign_to` is
//!    checked by the [`ReassignmentPolicy`]; otherwise the theme's
//!    derivation for the target state applies, if it names a different
//!    enabled group and the target state is open.
//! 4. Apply side effects: validation when leaving `PendingValidate`,
//!    response deadline on entering `PendingReply` (cleared on leaving),
//!    closing date on entering a closed state.
//! 5. Append the history row, and the reasignation row if any, as one
//!    audit batch. A failed append aborts the whole transition.
//!
//! After the lock is released the events are published and metrics
//! counted.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use iris_core::{
    Clock, GroupId, IncludeDeleted, ParameterStore, Parameters, RecordCardId, RecordState,
    SystemClock, ThemeId, Timestamp, UserId,
};
use iris_groups::{GroupTree, PermissionProvider, StaticPermissions, TreeSnapshot};
use iris_themes::{AmbitResolver, AnsDelay, ThemeCatalog};

use crate::deadline::{AnsDeadline, DeadlineCalculator};
use crate::error::EngineError;
use crate::events::{AlarmKind, EngineEvent, EventBus, NotificationDispatcher};
use crate::history::{
    AuditBatch, AuditError, AuditSink, InMemoryAuditLog, Reasignation, ReasignationReason,
    StateChange, StateHistoryEntry,
};
use crate::reassignment::{ReassignmentPolicy, ReassignmentThresholds};
use crate::record::{AlarmFlags, NewRecordCard, PendingMessage, RecordCard};
use crate::reference::generate_next_reference;
use crate::store::RecordCardStore;
use crate::sweep::{count_alarms, raise_alarms};
use crate::transitions::is_valid_transition;

// ─── Requests and Outcomes ───────────────────────────────────────────

/// A request to move a record to another state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub record: RecordCardId,
    pub target: RecordState,
    pub actor_group: GroupId,
    pub actor_user: UserId,
    /// Reject the request if the record is no longer at this version.
    pub expected_version: Option<u64>,
    /// Hand the record to this group as part of the transition.
    pub reassign_to: Option<GroupId>,
    /// Made by the system rather than a person.
    pub automatic: bool,
}

impl TransitionRequest {
    pub fn new(
        record: RecordCardId,
        target: RecordState,
        actor_group: GroupId,
        actor_user: UserId,
    ) -> Self {
        Self {
            record,
            target,
            actor_group,
            actor_user,
            expected_version: None,
            reassign_to: None,
            automatic: false,
        }
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn reassigning_to(mut self, group: GroupId) -> Self {
        self.reassign_to = Some(group);
        self
    }

    pub fn automatic(mut self) -> Self {
        self.automatic = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub record: RecordCard,
    pub history: StateHistoryEntry,
    pub reasignation: Option<Reasignation>,
}

/// A request to hand a record to another group without changing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassignRequest {
    pub record: RecordCardId,
    pub target: GroupId,
    pub actor_group: GroupId,
    pub actor_user: UserId,
    pub expected_version: Option<u64>,
}

/// Deadline fields and alarm flags of a record at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeadlineState {
    pub ans_limit_date: Option<Timestamp>,
    pub ans_limit_nearexpire: Option<Timestamp>,
    pub response_limit_date: Option<Timestamp>,
    pub alarms: AlarmFlags,
}

impl DeadlineState {
    fn of(record: &RecordCard) -> Self {
        Self {
            ans_limit_date: record.ans_limit_date,
            ans_limit_nearexpire: record.ans_limit_nearexpire,
            response_limit_date: record.response_limit_date,
            alarms: record.alarms,
        }
    }
}

/// Result of [`StateMachine::recompute_deadlines`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlineUpdate {
    pub record: RecordCardId,
    pub before: DeadlineState,
    pub after: DeadlineState,
    pub raised: Vec<AlarmKind>,
}

impl DeadlineUpdate {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

// ─── Builder ─────────────────────────────────────────────────────────

/// Assembles a [`StateMachine`] from its collaborators.
///
/// Only the group tree and theme catalog are required; every other
/// collaborator has an in-memory default.
pub struct StateMachineBuilder {
    tree: Arc<GroupTree>,
    themes: Arc<ThemeCatalog>,
    permissions: Arc<dyn PermissionProvider>,
    parameters: Arc<dyn ParameterStore>,
    audit: Arc<dyn AuditSink>,
    store: Arc<RecordCardStore>,
    clock: Arc<dyn Clock>,
    dispatchers: Vec<Arc<dyn NotificationDispatcher>>,
}

impl StateMachineBuilder {
    pub fn permissions(mut self, permissions: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn parameters(mut self, parameters: Arc<dyn ParameterStore>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(mut self, store: Arc<RecordCardStore>) -> Self {
        self.store = store;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    pub fn build(self) -> StateMachine {
        let resolver = Arc::new(AmbitResolver::new(self.tree.clone(), self.themes.clone()));
        let thresholds = ReassignmentThresholds::from_parameters(self.parameters.as_ref());
        let deadlines = DeadlineCalculator::from_parameters(self.parameters.as_ref());
        let events = Arc::new(EventBus::new());
        for dispatcher in self.dispatchers {
            events.subscribe(dispatcher);
        }
        StateMachine {
            policy: ReassignmentPolicy::new(resolver.clone(), self.permissions, thresholds),
            store: self.store,
            tree: self.tree,
            themes: self.themes,
            resolver,
            deadlines,
            audit: self.audit,
            events,
            clock: self.clock,
            claims: Mutex::new(()),
        }
    }
}

// ─── The Machine ─────────────────────────────────────────────────────

pub struct StateMachine {
    store: Arc<RecordCardStore>,
    tree: Arc<GroupTree>,
    themes: Arc<ThemeCatalog>,
    resolver: Arc<AmbitResolver>,
    policy: ReassignmentPolicy,
    deadlines: DeadlineCalculator,
    audit: Arc<dyn AuditSink>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    /// Held while a claim is created and linked to its original.
    claims: Mutex<()>,
}

impl StateMachine {
    pub fn builder(tree: Arc<GroupTree>, themes: Arc<ThemeCatalog>) -> StateMachineBuilder {
        StateMachineBuilder {
            tree,
            themes,
            permissions: Arc::new(StaticPermissions::new()),
            parameters: Arc::new(Parameters::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            store: Arc::new(RecordCardStore::new()),
            clock: Arc::new(SystemClock),
            dispatchers: Vec::new(),
        }
    }

    pub fn store(&self) -> &Arc<RecordCardStore> {
        &self.store
    }

    pub fn tree(&self) -> &Arc<GroupTree> {
        &self.tree
    }

    pub fn themes(&self) -> &Arc<ThemeCatalog> {
        &self.themes
    }

    pub fn resolver(&self) -> &Arc<AmbitResolver> {
        &self.resolver
    }

    pub fn policy(&self) -> &ReassignmentPolicy {
        &self.policy
    }

    pub fn deadlines(&self) -> DeadlineCalculator {
        self.deadlines
    }

    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn get(&self, id: RecordCardId) -> Result<RecordCard, EngineError> {
        self.store.get(id).ok_or(EngineError::NotFound(id))
    }

    pub fn state_history(&self, id: RecordCardId) -> Vec<StateHistoryEntry> {
        self.audit.state_history(id)
    }

    pub fn reasignations(&self, id: RecordCardId) -> Vec<Reasignation> {
        self.audit.reasignations(id)
    }

    fn theme_delay(&self, record_theme: Option<ThemeId>) -> Option<AnsDelay> {
        record_theme
            .and_then(|theme| self.themes.get(theme, IncludeDeleted::No))
            .and_then(|theme| theme.ans_delay)
    }

    fn ans_for(
        &self,
        theme: Option<ThemeId>,
        start: Timestamp,
    ) -> Result<Option<AnsDeadline>, EngineError> {
        self.theme_delay(theme)
            .map(|delay| self.deadlines.ans_deadline(start, &delay))
            .transpose()
    }

    /// Create a record in `PendingValidate`.
    ///
    /// Without an explicit responsible group the theme's derivation for
    /// `PendingValidate` decides, falling back to the creation group.
    pub fn register(&self, new: NewRecordCard) -> Result<RecordCard, EngineError> {
        let now = self.clock.now();
        let snapshot = self.tree.snapshot();
        if !snapshot.is_enabled(new.creation_group) {
            return Err(EngineError::not_eligible(
                new.creation_group,
                "creation group is disabled or unknown",
            ));
        }
        let responsible = new
            .responsible_group
            .or_else(|| {
                new.theme.and_then(|theme| {
                    self.resolver
                        .derivation_target(theme, RecordState::PendingValidate, new.district)
                })
            })
            .unwrap_or(new.creation_group);
        if !snapshot.is_enabled(responsible) {
            return Err(EngineError::not_eligible(
                responsible,
                "responsible group is disabled or unknown",
            ));
        }

        let ans = self.ans_for(new.theme, now)?;
        let record = RecordCard {
            id: self.store.allocate_id(),
            normalized_record_id: new.normalized_record_id,
            state: RecordState::PendingValidate,
            theme: new.theme,
            district: new.district,
            responsible_group: responsible,
            creation_group: new.creation_group,
            validated: false,
            validated_at: None,
            created_at: now,
            updated_at: now,
            ans_limit_date: ans.map(|d| d.limit),
            ans_limit_nearexpire: ans.map(|d| d.near_expire),
            response_limit_date: None,
            closing_date: None,
            alarms: AlarmFlags::default(),
            claimed_from: None,
            claimed_by: None,
            claims_number: 1,
            messages: Vec::new(),
            version: 0,
        };
        self.store.insert(record.clone());
        tracing::info!(
            record = %record.id,
            reference = %record.normalized_record_id,
            responsible = %record.responsible_group,
            "record registered"
        );
        Ok(record)
    }

    /// Move a record to another state.
    pub fn transition(&self, request: TransitionRequest) -> Result<TransitionOutcome, EngineError> {
        let snapshot = self.tree.snapshot();
        let result = self
            .store
            .try_update(request.record, request.expected_version, |record| {
                self.apply_transition(&snapshot, record, &request, self.clock.now())
            });

        let (record, (history, reasignation)) = match result {
            Ok(done) => done,
            Err(err) => {
                metrics::counter!("iris_transitions_rejected_total", "reason" => err.label())
                    .increment(1);
                tracing::warn!(
                    record = %request.record,
                    target = %request.target,
                    actor = %request.actor_group,
                    error = %err,
                    "transition rejected"
                );
                return Err(err);
            }
        };

        metrics::counter!(
            "iris_transitions_total",
            "from" => history.previous_state.as_str(),
            "to" => history.next_state.as_str()
        )
        .increment(1);
        tracing::info!(
            record = %record.id,
            from = %history.previous_state,
            to = %history.next_state,
            sequence = history.sequence,
            responsible = %record.responsible_group,
            "record transitioned"
        );

        let mut events = vec![EngineEvent::StateChanged {
            record: record.id,
            from: history.previous_state,
            to: history.next_state,
            group: history.group,
            user: history.user.clone(),
            automatic: history.automatic,
        }];
        if let Some(row) = &reasignation {
            events.push(EngineEvent::Reassigned {
                record: record.id,
                from: row.previous_group,
                to: row.next_group,
                reason: row.reason,
            });
        }
        self.events.publish(&events);

        Ok(TransitionOutcome {
            record,
            history,
            reasignation,
        })
    }

    fn apply_transition(
        &self,
        snapshot: &TreeSnapshot,
        record: &mut RecordCard,
        request: &TransitionRequest,
        now: Timestamp,
    ) -> Result<(StateHistoryEntry, Option<Reasignation>), EngineError> {
        let from = record.state;
        let to = request.target;
        if !is_valid_transition(from, to) {
            return Err(EngineError::InvalidTransition { from, to });
        }

        let reasignation = match request.reassign_to {
            Some(target) => {
                let history = self.audit.reasignations(record.id);
                let reason = self.policy.check_reassignment(
                    snapshot,
                    record,
                    &history,
                    request.actor_group,
                    target,
                    now,
                )?;
                Some((target, reason))
            }
            None if to.is_closed() => None,
            None => record
                .theme
                .and_then(|theme| self.resolver.derivation_target(theme, to, record.district))
                .filter(|derived| *derived != record.responsible_group)
                .map(|derived| (derived, ReasignationReason::Derivation)),
        }
        .map(|(next_group, reason)| Reasignation {
            record: record.id,
            previous_group: record.responsible_group,
            next_group,
            reason,
            user: request.actor_user.clone(),
            created_at: now,
        });

        record.state = to;
        record.updated_at = now;
        if from == RecordState::PendingValidate && to.is_open() && !record.validated {
            record.validated = true;
            record.validated_at = Some(now);
        }
        if to == RecordState::PendingReply {
            record.response_limit_date = Some(self.deadlines.response_deadline(now)?);
        } else if from == RecordState::PendingReply {
            record.response_limit_date = None;
            record.alarms.response_time_expired = false;
        }
        if to.is_closed() {
            record.closing_date = Some(now);
        }
        if let Some(row) = &reasignation {
            record.responsible_group = row.next_group;
        }

        let batch = AuditBatch {
            record: record.id,
            state_change: Some(StateChange {
                previous_state: from,
                next_state: to,
                group: request.actor_group,
                user: request.actor_user.clone(),
                created_at: now,
                automatic: request.automatic,
            }),
            reasignation: reasignation.clone(),
        };
        let entry = self.append(batch)?.ok_or_else(|| {
            EngineError::Audit(AuditError::Unavailable("state change was not recorded".into()))
        })?;
        Ok((entry, reasignation))
    }

    fn append(&self, batch: AuditBatch) -> Result<Option<StateHistoryEntry>, EngineError> {
        let record = batch.record;
        self.audit.append(batch).map_err(|err| {
            tracing::error!(%record, error = %err, "audit append failed; change discarded");
            EngineError::from(err)
        })
    }

    /// Hand a record to another group without changing its state.
    pub fn reassign(
        &self,
        request: ReassignRequest,
    ) -> Result<(RecordCard, Reasignation), EngineError> {
        let snapshot = self.tree.snapshot();
        let result = self
            .store
            .try_update(request.record, request.expected_version, |record| {
                let now = self.clock.now();
                let history = self.audit.reasignations(record.id);
                let reason = self.policy.check_reassignment(
                    &snapshot,
                    record,
                    &history,
                    request.actor_group,
                    request.target,
                    now,
                )?;
                let row = Reasignation {
                    record: record.id,
                    previous_group: record.responsible_group,
                    next_group: request.target,
                    reason,
                    user: request.actor_user.clone(),
                    created_at: now,
                };
                record.responsible_group = request.target;
                record.updated_at = now;
                let mut batch = AuditBatch::new(record.id);
                batch.reasignation = Some(row.clone());
                self.append(batch)?;
                Ok(row)
            });

        let (record, row) = result.map_err(|err| {
            tracing::warn!(
                record = %request.record,
                target = %request.target,
                error = %err,
                "reassignment rejected"
            );
            err
        })?;
        tracing::info!(
            record = %record.id,
            from = %row.previous_group,
            to = %row.next_group,
            reason = %row.reason,
            "record reassigned"
        );
        self.events.publish(&[EngineEvent::Reassigned {
            record: record.id,
            from: row.previous_group,
            to: row.next_group,
            reason: row.reason,
        }]);
        Ok((record, row))
    }

    /// Groups `actor` may hand `record` to right now.
    pub fn reassignment_options(
        &self,
        record: RecordCardId,
        actor: GroupId,
    ) -> Result<Vec<GroupId>, EngineError> {
        let record = self.get(record)?;
        let snapshot = self.tree.snapshot();
        let history = self.audit.reasignations(record.id);
        Ok(self
            .policy
            .reassignment_options(&snapshot, &record, &history, actor, self.clock.now()))
    }

    /// Reopen a closed record as a new claim.
    ///
    /// The claim starts in `PendingValidate` with fresh deadlines, the next
    /// reference in the chain and the original's responsible group. The
    /// original is linked to it through `claimed_by`, so each record can
    /// be claimed once and the chain stays a linked list.
    ///
    /// The claim is stored before the original points at it. If linking
    /// fails the claim is removed again.
    pub fn create_claim(
        &self,
        original: RecordCardId,
        user: UserId,
    ) -> Result<RecordCard, EngineError> {
        let linked = {
            let _claims = self.claims.lock();
            self.link_claim(original, &user)
        };
        let (original_after, claim) = linked.map_err(|err| {
            metrics::counter!("iris_transitions_rejected_total", "reason" => err.label())
                .increment(1);
            tracing::warn!(record = %original, error = %err, "claim rejected");
            err
        })?;

        metrics::counter!("iris_claims_created_total").increment(1);
        tracing::info!(
            original = %original_after.id,
            claim = %claim.id,
            reference = %claim.normalized_record_id,
            "claim created"
        );
        self.events.publish(&[EngineEvent::ClaimCreated {
            original: original_after.id,
            claim: claim.id,
            reference: claim.normalized_record_id.clone(),
        }]);
        Ok(claim)
    }

    fn link_claim(
        &self,
        original: RecordCardId,
        user: &UserId,
    ) -> Result<(RecordCard, RecordCard), EngineError> {
        let snapshot = self.tree.snapshot();
        let current = self.get(original)?;
        check_claimable(&snapshot, &current)?;

        let now = self.clock.now();
        let (reference, number) = generate_next_reference(&current.normalized_record_id);
        let ans = self.ans_for(current.theme, now)?;
        let claim = RecordCard {
            id: self.store.allocate_id(),
            normalized_record_id: reference,
            state: RecordState::PendingValidate,
            theme: current.theme,
            district: current.district,
            responsible_group: current.responsible_group,
            creation_group: current.creation_group,
            validated: false,
            validated_at: None,
            created_at: now,
            updated_at: now,
            ans_limit_date: ans.map(|d| d.limit),
            ans_limit_nearexpire: ans.map(|d| d.near_expire),
            response_limit_date: None,
            closing_date: None,
            alarms: AlarmFlags::default(),
            claimed_from: Some(current.id),
            claimed_by: None,
            claims_number: number,
            messages: Vec::new(),
            version: 0,
        };
        self.store.insert(claim.clone());

        let linked = self.store.try_update(original, None, |record| {
            check_claimable(&snapshot, record)?;
            record.claimed_by = Some(claim.id);
            record.updated_at = now;
            let mut batch = AuditBatch::new(claim.id);
            batch.reasignation = Some(Reasignation {
                record: claim.id,
                previous_group: record.responsible_group,
                next_group: claim.responsible_group,
                reason: ReasignationReason::Claim,
                user: user.clone(),
                created_at: now,
            });
            self.append(batch)
        });
        match linked {
            Ok((original_after, _)) => Ok((original_after, claim)),
            Err(err) => {
                self.store.remove(claim.id);
                Err(err)
            }
        }
    }

    /// Recompute a record's deadlines from its theme and raise due alarms.
    pub fn recompute_deadlines(&self, id: RecordCardId) -> Result<DeadlineUpdate, EngineError> {
        let (_, (update, events)) = self.store.try_update(id, None, |record| {
            let now = self.clock.now();
            let before = DeadlineState::of(record);
            if record.state.is_open() {
                if let Some(ans) = self.ans_for(record.theme, record.created_at)? {
                    record.ans_limit_date = Some(ans.limit);
                    record.ans_limit_nearexpire = Some(ans.near_expire);
                }
                let awaiting_reply = record.state == RecordState::PendingReply;
                if awaiting_reply && record.response_limit_date.is_none() {
                    record.response_limit_date = Some(self.deadlines.response_deadline(now)?);
                }
            }
            let events = raise_alarms(&self.deadlines, record, now);
            let raised = events
                .iter()
                .filter_map(|e| match e {
                    EngineEvent::AlarmRaised { kind, .. } => Some(*kind),
                    _ => None,
                })
                .collect();
            Ok((
                DeadlineUpdate {
                    record: record.id,
                    before,
                    after: DeadlineState::of(record),
                    raised,
                },
                events,
            ))
        })?;
        count_alarms(&events);
        self.events.publish(&events);
        tracing::debug!(record = %id, changed = update.changed(), "deadlines recomputed");
        Ok(update)
    }

    /// Record a message sent on behalf of the record, awaiting an answer.
    pub fn register_message(&self, id: RecordCardId) -> Result<PendingMessage, EngineError> {
        let (_, message) = self.store.try_update(id, None, |record| {
            if record.is_closed() {
                return Err(EngineError::RecordClosed(record.id));
            }
            let now = self.clock.now();
            let message = PendingMessage {
                id: record.messages.iter().map(|m| m.id).max().unwrap_or(0) + 1,
                sent_at: now,
                response_limit: self.deadlines.message_deadline(now)?,
                answered_at: None,
                response_time_expired: false,
            };
            record.messages.push(message.clone());
            record.updated_at = now;
            Ok(message)
        })?;
        tracing::info!(
            record = %id,
            message = message.id,
            limit = %message.response_limit,
            "message registered"
        );
        Ok(message)
    }

    /// Mark a message answered. Answering twice keeps the first time.
    pub fn answer_message(
        &self,
        id: RecordCardId,
        message: u64,
    ) -> Result<PendingMessage, EngineError> {
        let (_, answered) = self.store.try_update(id, None, |record| {
            let now = self.clock.now();
            let entry = record
                .message_mut(message)
                .ok_or(EngineError::MessageNotFound { record: id, message })?;
            if entry.answered_at.is_none() {
                entry.answered_at = Some(now);
            }
            let answered = entry.clone();
            record.updated_at = now;
            Ok(answered)
        })?;
        Ok(answered)
    }
}

fn check_claimable(snapshot: &TreeSnapshot, record: &RecordCard) -> Result<(), EngineError> {
    if record.is_open() {
        return Err(EngineError::ClaimNotAllowed {
            record: record.id,
            reason: format!("record is still {}", record.state),
        });
    }
    if let Some(existing) = record.claimed_by {
        return Err(EngineError::ClaimNotAllowed {
            record: record.id,
            reason: format!("already claimed by {existing}"),
        });
    }
    if !snapshot.is_enabled(record.responsible_group) {
        return Err(EngineError::not_eligible(
            record.responsible_group,
            "responsible group is disabled; reassign before claiming",
        ));
    }
    Ok(())
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("store", &self.store)
            .field("tree_generation", &self.tree.snapshot().generation())
            .field("themes", &self.themes.len())
            .field("deadlines", &self.deadlines)
            .field("policy", &self.policy)
            .finish()
    }
}
