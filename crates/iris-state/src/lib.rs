//! # iris-state: Record Card Lifecycle Engine
//!
//! Drives a record card from creation to closure and decides which group
//! owns it along the way.
//!
//! ## Modules
//!
//! - [`transitions`]: the allow-table of state changes.
//! - [`record`]: the `RecordCard` entity and its alarm flags.
//! - [`history`]: append-only state history and reassignment logs,
//!   behind the [`AuditSink`] trait.
//! - [`deadline`]: ANS, response and message deadlines, and alarm
//!   evaluation. Pure functions of time and configuration.
//! - [`reassignment`]: `only_ambit_themes` and the reassignment checks.
//! - [`reference`]: claim reference suffixes (`"123XLAS"` → `"123XLAS-02"`).
//! - [`store`]: the concurrent record store with per-record locking.
//! - [`events`]: notifications fanned out after a change commits.
//! - [`engine`]: [`StateMachine`], which ties the above together.
//! - [`sweep`]: the idempotent alarm sweep run by a scheduler.
//!
//! ## Atomicity
//!
//! Every mutation of a record runs inside its store entry lock: read,
//! validate, append audit rows, write. If any step fails the record is
//! left untouched and no audit row is written. Notifications are sent only
//! after the entry lock is released.

pub mod deadline;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod reassignment;
pub mod record;
pub mod reference;
pub mod store;
pub mod sweep;
pub mod transitions;

pub use deadline::{AnsDeadline, DeadlineCalculator, DeadlineFields};
pub use engine::{
    DeadlineState, DeadlineUpdate, ReassignRequest, StateMachine, StateMachineBuilder,
    TransitionOutcome, TransitionRequest,
};
pub use error::EngineError;
pub use events::{
    AlarmKind, EngineEvent, EventBus, LoggingDispatcher, NotificationDispatcher,
    RecordingDispatcher,
};
pub use history::{
    AuditBatch, AuditError, AuditSink, InMemoryAuditLog, Reasignation, ReasignationReason,
    StateChange, StateHistoryEntry,
};
pub use reassignment::{
    days_in_ambit, only_ambit_themes, ReassignmentInputs, ReassignmentPolicy,
    ReassignmentThresholds,
};
pub use record::{AlarmFlags, NewRecordCard, PendingMessage, RecordCard};
pub use reference::generate_next_reference;
pub use store::RecordCardStore;
pub use sweep::{AlarmSweep, SweepReport};
pub use transitions::{is_valid_transition, valid_transitions};
