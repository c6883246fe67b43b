//! # iris-core: Foundational Types for the Record Card Engine
//!
//! Every other crate in the workspace depends on `iris-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `GroupId`, `RecordCardId`,
//!    `ThemeId`, `DistrictId`, `UserId`: you cannot pass a group where a
//!    record is expected.
//!
//! 2. **Single `RecordState` enum.** One definition of the nine record
//!    states, exhaustive `match` everywhere.
//!
//! 3. **UTC-only timestamps.** `Timestamp` is UTC with seconds precision.
//!    All deadline arithmetic goes through it.
//!
//! 4. **Injected time and configuration.** The engine never reads the wall
//!    clock or global settings directly: it is handed a [`Clock`] and a
//!    [`ParameterStore`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `iris-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod record_state;
pub mod temporal;
pub mod visibility;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{keys, ParameterStore, Parameters};
pub use error::IrisError;
pub use identity::{DistrictId, GroupId, RecordCardId, ThemeId, UserId};
pub use record_state::{RecordState, RECORD_STATE_COUNT};
pub use temporal::Timestamp;
pub use visibility::IncludeDeleted;
