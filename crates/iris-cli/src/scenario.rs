//! # Scenario Files
//!
//! A scenario is a YAML snapshot of everything the engine needs: groups,
//! permissions, themes, records with their audit rows, parameters and the
//! current time. Commands open one as a [`Session`], act on it, and may
//! write the result back.
//!
//! ```yaml
//! now: 2026-05-04T09:00:00Z
//! parameters:
//!   DIES_CANVI_TEMATICA_FORA_AREA: 8
//! groups:
//!   - { id: 1, name: DAIR }
//!   - { id: 10, name: Gràcia, parent: 1, is_ambit: true }
//! permissions:
//!   10: [RECARD_COORDINATOR_VALIDATION]
//! themes:
//!   - id: 30
//!     description: Paviment en mal estat
//!     direct_derivations: [{ state: pending_validate, group: 10 }]
//! records: []
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use iris_core::{FixedClock, IncludeDeleted, Parameters, Timestamp};
use iris_groups::{Group, GroupTree, StaticPermissions};
use iris_state::{
    InMemoryAuditLog, LoggingDispatcher, Reasignation, RecordCard, RecordCardStore,
    RecordingDispatcher, StateHistoryEntry, StateMachine,
};
use iris_themes::{ElementDetail, ThemeCatalog};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Time the session clock is pinned to. The wall clock when absent.
    pub now: Option<Timestamp>,
    pub parameters: Parameters,
    pub groups: Vec<Group>,
    pub permissions: StaticPermissions,
    pub themes: Vec<ElementDetail>,
    pub records: Vec<RecordCard>,
    pub history: Vec<StateHistoryEntry>,
    pub reasignations: Vec<Reasignation>,
}

impl Scenario {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse scenario")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to serialize scenario")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)
            .with_context(|| format!("failed to write scenario {}", path.display()))
    }

    /// Build an engine over this scenario, with the clock at `at` when given.
    pub fn open(self, at: Option<Timestamp>) -> Result<Session> {
        let (tree, report) = GroupTree::load(self.groups).context("group tree is inconsistent")?;
        if !report.is_noop() {
            tracing::warn!(
                stale = report.updated.len(),
                "scenario plates were stale and have been recomputed"
            );
        }
        let themes = ThemeCatalog::new(self.themes).context("theme catalog is inconsistent")?;
        let audit = InMemoryAuditLog::import(self.history, self.reasignations)
            .context("audit rows are inconsistent")?;
        let audit = Arc::new(audit);
        let clock = Arc::new(FixedClock::new(at.or(self.now).unwrap_or_else(Timestamp::now)));
        let recorder = Arc::new(RecordingDispatcher::new());

        let engine = StateMachine::builder(Arc::new(tree), Arc::new(themes))
            .permissions(Arc::new(self.permissions.clone()))
            .parameters(Arc::new(self.parameters.clone()))
            .audit(audit.clone())
            .store(Arc::new(RecordCardStore::with_records(self.records)))
            .clock(clock.clone())
            .dispatcher(recorder.clone())
            .dispatcher(Arc::new(LoggingDispatcher))
            .build();

        Ok(Session {
            engine,
            clock,
            recorder,
            audit,
            parameters: self.parameters,
            permissions: self.permissions,
        })
    }
}

/// A scenario loaded into a running engine.
pub struct Session {
    pub engine: StateMachine,
    pub clock: Arc<FixedClock>,
    /// Every event the engine published during this session.
    pub recorder: Arc<RecordingDispatcher>,
    audit: Arc<InMemoryAuditLog>,
    parameters: Parameters,
    permissions: StaticPermissions,
}

impl Session {
    /// The session's current state as a scenario.
    pub fn to_scenario(&self) -> Scenario {
        let (history, reasignations) = self.audit.export();
        Scenario {
            now: Some(self.engine.now()),
            parameters: self.parameters.clone(),
            groups: self
                .engine
                .tree()
                .snapshot()
                .groups(IncludeDeleted::Yes)
                .cloned()
                .collect(),
            permissions: self.permissions.clone(),
            themes: self.engine.themes().list(IncludeDeleted::Yes),
            records: self.engine.store().list(),
            history,
            reasignations,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("now", &self.engine.now())
            .field("records", &self.engine.store().len())
            .field("events", &self.recorder.len())
            .finish()
    }
}
