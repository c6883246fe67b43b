//! # iris-cli: Operator CLI for the Record Card Engine
//!
//! Provides the `iris` command-line interface. Every command except
//! `reference` works on a YAML scenario file (see [`scenario`]): the
//! scenario is loaded into an engine, the command runs, its result is
//! printed as JSON, and with `--write` the updated scenario is saved back.
//!
//! ```bash
//! iris --scenario city.yaml tree show
//! iris --scenario city.yaml --write transition 7 --to in_solution --group 11
//! iris --scenario city.yaml --at 2026-06-01T00:00:00Z sweep
//! iris reference 123XLAS-02
//! ```

pub mod policy;
pub mod record;
pub mod scenario;
pub mod tree;

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use iris_core::{RecordState, Timestamp};

use crate::scenario::{Scenario, Session};

/// Where a command reads its scenario from, and whether it writes back.
#[derive(Debug, Clone)]
pub struct ScenarioTarget {
    pub path: PathBuf,
    pub write: bool,
    /// Overrides the scenario's `now`.
    pub at: Option<Timestamp>,
}

impl ScenarioTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: false,
            at: None,
        }
    }

    pub fn writing(mut self) -> Self {
        self.write = true;
        self
    }

    pub fn at(mut self, at: Timestamp) -> Self {
        self.at = Some(at);
        self
    }

    pub fn open(&self) -> Result<Session> {
        Scenario::load(&self.path)?.open(self.at)
    }

    /// Save the session back to the scenario file if `--write` was given.
    pub fn commit(&self, session: &Session) -> Result<()> {
        if !self.write {
            return Ok(());
        }
        session.to_scenario().save(&self.path)?;
        tracing::info!(path = %self.path.display(), "scenario written");
        Ok(())
    }
}

/// Print a report as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{json}");
    Ok(())
}

/// `clap` value parser for record states (`in_solution`, `closed`, ...).
pub fn parse_state(s: &str) -> std::result::Result<RecordState, String> {
    s.parse::<RecordState>().map_err(|e| e.to_string())
}

/// `clap` value parser for UTC timestamps.
pub fn parse_timestamp(s: &str) -> std::result::Result<Timestamp, String> {
    Timestamp::parse(s).map_err(|e| e.to_string())
}
