//! # Record Subcommands
//!
//! Drive a record card through the engine: `transition`, `reassign`,
//! `claim`, `deadlines` and `sweep`. Each report carries the events the
//! operation published.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::{json, Value};

use iris_core::{GroupId, RecordCardId, RecordState, UserId};
use iris_state::{AlarmSweep, ReassignRequest, TransitionRequest};

use crate::{parse_state, print_json, ScenarioTarget};

#[derive(Args, Debug)]
pub struct TransitionArgs {
    /// Record card id.
    pub record: u64,
    /// Target state.
    #[arg(long, value_parser = parse_state)]
    pub to: RecordState,
    /// Group performing the transition.
    #[arg(long)]
    pub group: u64,
    #[arg(long, default_value = "operator")]
    pub user: String,
    /// Fail unless the record is still at this version.
    #[arg(long)]
    pub expect_version: Option<u64>,
    /// Hand the record to this group as part of the transition.
    #[arg(long)]
    pub reassign_to: Option<u64>,
    /// Record the change as made by the system.
    #[arg(long)]
    pub automatic: bool,
}

#[derive(Args, Debug)]
pub struct ReassignArgs {
    pub record: u64,
    /// New responsible group.
    #[arg(long)]
    pub to: u64,
    /// Group performing the reassignment.
    #[arg(long)]
    pub group: u64,
    #[arg(long, default_value = "operator")]
    pub user: String,
    #[arg(long)]
    pub expect_version: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ClaimArgs {
    /// Closed record to claim.
    pub record: u64,
    #[arg(long, default_value = "operator")]
    pub user: String,
}

#[derive(Args, Debug)]
pub struct DeadlinesArgs {
    /// Record to recompute.
    #[arg(required_unless_present = "all")]
    pub record: Option<u64>,
    /// Recompute every open record.
    #[arg(long, conflicts_with = "record")]
    pub all: bool,
}

pub fn transition_report(args: &TransitionArgs, target: &ScenarioTarget) -> Result<Value> {
    let session = target.open()?;
    let mut request = TransitionRequest::new(
        RecordCardId(args.record),
        args.to,
        GroupId(args.group),
        UserId::new(args.user.as_str()),
    );
    request.expected_version = args.expect_version;
    request.reassign_to = args.reassign_to.map(GroupId);
    request.automatic = args.automatic;

    let outcome = session
        .engine
        .transition(request)
        .with_context(|| format!("transition of record:{} to {} failed", args.record, args.to))?;
    target.commit(&session)?;
    Ok(json!({ "outcome": outcome, "events": session.recorder.take() }))
}

pub fn reassign_report(args: &ReassignArgs, target: &ScenarioTarget) -> Result<Value> {
    let session = target.open()?;
    let (record, reasignation) = session
        .engine
        .reassign(ReassignRequest {
            record: RecordCardId(args.record),
            target: GroupId(args.to),
            actor_group: GroupId(args.group),
            actor_user: UserId::new(args.user.as_str()),
            expected_version: args.expect_version,
        })
        .with_context(|| {
            format!("reassignment of record:{} to group:{} failed", args.record, args.to)
        })?;
    target.commit(&session)?;
    Ok(json!({
        "record": record,
        "reasignation": reasignation,
        "events": session.recorder.take(),
    }))
}

pub fn claim_report(args: &ClaimArgs, target: &ScenarioTarget) -> Result<Value> {
    let session = target.open()?;
    let claim = session
        .engine
        .create_claim(RecordCardId(args.record), UserId::new(args.user.as_str()))
        .with_context(|| format!("claim on record:{} failed", args.record))?;
    target.commit(&session)?;
    Ok(json!({ "claim": claim, "events": session.recorder.take() }))
}

pub fn deadlines_report(args: &DeadlinesArgs, target: &ScenarioTarget) -> Result<Value> {
    let session = target.open()?;
    let ids = match (args.record, args.all) {
        (Some(id), false) => vec![RecordCardId(id)],
        (None, true) => session.engine.store().open_ids(),
        _ => bail!("give either a record id or --all"),
    };
    let updates = ids
        .into_iter()
        .map(|id| session.engine.recompute_deadlines(id))
        .collect::<Result<Vec<_>, _>>()?;
    target.commit(&session)?;
    Ok(json!({ "updates": updates, "events": session.recorder.take() }))
}

pub fn sweep_report(target: &ScenarioTarget) -> Result<Value> {
    let session = target.open()?;
    let report = AlarmSweep::for_engine(&session.engine).run(session.engine.now());
    target.commit(&session)?;
    Ok(json!(report))
}

pub fn run_transition(args: &TransitionArgs, target: &ScenarioTarget) -> Result<u8> {
    print_json(&transition_report(args, target)?)?;
    Ok(0)
}

pub fn run_reassign(args: &ReassignArgs, target: &ScenarioTarget) -> Result<u8> {
    print_json(&reassign_report(args, target)?)?;
    Ok(0)
}

pub fn run_claim(args: &ClaimArgs, target: &ScenarioTarget) -> Result<u8> {
    print_json(&claim_report(args, target)?)?;
    Ok(0)
}

pub fn run_deadlines(args: &DeadlinesArgs, target: &ScenarioTarget) -> Result<u8> {
    print_json(&deadlines_report(args, target)?)?;
    Ok(0)
}

/// Exit code 2 when the sweep raised any alarm, for schedulers that page.
pub fn run_sweep(target: &ScenarioTarget) -> Result<u8> {
    let report = sweep_report(target)?;
    let raised = report["raised"].as_array().map_or(0, Vec::len);
    print_json(&report)?;
    Ok(if raised > 0 { 2 } else { 0 })
}
