//! # Policy and Reference Subcommands
//!
//! `policy` explains what a group may do with a record: whether it is
//! within the record's ambit, the facts the out-of-ambit decision rests on,
//! and every group the record may be handed to.
//!
//! `reference` prints the next claim reference for a record reference.

use anyhow::Result;
use clap::Args;
use serde_json::{json, Value};

use iris_core::{GroupId, RecordCardId};
use iris_state::{generate_next_reference, only_ambit_themes};

use crate::{print_json, ScenarioTarget};

#[derive(Args, Debug)]
pub struct PolicyArgs {
    pub record: u64,
    /// Acting group.
    #[arg(long)]
    pub group: u64,
}

#[derive(Args, Debug)]
pub struct ReferenceArgs {
    /// Current normalized reference, e.g. `123XLAS` or `123XLAS-02`.
    pub reference: String,
}

pub fn policy_report(args: &PolicyArgs, target: &ScenarioTarget) -> Result<Value> {
    let session = target.open()?;
    let engine = &session.engine;
    let actor = GroupId(args.group);
    let record = engine.get(RecordCardId(args.record))?;
    let snapshot = engine.tree().snapshot();
    let reasignations = engine.reasignations(record.id);
    let policy = engine.policy();

    let inputs = policy.inputs(&snapshot, &record, &reasignations, actor, engine.now());
    let within_ambit =
        engine.resolver().is_within_ambit_in(&snapshot, &record.ambit_query(), actor);
    Ok(json!({
        "record": record.id,
        "state": record.state,
        "responsible": record.responsible_group,
        "actor": actor,
        "within_ambit": within_ambit,
        "inputs": inputs,
        "thresholds": policy.thresholds(),
        "only_ambit": only_ambit_themes(&inputs, &policy.thresholds()),
        "options": engine.reassignment_options(record.id, actor)?,
    }))
}

pub fn reference_report(args: &ReferenceArgs) -> Value {
    let (reference, claims_number) = generate_next_reference(&args.reference);
    json!({ "reference": reference, "claims_number": claims_number })
}

pub fn run_policy(args: &PolicyArgs, target: &ScenarioTarget) -> Result<u8> {
    print_json(&policy_report(args, target)?)?;
    Ok(0)
}

pub fn run_reference(args: &ReferenceArgs) -> Result<u8> {
    print_json(&reference_report(args))?;
    Ok(0)
}
