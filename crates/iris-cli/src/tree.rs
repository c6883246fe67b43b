//! # Tree Subcommand
//!
//! Inspect and edit the group tree of a scenario.
//!
//! - `show`: every group with its plate and ambit root, or one group's
//!   neighbourhood.
//! - `rebuild`: recompute plates and report which changed.
//! - `move`: reparent a group.
//! - `ambit`: set or clear a group's ambit flag.
//! - `delete`: soft-delete a group.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::{json, Value};

use iris_core::{GroupId, IncludeDeleted};
use iris_groups::TreeSnapshot;

use crate::{print_json, ScenarioTarget};

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(subcommand)]
    pub command: TreeCommand,
}

#[derive(Subcommand, Debug)]
pub enum TreeCommand {
    /// List groups, or describe one group.
    Show {
        /// Group to describe.
        group: Option<u64>,
        /// Include soft-deleted groups.
        #[arg(long)]
        deleted: bool,
    },

    /// Recompute every plate from the roots down.
    Rebuild,

    /// Move a group under another parent.
    Move {
        group: u64,
        /// New parent; omit to make the group a root.
        #[arg(long)]
        parent: Option<u64>,
    },

    /// Mark or unmark a group as an ambit root.
    Ambit {
        group: u64,
        #[arg(long)]
        unset: bool,
    },

    /// Soft-delete a group at the session time.
    Delete { group: u64 },
}

pub fn run_tree(args: &TreeArgs, target: &ScenarioTarget) -> Result<u8> {
    print_json(&tree_report(args, target)?)?;
    Ok(0)
}

pub fn tree_report(args: &TreeArgs, target: &ScenarioTarget) -> Result<Value> {
    let session = target.open()?;
    let tree = session.engine.tree();

    let report = match &args.command {
        TreeCommand::Show { group: None, deleted } => {
            let visibility = if *deleted { IncludeDeleted::Yes } else { IncludeDeleted::No };
            let snapshot = tree.snapshot();
            let groups: Vec<Value> = snapshot
                .groups(visibility)
                .map(|g| describe(&snapshot, g.id))
                .collect();
            json!({ "generation": snapshot.generation(), "groups": groups })
        }
        TreeCommand::Show { group: Some(id), deleted } => {
            let visibility = if *deleted { IncludeDeleted::Yes } else { IncludeDeleted::No };
            let snapshot = tree.snapshot();
            let id = GroupId(*id);
            snapshot
                .get(id, IncludeDeleted::Yes)
                .with_context(|| format!("{id} not found"))?;
            let mut report = describe(&snapshot, id);
            report["ancestors"] = json!(snapshot.ancestors(id));
            report["children"] = json!(ids(snapshot.children(id, visibility)));
            report["descendants"] = json!(ids(snapshot.descendants(id, visibility)));
            report
        }
        TreeCommand::Rebuild => json!(tree.rebuild()?),
        TreeCommand::Move { group, parent } => {
            let report = tree.reparent(GroupId(*group), parent.map(GroupId))?;
            target.commit(&session)?;
            json!(report)
        }
        TreeCommand::Ambit { group, unset } => {
            let report = tree.set_ambit(GroupId(*group), !unset)?;
            target.commit(&session)?;
            json!(report)
        }
        TreeCommand::Delete { group } => {
            let report = tree.soft_delete(GroupId(*group), session.engine.now())?;
            target.commit(&session)?;
            json!(report)
        }
    };
    Ok(report)
}

fn describe(snapshot: &TreeSnapshot, id: GroupId) -> Value {
    let group = snapshot.get(id, IncludeDeleted::Yes);
    json!({
        "id": id,
        "name": group.map(|g| g.name.as_str()),
        "plate": snapshot.plate(id),
        "parent": snapshot.parent(id),
        "is_ambit": group.is_some_and(|g| g.is_ambit),
        "ambit": snapshot.ambit_of(id),
        "enabled": snapshot.is_enabled(id),
    })
}

fn ids(groups: Vec<&iris_groups::Group>) -> Vec<GroupId> {
    groups.into_iter().map(|g| g.id).collect()
}
