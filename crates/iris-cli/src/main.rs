//! # iris CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use iris_cli::policy::{run_policy, run_reference, PolicyArgs, ReferenceArgs};
use iris_cli::record::{
    run_claim, run_deadlines, run_reassign, run_sweep, run_transition, ClaimArgs, DeadlinesArgs,
    ReassignArgs, TransitionArgs,
};
use iris_cli::tree::{run_tree, TreeArgs};
use iris_cli::{parse_timestamp, ScenarioTarget};
use iris_core::Timestamp;

/// IRIS record card engine CLI
///
/// Loads a YAML scenario (groups, themes, records, history, parameters),
/// runs one operation against it, and prints the result as JSON.
#[derive(Parser, Debug)]
#[command(name = "iris", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Scenario file to operate on.
    #[arg(short, long, global = true)]
    scenario: Option<PathBuf>,

    /// Save the updated scenario back to the file.
    #[arg(long, global = true)]
    write: bool,

    /// Run as of this UTC time instead of the scenario's `now`.
    #[arg(long, global = true, value_parser = parse_timestamp)]
    at: Option<Timestamp>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect and edit the group tree.
    Tree(TreeArgs),

    /// Move a record to another state.
    Transition(TransitionArgs),

    /// Hand a record to another group.
    Reassign(ReassignArgs),

    /// Open a claim on a closed record.
    Claim(ClaimArgs),

    /// Recompute deadlines and raise due alarms.
    Deadlines(DeadlinesArgs),

    /// Raise every due alarm on open records.
    Sweep,

    /// Explain the reassignment policy for a record and group.
    Policy(PolicyArgs),

    /// Print the next claim reference.
    Reference(ReferenceArgs),
}

impl Cli {
    fn target(&self) -> Result<ScenarioTarget> {
        let path = self
            .scenario
            .clone()
            .context("this command needs a scenario: pass --scenario <FILE>")?;
        Ok(ScenarioTarget {
            path,
            write: self.write,
            at: self.at,
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "iris CLI starting");

    match dispatch(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn dispatch(cli: &Cli) -> Result<u8> {
    match &cli.command {
        Commands::Reference(args) => run_reference(args),
        Commands::Tree(args) => run_tree(args, &cli.target()?),
        Commands::Transition(args) => run_transition(args, &cli.target()?),
        Commands::Reassign(args) => run_reassign(args, &cli.target()?),
        Commands::Claim(args) => run_claim(args, &cli.target()?),
        Commands::Deadlines(args) => run_deadlines(args, &cli.target()?),
        Commands::Sweep => run_sweep(&cli.target()?),
        Commands::Policy(args) => run_policy(args, &cli.target()?),
    }
}
