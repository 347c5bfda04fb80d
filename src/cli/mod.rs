//! CLI argument parsing for applock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// applock: named advisory locks on a SQL Server style resource manager.
///
/// Renders the lock batches, shows the effective configuration, and runs a
/// walkthrough against an in-memory resource manager.
#[derive(Parser, Debug)]
#[command(name = "applock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for applock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the T-SQL batch for a lock operation.
    ///
    /// Useful for running the batch by hand or reviewing what a handle sends.
    Script(ScriptArgs),

    /// Print the effective lock configuration as YAML.
    ///
    /// Invalid values are replaced by defaults and reported on stderr.
    Config(ConfigArgs),

    /// Walk through acquire, contention and release.
    ///
    /// Runs two handles on the same name against an in-memory resource
    /// manager and reports each step.
    Demo(DemoArgs),
}

/// Lock operation to render.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Acquire,
    Release,
    Probe,
}

/// Options shared by every command.
#[derive(Args, Debug, Default)]
pub struct OptionArgs {
    /// YAML file with lock options.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Lock mode (Shared, Update, Exclusive, IntentExclusive, IntentShared).
    #[arg(long)]
    pub mode: Option<String>,

    /// Wait budget in milliseconds, or "forever".
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<String>,
}

/// Arguments for the `script` command.
#[derive(Args, Debug)]
pub struct ScriptArgs {
    /// Operation to render.
    #[arg(value_enum)]
    pub operation: Operation,

    /// Lock resource name.
    pub name: String,

    #[command(flatten)]
    pub options: OptionArgs,
}

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub options: OptionArgs,
}

/// Arguments for the `demo` command.
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Lock resource name.
    #[arg(default_value = "__lock_handle__")]
    pub name: String,

    /// Milliseconds to hold the lock before releasing it.
    #[arg(long, default_value_t = 0)]
    pub hold_ms: u64,

    /// Emit diagnostic trace lines on stderr.
    #[arg(long)]
    pub trace: bool,

    /// Print the final handle states as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub options: OptionArgs,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
