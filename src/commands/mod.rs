//! Command implementations for applock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations.

use crate::cli::{Command, ConfigArgs, DemoArgs, Operation, OptionArgs, ScriptArgs};
use applock::config::{LockConfig, LockOptions, RawLockOptions};
use applock::diagnostics::StderrSink;
use applock::error::{LockError, Result};
use applock::locks::{self, HandleStatus, LockHandle, LockTimeout, MemoryResourceManager};
use std::sync::Arc;
use std::time::Duration;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Script(args) => cmd_script(args),
        Command::Config(args) => cmd_config(args),
        Command::Demo(args) => cmd_demo(args),
    }
}

/// Build the effective config from the optional YAML file and the
/// command line overrides. Replaced values are reported on stderr.
fn load_config(options: &OptionArgs) -> Result<LockConfig> {
    let mut raw = match &options.config {
        Some(path) => RawLockOptions::load(path)?,
        None => RawLockOptions::default(),
    };

    if let Some(mode) = &options.mode {
        raw.set("mode", mode);
    }
    if let Some(timeout) = &options.timeout_ms {
        raw.set("timeout_millis", timeout);
    }

    let config = LockConfig::from_raw(&raw)?;
    for coercion in &config.coercions {
        eprintln!("Warning: {}", coercion);
    }
    Ok(config)
}

fn render_script(operation: Operation, name: &str, config: &LockConfig) -> String {
    let command = match operation {
        Operation::Acquire => locks::Command::Acquire {
            resource: name.to_string(),
            mode: config.mode,
            timeout: config.timeout_millis,
            principal: config.principal.clone(),
        },
        Operation::Release => locks::Command::Release {
            resource: name.to_string(),
            principal: config.principal.clone(),
        },
        Operation::Probe => locks::Command::Probe {
            resource: name.to_string(),
        },
    };
    command.to_sql()
}

fn cmd_script(args: ScriptArgs) -> Result<()> {
    locks::validate_name(&args.name)?;
    let config = load_config(&args.options)?;
    println!("{}", render_script(args.operation, &args.name, &config));
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> Result<()> {
    let config = load_config(&args.options)?;
    print!("{}", config.to_yaml()?);
    Ok(())
}

/// Outcome of the demo walkthrough.
#[derive(Debug)]
struct DemoReport {
    steps: Vec<String>,
    statuses: Vec<HandleStatus>,
}

/// Two sessions contend for the same name: the first takes the lock, the
/// second is refused until the first lets go.
fn run_demo(args: &DemoArgs, config: LockConfig) -> Result<DemoReport> {
    let manager = MemoryResourceManager::new();
    let mut first_session = manager.connect();
    let mut second_session = manager.connect();

    let mut options = LockOptions::new(config);
    if args.trace {
        options = options.diagnostics(Arc::new(StderrSink));
    }
    // The contender never waits, so a forever timeout cannot stall the demo.
    let contender_options = options.clone().timeout(LockTimeout::Millis(0));

    let mut steps = Vec::new();
    let mut first = LockHandle::new(args.name.as_str(), &mut first_session, options)?;
    let mut second = LockHandle::new(args.name.as_str(), &mut second_session, contender_options)?;

    steps.push(format!("lock '{}' free: {}", args.name, first.is_free()));

    {
        let guard = first.lock()?;
        steps.push(format!("first handle acquired: {}", guard.handle().status()));

        steps.push(format!("lock '{}' free: {}", args.name, second.is_free()));
        if second.acquire() {
            steps.push("second handle acquired while first held".to_string());
        } else if let Some(err) = second.last_error() {
            steps.push(format!("second handle refused: {}", err));
        }

        if args.hold_ms > 0 {
            std::thread::sleep(Duration::from_millis(args.hold_ms));
        }

        let state = guard.release();
        steps.push(format!("first handle released: {}", state));
    }

    if second.acquire() {
        steps.push(format!("second handle acquired: {}", second.status()));
    } else if let Some(err) = second.last_error() {
        steps.push(format!("second handle still refused: {}", err));
    }

    let statuses = vec![first.status(), second.status()];
    second.release();

    Ok(DemoReport { steps, statuses })
}

fn cmd_demo(args: DemoArgs) -> Result<()> {
    locks::validate_name(&args.name)?;
    let config = load_config(&args.options)?;
    let report = run_demo(&args, config)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report.statuses)
            .map_err(|e| LockError::Io(format!("failed to serialize status: {}", e)))?;
        println!("{}", json);
    } else {
        for step in &report.steps {
            println!("{}", step);
        }
    }
    Ok(())
}
