// src/lib.rs

//! Dependency-aware parallel task scheduler.
//!
//! The core lives in [`dag`]: register named tasks and their prerequisites
//! with a [`TaskManager`](dag::TaskManager), then call
//! [`run_and_wait`](dag::TaskManager::run_and_wait). Tasks run on any
//! [`WorkerPool`](exec::WorkerPool); failures are collected, never raised.
//!
//! The remaining modules make up the `taskgraph` binary, which reads the
//! graph from a TOML file and runs shell commands.

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{TaskFailure, TaskHandle, TaskManager};
use crate::errors::TaskgraphError;
use crate::exec::{ShellCommand, TokioPool, WorkerPool};

/// High-level entry point used by `main.rs`.
///
/// This wires together config loading, the worker pool and the task
/// manager, runs the graph once and turns any task failure into an error.
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from '{}'", config_path.display()))?;
    apply_overrides(&mut cfg, &args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let pool: Arc<dyn WorkerPool> = Arc::new(TokioPool::new(cfg.config.effective_workers())?);
    let failures = run_config(&cfg, pool)?;

    if failures.is_empty() {
        info!(tasks = cfg.task.len(), "all tasks succeeded");
        return Ok(());
    }

    for failure in &failures {
        error!(task = %failure.task, error = %failure.cause, "task failed");
    }
    let names: Vec<&str> = failures.iter().map(|f| f.task.as_str()).collect();
    bail!("{} task(s) failed: {}", failures.len(), names.join(", "))
}

/// Register every task of a validated config with a fresh manager on `pool`
/// and run it to completion.
///
/// Tasks are registered in topological order so each task's prerequisites
/// already have handles when it is created.
pub fn run_config(
    cfg: &ConfigFile,
    pool: Arc<dyn WorkerPool>,
) -> errors::Result<Vec<TaskFailure>> {
    let mut manager = TaskManager::new(pool).with_poll_interval(cfg.config.poll_interval());

    for name in cfg.registration_order() {
        let task = cfg
            .task
            .get(name)
            .ok_or_else(|| TaskgraphError::TaskNotFound(name.clone()))?;

        let prerequisites = task
            .after
            .iter()
            .map(|dep| {
                manager
                    .handle_of(dep)
                    .ok_or_else(|| TaskgraphError::TaskNotFound(dep.clone()))
            })
            .collect::<errors::Result<Vec<TaskHandle>>>()?;

        let action = ShellCommand::new(name.clone(), task.cmd.clone()).into_action();
        manager.get_or_create(name.clone(), action, &prerequisites)?;
    }

    debug!(
        tasks = manager.len(),
        roots = manager.roots().len(),
        "task graph built"
    );
    manager.run_and_wait()
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        if workers == 0 {
            bail!("--workers must be >= 1 (got 0)");
        }
        cfg.config.workers = Some(workers);
    }
    if let Some(ms) = args.poll_interval_ms {
        if ms == 0 {
            bail!("--poll-interval-ms must be >= 1 (got 0)");
        }
        cfg.config.poll_interval_ms = ms;
    }
    Ok(())
}

/// Simple dry-run output: print tasks in registration order with their
/// prerequisites and commands.
fn print_dry_run(cfg: &ConfigFile) {
    println!("taskgraph dry-run");
    println!("  config.workers = {}", cfg.config.effective_workers());
    println!("  config.poll_interval_ms = {}", cfg.config.poll_interval_ms);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for name in cfg.registration_order() {
        let Some(task) = cfg.task.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
    }

    debug!("dry-run complete (no execution)");
}
