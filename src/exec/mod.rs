// src/exec/mod.rs

//! Execution layer: where node actions actually run.
//!
//! - [`pool`] defines the [`WorkerPool`] contract the scheduler submits jobs
//!   through, and [`TokioPool`], the bounded production pool.
//! - [`command`] turns shell commands from the config file into node actions.

pub mod command;
pub mod pool;

pub use command::ShellCommand;
pub use pool::{Job, TokioPool, WorkerPool};
