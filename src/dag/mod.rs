// src/dag/mod.rs

//! Dependency-aware task graph and its execution.
//!
//! - [`node`] holds a single schedulable unit: its action, edges, pending
//!   prerequisite counter and lifecycle state.
//! - [`manager`] owns the node registry and drives a whole graph through one
//!   blocking run.
//! - [`tracker`] is the mutex + condvar pair that counts in-flight work and
//!   collects failures.
//! - [`execution`] wraps node actions into pool jobs and fans completions out
//!   to dependents.

use thiserror::Error;

pub(crate) mod execution;
pub mod manager;
pub mod node;
pub mod tracker;

pub use manager::{RunPhase, TaskManager};
pub use node::{TaskHandle, TaskState};
pub use tracker::{CompletionListener, CompletionTracker};

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Unit of work attached to a node.
pub type Action = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Why a node ended up in the failure list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The action returned an error.
    #[error("action failed: {0}")]
    Failed(String),

    /// The action panicked; the panic was caught on the worker thread.
    #[error("action panicked: {0}")]
    Panicked(String),

    /// The pool dropped the job without running it.
    #[error("job was dropped by the worker pool before it ran")]
    Abandoned,
}

/// Entry in the failure list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: TaskName,
    pub cause: FailureCause,
}

impl TaskFailure {
    pub fn new(task: impl Into<TaskName>, cause: FailureCause) -> Self {
        Self {
            task: task.into(),
            cause,
        }
    }
}
