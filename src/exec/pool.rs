// src/exec/pool.rs

//! Pluggable worker pool abstraction.
//!
//! The scheduler talks to a `WorkerPool` instead of a concrete thread pool.
//! That keeps it independent of queueing policy and pool size, and lets tests
//! swap in pools that run jobs inline, one thread per job, or not at all.
//!
//! - `TokioPool` is the implementation used by the `taskgraph` binary. Node
//!   actions are blocking closures, so jobs go to the runtime's blocking
//!   thread pool, whose size is capped at the configured worker count.

use std::fmt;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use crate::errors::{Result, TaskgraphError};

/// A unit of work handed to a pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Trait abstracting where scheduled jobs run.
///
/// `execute` must return without waiting for the job to run. A pool that
/// discards a job (for example while shutting down) must drop it rather than
/// leak it; the scheduler relies on the drop to account for the lost task.
pub trait WorkerPool: Send + Sync {
    fn execute(&self, job: Job);
}

/// Bounded pool backed by a dedicated Tokio runtime.
pub struct TokioPool {
    runtime: Option<Runtime>,
    workers: usize,
}

impl fmt::Debug for TokioPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioPool")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl TokioPool {
    /// Build a pool that runs at most `workers` jobs at the same time.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(TaskgraphError::ConfigError(
                "worker pool needs at least one worker (got 0)".to_string(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("taskgraph-worker")
            .build()?;

        info!(workers, "worker pool started");

        Ok(Self {
            runtime: Some(runtime),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl WorkerPool for TokioPool {
    fn execute(&self, job: Job) {
        match &self.runtime {
            Some(runtime) => {
                // Detached: completion is reported by the job itself.
                drop(runtime.spawn_blocking(job));
            }
            None => drop(job),
        }
    }
}

impl Drop for TokioPool {
    fn drop(&mut self) {
        // The last reference may be released on one of our own threads, where
        // a blocking shutdown would wait on itself.
        if let Some(runtime) = self.runtime.take() {
            debug!(workers = self.workers, "shutting down worker pool");
            runtime.shutdown_background();
        }
    }
}
