// src/dag/tracker.rs

//! In-flight accounting and failure collection for a single run.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::dag::TaskFailure;
use crate::errors::{Result, TaskgraphError};

/// Receiver of node lifecycle notifications.
///
/// Pool threads call into this while a graph runs, so implementations must
/// not block for long and must never panic.
pub trait CompletionListener: Send + Sync {
    /// A node is about to be handed to the worker pool.
    fn on_submitted(&self, task: &str);

    /// A node's action finished successfully.
    fn on_completed(&self, task: &str);

    /// A node's action failed (error, panic or abandoned job).
    fn on_failed(&self, failure: TaskFailure);
}

#[derive(Debug, Default)]
struct Progress {
    in_flight: usize,
    completed: usize,
    failures: Vec<TaskFailure>,
}

#[derive(Debug, Default)]
struct Shared {
    progress: Mutex<Progress>,
    idle: Condvar,
}

/// Cloneable handle onto the run's shared counters.
///
/// All clones observe the same state, so a clone taken before
/// [`TaskManager::run_and_wait`](crate::dag::TaskManager::run_and_wait) can
/// be polled from another thread while the run is in progress.
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    shared: Arc<Shared>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the failure list, in completion order.
    pub fn failures(&self) -> Result<Vec<TaskFailure>> {
        let progress = self.lock_checked("reading failures")?;
        Ok(progress.failures.clone())
    }

    /// Number of nodes submitted but not yet completed.
    pub fn in_flight(&self) -> Result<usize> {
        Ok(self.lock_checked("reading in-flight count")?.in_flight)
    }

    /// Number of nodes that completed, successfully or not.
    pub fn completed(&self) -> Result<usize> {
        Ok(self.lock_checked("reading completed count")?.completed)
    }

    /// Block until the in-flight count reaches zero.
    ///
    /// Sleeps on the condvar for at most `poll_interval` at a time and
    /// re-checks the count after every wakeup, so a lost notification only
    /// costs one interval. There is no overall timeout.
    pub fn wait_until_idle(&self, poll_interval: Duration) -> Result<()> {
        let mut progress = self.lock_checked("waiting for completion")?;

        while progress.in_flight > 0 {
            let (guard, timeout) = self
                .shared
                .idle
                .wait_timeout(progress, poll_interval)
                .map_err(|_| TaskgraphError::LockPoisoned("waiting for completion"))?;
            progress = guard;

            if timeout.timed_out() {
                trace!(
                    in_flight = progress.in_flight,
                    completed = progress.completed,
                    "still waiting for in-flight tasks"
                );
            }
        }

        Ok(())
    }

    fn lock_checked(&self, what: &'static str) -> Result<MutexGuard<'_, Progress>> {
        self.shared
            .progress
            .lock()
            .map_err(|_| TaskgraphError::LockPoisoned(what))
    }

    /// Lock for pool-thread callbacks, which have nobody to report to.
    fn lock_recovering(&self) -> MutexGuard<'_, Progress> {
        self.shared.progress.lock().unwrap_or_else(|poisoned| {
            error!("completion tracker lock poisoned; continuing with recovered state");
            PoisonError::into_inner(poisoned)
        })
    }

    fn release(&self, mut progress: MutexGuard<'_, Progress>, task: &str) {
        progress.completed += 1;
        match progress.in_flight.checked_sub(1) {
            Some(remaining) => progress.in_flight = remaining,
            None => warn!(task = %task, "completion reported with nothing in flight"),
        }

        if progress.in_flight == 0 {
            debug!(
                completed = progress.completed,
                failed = progress.failures.len(),
                "no tasks left in flight; waking waiters"
            );
            self.shared.idle.notify_all();
        }
    }
}

impl CompletionListener for CompletionTracker {
    fn on_submitted(&self, task: &str) {
        let mut progress = self.lock_recovering();
        progress.in_flight += 1;
        trace!(task = %task, in_flight = progress.in_flight, "task submitted");
    }

    fn on_completed(&self, task: &str) {
        let progress = self.lock_recovering();
        self.release(progress, task);
    }

    fn on_failed(&self, failure: TaskFailure) {
        let mut progress = self.lock_recovering();
        let task = failure.task.clone();
        progress.failures.push(failure);
        self.release(progress, &task);
    }
}
