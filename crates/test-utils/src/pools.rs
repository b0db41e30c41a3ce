//! Worker pools for tests.
//!
//! None of these bound parallelism; they exist to make scheduling
//! observable or deterministic without a real thread pool.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use taskgraph::exec::{Job, WorkerPool};

/// Runs every job immediately on the submitting thread.
#[derive(Debug, Default)]
pub struct InlinePool {
    executed: AtomicUsize,
}

impl InlinePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

impl WorkerPool for InlinePool {
    fn execute(&self, job: Job) {
        self.executed.fetch_add(1, Ordering::SeqCst);
        job();
    }
}

/// Spawns a fresh OS thread per job.
#[derive(Debug, Default)]
pub struct ThreadPerJobPool {
    spawned: AtomicUsize,
}

impl ThreadPerJobPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl WorkerPool for ThreadPerJobPool {
    fn execute(&self, job: Job) {
        let id = self.spawned.fetch_add(1, Ordering::SeqCst);
        thread::Builder::new()
            .name(format!("test-worker-{id}"))
            .spawn(job)
            .expect("failed to spawn test worker thread");
    }
}

/// Drops every job without running it, like a pool that is shutting down.
#[derive(Debug, Default)]
pub struct DroppingPool {
    dropped: AtomicUsize,
}

impl DroppingPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl WorkerPool for DroppingPool {
    fn execute(&self, job: Job) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
        drop(job);
    }
}

/// Queues jobs until the test runs them one at a time.
#[derive(Default)]
pub struct ManualPool {
    queue: Mutex<VecDeque<Job>>,
    queued: Condvar,
}

impl ManualPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Run the oldest queued job on the current thread.
    ///
    /// Returns `false` if nothing was queued.
    pub fn run_next(&self) -> bool {
        let job = self.queue.lock().unwrap().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Block until at least `count` jobs are queued, or `timeout` passes.
    pub fn wait_for_queued(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock().unwrap();
        while queue.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            queue = self.queued.wait_timeout(queue, deadline - now).unwrap().0;
        }
        true
    }
}

impl WorkerPool for ManualPool {
    fn execute(&self, job: Job) {
        self.queue.lock().unwrap().push_back(job);
        self.queued.notify_all();
    }
}
