// src/dag/execution.rs

//! Glue between graph nodes and the worker pool.
//!
//! A node is submitted in two halves: [`reserve`] claims the node and counts
//! it as in flight, [`dispatch`] hands the wrapped action to the pool. The
//! completion path reserves newly eligible dependents *before* releasing the
//! finished node's own slot, so the in-flight count cannot touch zero while
//! work is still about to be queued.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::node::{TaskHandle, TaskNode};
use crate::dag::{Action, CompletionListener, FailureCause, TaskFailure};
use crate::exec::WorkerPool;

/// Frozen graph plus the collaborators every job needs.
pub(crate) struct RunContext {
    nodes: Vec<TaskNode>,
    pool: Arc<dyn WorkerPool>,
    listener: Arc<dyn CompletionListener>,
}

impl RunContext {
    pub fn new(
        nodes: Vec<TaskNode>,
        pool: Arc<dyn WorkerPool>,
        listener: Arc<dyn CompletionListener>,
    ) -> Self {
        Self {
            nodes,
            pool,
            listener,
        }
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn node(&self, handle: TaskHandle) -> &TaskNode {
        &self.nodes[handle.index()]
    }
}

/// Claim `handle` for execution and count it as in flight.
///
/// Returns `false` if the node was already claimed.
pub(crate) fn reserve(ctx: &RunContext, handle: TaskHandle) -> bool {
    let node = ctx.node(handle);
    if !node.try_start() {
        warn!(
            task = %node.name(),
            state = ?node.state(),
            "task already started; refusing to submit it twice"
        );
        return false;
    }

    ctx.listener.on_submitted(node.name());
    true
}

/// Hand a reserved node to the pool. Returns immediately.
pub(crate) fn dispatch(ctx: &Arc<RunContext>, handle: TaskHandle) {
    debug!(task = %ctx.node(handle).name(), "dispatching task to worker pool");

    let job = NodeJob {
        ctx: Arc::clone(ctx),
        handle,
        finished: false,
    };
    ctx.pool.execute(Box::new(move || job.run()));
}

/// Pool job for one node.
///
/// If the pool drops the job without running it, `Drop` still completes the
/// node as abandoned so that dependents and the waiter are not left hanging.
struct NodeJob {
    ctx: Arc<RunContext>,
    handle: TaskHandle,
    finished: bool,
}

impl NodeJob {
    fn run(mut self) {
        let node = self.ctx.node(self.handle);
        debug!(task = %node.name(), "task started");

        let outcome = match node.take_action() {
            Some(action) => invoke(action),
            None => Err(FailureCause::Failed("action was already consumed".to_string())),
        };

        self.finished = true;
        complete(&self.ctx, self.handle, outcome);
    }
}

impl Drop for NodeJob {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(
            task = %self.ctx.node(self.handle).name(),
            "worker pool dropped task without running it"
        );
        self.finished = true;
        complete(&self.ctx, self.handle, Err(FailureCause::Abandoned));
    }
}

fn invoke(action: Action) -> Result<(), FailureCause> {
    match panic::catch_unwind(AssertUnwindSafe(action)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(FailureCause::Failed(format!("{err:#}"))),
        Err(payload) => Err(FailureCause::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Record the outcome, notify the listener, then submit any dependent whose
/// last prerequisite this was.
fn complete(ctx: &Arc<RunContext>, handle: TaskHandle, outcome: Result<(), FailureCause>) {
    let node = ctx.node(handle);
    node.finish(outcome.is_ok());

    // Reserved now, dispatched only after the listener has the outcome.
    let mut eligible = Vec::new();
    for &dependent in node.dependents() {
        if ctx.node(dependent).release_prerequisite() && reserve(ctx, dependent) {
            eligible.push(dependent);
        }
    }

    match outcome {
        Ok(()) => {
            info!(task = %node.name(), "task completed");
            ctx.listener.on_completed(node.name());
        }
        Err(cause) => {
            warn!(task = %node.name(), error = %cause, "task failed");
            ctx.listener.on_failed(TaskFailure::new(node.name(), cause));
        }
    }

    for dependent in eligible {
        dispatch(ctx, dependent);
    }
}
