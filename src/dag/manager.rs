// src/dag/manager.rs

//! Registry and single-shot driver for a task graph.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dag::execution::{self, RunContext};
use crate::dag::node::{TaskHandle, TaskNode, TaskState};
use crate::dag::tracker::CompletionTracker;
use crate::dag::{Action, TaskFailure, TaskName};
use crate::errors::{Result, TaskgraphError};
use crate::exec::WorkerPool;

/// Default bound on a single condvar wait inside [`TaskManager::run_and_wait`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Where a manager is in its one-shot lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No nodes registered yet.
    Idle,
    /// At least one node registered, not started.
    Built,
    /// `run_and_wait` has been called and has not returned.
    Running,
    /// `run_and_wait` returned.
    Done,
}

enum Graph {
    Building(Vec<TaskNode>),
    Started(Arc<RunContext>),
}

/// Builds a graph of named tasks and runs it once on a worker pool.
///
/// Registration happens through `&mut self`, so building is single-threaded
/// by construction. [`run_and_wait`](Self::run_and_wait) freezes the nodes
/// into a shared arena, submits every root and blocks until nothing is left
/// in flight. Individual task failures never abort the run; they are
/// collected and returned.
pub struct TaskManager {
    pool: Arc<dyn WorkerPool>,
    registry: HashMap<TaskName, TaskHandle>,
    names: Vec<TaskName>,
    roots: Vec<TaskHandle>,
    tracker: CompletionTracker,
    poll_interval: Duration,
    graph: Graph,
    finished: bool,
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("tasks", &self.names)
            .field("roots", &self.roots)
            .field("phase", &self.phase())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl TaskManager {
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            pool,
            registry: HashMap::new(),
            names: Vec::new(),
            roots: Vec::new(),
            tracker: CompletionTracker::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            graph: Graph::Building(Vec::new()),
            finished: false,
        }
    }

    /// Override the bounded wait used while blocking in `run_and_wait`.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Return the node registered as `name`, creating it if needed.
    ///
    /// When the node already exists, `action` is dropped and only the new
    /// `prerequisites` are added. A node created with no prerequisites joins
    /// the root set and is submitted first when the run starts.
    pub fn get_or_create<F>(
        &mut self,
        name: impl Into<TaskName>,
        action: F,
        prerequisites: &[TaskHandle],
    ) -> Result<TaskHandle>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let name = name.into();
        let node_count = self.building_nodes()?.len();
        check_handles(node_count, prerequisites)?;

        let handle = match self.registry.get(&name) {
            Some(&existing) => {
                debug!(task = %name, "task already registered; reusing it");
                existing
            }
            None => self.create(name, Box::new(action), prerequisites.is_empty())?,
        };

        if !prerequisites.is_empty() {
            self.add_prerequisites(handle, prerequisites)?;
        }
        Ok(handle)
    }

    /// Add prerequisite edges to an already registered node.
    ///
    /// Each prerequisite records `node` as its dependent. Re-adding an edge
    /// that already exists is a no-op. Edges are not checked for cycles;
    /// nodes on a cycle are never submitted.
    pub fn add_prerequisites(
        &mut self,
        node: TaskHandle,
        prerequisites: &[TaskHandle],
    ) -> Result<()> {
        let nodes = self.building_nodes()?;
        check_handles(nodes.len(), &[node])?;
        check_handles(nodes.len(), prerequisites)?;

        for &prerequisite in prerequisites {
            if !nodes[node.index()].add_prerequisite(prerequisite) {
                continue;
            }
            nodes[prerequisite.index()].add_dependent(node);
            debug!(
                task = %nodes[node.index()].name(),
                prerequisite = %nodes[prerequisite.index()].name(),
                "added prerequisite edge"
            );
        }

        Ok(())
    }

    /// Submit every root to the pool and block until all submitted work,
    /// including dependents submitted along the way, has completed.
    ///
    /// Returns the failure list in completion order. Nodes that were never
    /// released by their prerequisites (for example nodes on a cycle) are not
    /// failures; they show up only as a `warn!` and as a non-terminal
    /// [`state_of`](Self::state_of). A manager runs its
    /// graph exactly once; later calls fail with
    /// [`TaskgraphError::AlreadyStarted`].
    pub fn run_and_wait(&mut self) -> Result<Vec<TaskFailure>> {
        let nodes = match &mut self.graph {
            Graph::Building(nodes) => std::mem::take(nodes),
            Graph::Started(_) => return Err(TaskgraphError::AlreadyStarted),
        };

        let listener = Arc::new(self.tracker.clone());
        let ctx = Arc::new(RunContext::new(nodes, Arc::clone(&self.pool), listener));
        self.graph = Graph::Started(Arc::clone(&ctx));

        // Roots that picked up prerequisites after creation are started by
        // those prerequisites instead.
        let frontier: Vec<TaskHandle> = self
            .roots
            .iter()
            .copied()
            .filter(|&root| {
                let waiting = ctx.node(root).pending_prerequisites() > 0;
                if waiting {
                    debug!(
                        task = %ctx.node(root).name(),
                        "root gained prerequisites after creation; not seeding it"
                    );
                }
                !waiting
            })
            .collect();

        info!(
            tasks = ctx.nodes().len(),
            roots = frontier.len(),
            "starting task graph"
        );

        for root in frontier {
            if execution::reserve(&ctx, root) {
                execution::dispatch(&ctx, root);
            }
        }

        self.tracker.wait_until_idle(self.poll_interval)?;
        self.finished = true;

        let failures = self.tracker.failures()?;
        let stalled = ctx
            .nodes()
            .iter()
            .filter(|node| !node.state().is_terminal())
            .count();
        if stalled > 0 {
            warn!(stalled, "task graph finished with tasks that never became eligible");
        }

        info!(
            tasks = ctx.nodes().len(),
            failed = failures.len(),
            "task graph finished"
        );
        Ok(failures)
    }

    /// Snapshot of the failures recorded so far.
    pub fn get_failures(&self) -> Result<Vec<TaskFailure>> {
        self.tracker.failures()
    }

    /// Handle onto the in-flight counter and failure list that stays usable
    /// from other threads while `run_and_wait` blocks.
    pub fn tracker(&self) -> CompletionTracker {
        self.tracker.clone()
    }

    pub fn phase(&self) -> RunPhase {
        match &self.graph {
            Graph::Building(nodes) if nodes.is_empty() => RunPhase::Idle,
            Graph::Building(_) => RunPhase::Built,
            Graph::Started(_) if self.finished => RunPhase::Done,
            Graph::Started(_) => RunPhase::Running,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn handle_of(&self, name: &str) -> Option<TaskHandle> {
        self.registry.get(name).copied()
    }

    pub fn name_of(&self, handle: TaskHandle) -> Option<&str> {
        self.names.get(handle.index()).map(String::as_str)
    }

    /// Nodes created without prerequisites, in creation order.
    pub fn roots(&self) -> &[TaskHandle] {
        &self.roots
    }

    pub fn state_of(&self, handle: TaskHandle) -> Option<TaskState> {
        self.node(handle).map(TaskNode::state)
    }

    pub fn pending_prerequisites_of(&self, handle: TaskHandle) -> Option<usize> {
        self.node(handle).map(TaskNode::pending_prerequisites)
    }

    pub fn prerequisites_of(&self, handle: TaskHandle) -> Option<&[TaskHandle]> {
        self.node(handle).map(TaskNode::prerequisites)
    }

    pub fn dependents_of(&self, handle: TaskHandle) -> Option<&[TaskHandle]> {
        self.node(handle).map(TaskNode::dependents)
    }

    fn node(&self, handle: TaskHandle) -> Option<&TaskNode> {
        let nodes = match &self.graph {
            Graph::Building(nodes) => nodes.as_slice(),
            Graph::Started(ctx) => ctx.nodes(),
        };
        nodes.get(handle.index())
    }

    fn building_nodes(&mut self) -> Result<&mut Vec<TaskNode>> {
        match &mut self.graph {
            Graph::Building(nodes) => Ok(nodes),
            Graph::Started(_) => Err(TaskgraphError::AlreadyStarted),
        }
    }

    fn create(&mut self, name: TaskName, action: Action, is_root: bool) -> Result<TaskHandle> {
        let nodes = self.building_nodes()?;
        let handle = TaskHandle(nodes.len());
        nodes.push(TaskNode::new(name.clone(), action));

        if is_root {
            self.roots.push(handle);
        }
        debug!(task = %name, %handle, root = is_root, "registered task");

        self.registry.insert(name.clone(), handle);
        self.names.push(name);
        Ok(handle)
    }
}

fn check_handles(node_count: usize, handles: &[TaskHandle]) -> Result<()> {
    match handles.iter().find(|h| h.index() >= node_count) {
        Some(&unknown) => Err(TaskgraphError::UnknownHandle(unknown)),
        None => Ok(()),
    }
}
