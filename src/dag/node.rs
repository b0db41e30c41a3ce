// src/dag/node.rs

//! A single schedulable unit of work plus its dependency edges.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::dag::{Action, TaskName};

/// Index of a node inside its manager's arena.
///
/// Handles are only meaningful for the [`TaskManager`](crate::dag::TaskManager)
/// that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub(crate) usize);

impl TaskHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered, no prerequisites recorded.
    Created,
    /// Registered with at least one prerequisite edge.
    Waiting,
    /// Handed to the worker pool (or about to be).
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }

    fn as_u8(self) -> u8 {
        match self {
            TaskState::Created => 0,
            TaskState::Waiting => 1,
            TaskState::Running => 2,
            TaskState::Succeeded => 3,
            TaskState::Failed => 4,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Created,
            1 => TaskState::Waiting,
            2 => TaskState::Running,
            3 => TaskState::Succeeded,
            _ => TaskState::Failed,
        }
    }
}

/// Arena entry for one task.
///
/// Edges are plain handle lists in both directions; neither direction owns
/// the other node. During graph building the manager has `&mut` access and
/// mutates edges freely. Once the run starts the node is shared read-only
/// with pool threads and only the atomics and the action slot change.
pub struct TaskNode {
    name: TaskName,
    action: Mutex<Option<Action>>,
    prerequisites: Vec<TaskHandle>,
    dependents: Vec<TaskHandle>,
    pending: AtomicUsize,
    state: AtomicU8,
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("name", &self.name)
            .field("prerequisites", &self.prerequisites)
            .field("dependents", &self.dependents)
            .field("pending", &self.pending_prerequisites())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TaskNode {
    pub(crate) fn new(name: TaskName, action: Action) -> Self {
        Self {
            name,
            action: Mutex::new(Some(action)),
            prerequisites: Vec::new(),
            dependents: Vec::new(),
            pending: AtomicUsize::new(0),
            state: AtomicU8::new(TaskState::Created.as_u8()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prerequisites(&self) -> &[TaskHandle] {
        &self.prerequisites
    }

    pub fn dependents(&self) -> &[TaskHandle] {
        &self.dependents
    }

    /// Number of prerequisites that have not completed yet.
    pub fn pending_prerequisites(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Record `prerequisite` as an edge into this node.
    ///
    /// Returns `false` if the edge already existed; the pending counter only
    /// grows for new edges.
    pub(crate) fn add_prerequisite(&mut self, prerequisite: TaskHandle) -> bool {
        if self.prerequisites.contains(&prerequisite) {
            return false;
        }
        self.prerequisites.push(prerequisite);
        *self.pending.get_mut() += 1;
        *self.state.get_mut() = TaskState::Waiting.as_u8();
        true
    }

    pub(crate) fn add_dependent(&mut self, dependent: TaskHandle) {
        if !self.dependents.contains(&dependent) {
            self.dependents.push(dependent);
        }
    }

    /// Move to `Running`. Only the first caller wins.
    pub(crate) fn try_start(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match TaskState::from_u8(raw) {
                    TaskState::Created | TaskState::Waiting => Some(TaskState::Running.as_u8()),
                    _ => None,
                }
            })
            .is_ok()
    }

    pub(crate) fn finish(&self, succeeded: bool) {
        let state = if succeeded {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// One prerequisite completed. Returns `true` when this was the last one.
    pub(crate) fn release_prerequisite(&self) -> bool {
        match self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous == 1,
            Err(_) => {
                warn!(
                    task = %self.name,
                    "prerequisite released on a node with no pending prerequisites"
                );
                false
            }
        }
    }

    pub(crate) fn take_action(&self) -> Option<Action> {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
