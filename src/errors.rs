// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::dag::TaskHandle;

#[derive(Error, Debug)]
pub enum TaskgraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A handle that was not issued by this manager.
    #[error("Unknown task handle: {0}")]
    UnknownHandle(TaskHandle),

    /// The graph has already been handed to the worker pool.
    #[error("Task graph has already been started; it can no longer be modified or re-run")]
    AlreadyStarted,

    /// A thread panicked while holding the completion lock, so the
    /// in-flight bookkeeping can no longer be trusted.
    #[error("Completion tracker lock poisoned while {0}")]
    LockPoisoned(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TaskgraphError>;
