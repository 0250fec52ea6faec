// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pattern error: {0}")]
    PatternError(String),

    #[error("Task '{task}' failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    /// Name of the task a failure is attributed to, if any.
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            BuildError::TaskFailed { task, .. } => Some(task),
            _ => None,
        }
    }

    pub(crate) fn task_failed(task: impl Into<String>, reason: impl ToString) -> Self {
        BuildError::TaskFailed {
            task: task.into(),
            reason: reason.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
