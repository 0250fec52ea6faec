// src/exec/mod.rs

//! Build task actions.
//!
//! - [`file_task`] runs one pattern set through a pipeline into the
//!   destination root, one concurrent sub-task per pattern group.
//! - [`clean`] deletes files selected by a pattern set.
//! - [`builtin`] declares the standard task table and watch bindings.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::BuildConfig;
use crate::fs::FileSystem;

pub mod builtin;
pub mod clean;
pub mod file_task;

pub use builtin::{default_watch_bindings, register_builtin_tasks, WatchBindingSpec};
pub use clean::CleanTask;
pub use file_task::FileTask;

/// Everything a task action sees: the configuration snapshot of the run that
/// started it, the file system, and the working directory that `src`, `dest`
/// and clean patterns are relative to.
#[derive(Clone)]
pub struct TaskContext {
    pub config: Arc<BuildConfig>,
    pub fs: Arc<dyn FileSystem>,
    pub cwd: PathBuf,
}

impl TaskContext {
    pub fn new(config: Arc<BuildConfig>, fs: Arc<dyn FileSystem>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            config,
            fs,
            cwd: cwd.into(),
        }
    }

    pub fn src_root(&self) -> PathBuf {
        self.config.src_root(&self.cwd)
    }

    pub fn dest_root(&self) -> PathBuf {
        self.config.dest_root(&self.cwd)
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("profile", &self.config.active_profile())
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}
