// src/watch/mod.rs

//! File watching.
//!
//! This module ties filesystem events to task re-runs:
//! - [`binding`] relates one compiled pattern group to the steps it re-runs.
//! - [`batch`] coalesces bursts of events per binding into one change batch.
//! - [`watcher`] owns the `notify` watcher, routes events to bindings and
//!   manages start/stop.

pub mod batch;
pub mod binding;
pub mod watcher;

pub use batch::{ChangeBatch, ChangeEvent, ChangeKind};
pub use binding::{BindingId, WatchBinding};
pub use watcher::WatchCoordinator;

use crate::dag::BoxFuture;
use crate::errors::Result;

/// Whatever runs the steps of a change batch (normally the orchestrator).
///
/// Errors are logged by the caller; they never stop the watcher.
pub trait RebuildTarget: Send + Sync {
    fn rebuild(&self, batch: ChangeBatch) -> BoxFuture<'static, Result<()>>;
}
