// src/dag/mod.rs

//! Task graph and scheduling.
//!
//! - [`task`] defines task actions, completion signals and sequence steps.
//! - [`registry`] is the static table of declared tasks and its validation.
//! - [`graph`] holds predecessor/dependent adjacency and the cycle check.
//! - [`state_manager`] is the per-run state machine
//!   (`Pending -> Running -> Completed | Failed`).
//! - [`scheduler`] drives runs and sequences on the tokio runtime.

pub mod graph;
pub mod registry;
pub mod scheduler;
pub mod state_manager;
pub mod task;

pub use graph::DagGraph;
pub use registry::TaskRegistry;
pub use scheduler::{RunReport, Scheduler};
pub use state_manager::RunPlan;
pub use task::{BoxFuture, Completion, Step, TaskAction, TaskDef, TaskKind, TaskName, TaskRunState};
