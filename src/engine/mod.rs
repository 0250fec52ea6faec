// src/engine/mod.rs

//! Orchestration engine.
//!
//! [`Orchestrator`] ties together:
//! - the live configuration and the snapshot new runs are started with
//! - the task scheduler
//! - the watch coordinator, for which it is the rebuild target
//! - the `watch` and `serve` commands

pub mod orchestrator;

pub use orchestrator::{Orchestrator, SERVE_COMMAND, SERVE_PROFILE, WATCH_COMMAND};
