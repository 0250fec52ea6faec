// src/dag/task.rs

//! Task definitions: actions, completion signals and sequence steps.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::errors::Result;
use crate::exec::TaskContext;

pub type TaskName = String;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a task signals that its work is done.
///
/// A task that decided it has nothing to do returns [`Completion::Done`]; a
/// task that hands back a stream of work units is done once the stream is
/// exhausted. The scheduler treats both as success. An `Err` item in the
/// stream fails the task.
#[derive(Debug)]
pub enum Completion {
    Done,
    Stream(mpsc::Receiver<Result<PathBuf>>),
}

/// The executable part of a task.
pub trait TaskAction: Send + Sync {
    fn run(&self, ctx: TaskContext) -> BoxFuture<'static, Result<Completion>>;
}

impl<F, Fut> TaskAction for F
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Completion>> + Send + 'static,
{
    fn run(&self, ctx: TaskContext) -> BoxFuture<'static, Result<Completion>> {
        Box::pin(self(ctx))
    }
}

/// One position in a task sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Task(TaskName),
    /// Members run concurrently; the step is done when all of them are.
    Group(Vec<TaskName>),
}

impl Step {
    pub fn group<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Step::Group(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[TaskName] {
        match self {
            Step::Task(name) => std::slice::from_ref(name),
            Step::Group(names) => names,
        }
    }
}

impl From<&str> for Step {
    fn from(name: &str) -> Self {
        Step::Task(name.to_string())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Task(name) => f.write_str(name),
            Step::Group(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

#[derive(Clone)]
pub enum TaskKind {
    Action(Arc<dyn TaskAction>),
    /// Runs the given steps through the scheduler's sequence runner.
    Sequence(Vec<Step>),
}

/// A declared task.
#[derive(Clone)]
pub struct TaskDef {
    pub name: TaskName,
    pub predecessors: Vec<TaskName>,
    pub kind: TaskKind,
}

impl fmt::Debug for TaskDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            TaskKind::Action(_) => "action".to_string(),
            TaskKind::Sequence(steps) => {
                let steps: Vec<String> = steps.iter().map(ToString::to_string).collect();
                format!("sequence({})", steps.join(" -> "))
            }
        };
        f.debug_struct("TaskDef")
            .field("name", &self.name)
            .field("predecessors", &self.predecessors)
            .field("kind", &kind)
            .finish()
    }
}

/// Per-run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Part of the run, waiting on predecessors.
    Pending,
    Running,
    Completed,
    /// Failed itself, or blocked by a failed predecessor.
    Failed,
}

/// Public view of a task's state within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    NotInRun,
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::Completed) => TaskRunState::Completed,
            Some(RunState::Failed) => TaskRunState::Failed,
        }
    }
}
