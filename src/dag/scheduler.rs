// src/dag/scheduler.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::registry::TaskRegistry;
use crate::dag::state_manager::RunPlan;
use crate::dag::task::{BoxFuture, Completion, Step, TaskKind, TaskName};
use crate::errors::{BuildError, Result};
use crate::exec::TaskContext;

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Tasks in completion order.
    pub completed: Vec<TaskName>,
    /// Work units (written files) reported through task streams.
    pub units: usize,
}

impl RunReport {
    fn merge(&mut self, other: RunReport) {
        self.completed.extend(other.completed);
        self.units += other.units;
    }
}

/// Runs tasks from a validated registry.
///
/// Cheap to clone; clones share the registry and the run counter.
#[derive(Debug, Clone)]
pub struct Scheduler {
    registry: Arc<TaskRegistry>,
    graph: Arc<DagGraph>,
    run_counter: Arc<AtomicU64>,
}

impl Scheduler {
    /// Validate the registry and wrap it.
    pub fn new(registry: TaskRegistry) -> Result<Self> {
        registry.validate()?;
        let graph = DagGraph::from_registry(&registry);
        Ok(Self {
            registry: Arc::new(registry),
            graph: Arc::new(graph),
            run_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Run the named tasks and their predecessors.
    ///
    /// Independent tasks run concurrently; a task starts only after all of
    /// its predecessors completed. After the first failure nothing new is
    /// started, tasks already running are left to finish, and the failure
    /// is returned.
    pub fn run<'a>(&'a self, ctx: &'a TaskContext, names: &'a [TaskName]) -> BoxFuture<'a, Result<RunReport>> {
        Box::pin(async move {
            let run_id = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
            let mut plan = RunPlan::new(&self.graph, names, run_id)?;
            info!(run_id, targets = ?names, "run started");

            let mut set: JoinSet<(TaskName, Result<usize>)> = JoinSet::new();
            let mut report = RunReport::default();
            let mut first_error: Option<BuildError> = None;

            loop {
                for name in plan.collect_ready() {
                    self.spawn_task(&mut set, ctx, name)?;
                }

                if plan.is_finished() {
                    break;
                }

                let Some(joined) = set.join_next().await else {
                    break;
                };

                match joined {
                    Ok((name, Ok(units))) => {
                        plan.mark_completed(&name);
                        report.completed.push(name);
                        report.units += units;
                    }
                    Ok((name, Err(err))) => {
                        error!(task = %name, run_id, error = %err, "task failed");
                        let blocked = plan.mark_failed(&name);
                        if !blocked.is_empty() {
                            warn!(task = %name, blocked = ?blocked, "dependents will not run");
                        }
                        if first_error.is_none() {
                            first_error = Some(attribute(&name, err));
                        }
                    }
                    Err(join_err) => {
                        error!(run_id, error = %join_err, "task panicked");
                        plan.halt();
                        if first_error.is_none() {
                            first_error = Some(BuildError::Other(anyhow!("task panicked: {join_err}")));
                        }
                    }
                }
            }

            // Let anything still in flight finish before reporting.
            while let Some(joined) = set.join_next().await {
                if let Ok((name, Ok(units))) = joined {
                    report.completed.push(name);
                    report.units += units;
                }
            }

            match first_error {
                Some(err) => {
                    let skipped = plan.skipped();
                    if !skipped.is_empty() {
                        info!(run_id, skipped = ?skipped, "tasks not started");
                    }
                    Err(err)
                }
                None => {
                    info!(run_id, tasks = report.completed.len(), units = report.units, "run finished");
                    Ok(report)
                }
            }
        })
    }

    /// Run steps strictly left to right. Members of a group run
    /// concurrently; the next step starts only when the whole group is done.
    /// The first failing step aborts the sequence.
    pub fn run_sequence<'a>(&'a self, ctx: &'a TaskContext, steps: &'a [Step]) -> BoxFuture<'a, Result<RunReport>> {
        Box::pin(async move {
            let mut report = RunReport::default();
            for (idx, step) in steps.iter().enumerate() {
                debug!(step = idx, members = %step, "sequence step");
                let names = step.names();
                if names.is_empty() {
                    continue;
                }
                match self.run(ctx, names).await {
                    Ok(r) => report.merge(r),
                    Err(err) => {
                        warn!(step = idx, members = %step, "sequence aborted");
                        return Err(err);
                    }
                }
            }
            Ok(report)
        })
    }

    fn spawn_task(
        &self,
        set: &mut JoinSet<(TaskName, Result<usize>)>,
        ctx: &TaskContext,
        name: TaskName,
    ) -> Result<()> {
        let def = self
            .registry
            .get(&name)
            .ok_or_else(|| BuildError::TaskNotFound(name.clone()))?;

        let ctx = ctx.clone();
        match &def.kind {
            TaskKind::Action(action) => {
                let fut = action.run(ctx);
                set.spawn(async move {
                    let result = match fut.await {
                        Ok(completion) => drain(&name, completion).await,
                        Err(err) => Err(err),
                    };
                    (name, result)
                });
            }
            TaskKind::Sequence(steps) => {
                let steps = steps.clone();
                let sched = self.clone();
                set.spawn(async move {
                    let result = sched.run_sequence(&ctx, &steps).await.map(|r| r.units);
                    (name, result)
                });
            }
        }
        Ok(())
    }
}

/// Wait for a task's completion signal; returns the number of work units.
async fn drain(task: &str, completion: Completion) -> Result<usize> {
    match completion {
        Completion::Done => {
            debug!(task = %task, "task done without a stream");
            Ok(0)
        }
        Completion::Stream(mut rx) => {
            let mut units = 0;
            while let Some(item) = rx.recv().await {
                let path = item?;
                debug!(task = %task, path = %path.display(), "unit done");
                units += 1;
            }
            Ok(units)
        }
    }
}

/// Keep the innermost attribution when a nested sequence already named the
/// failing task.
fn attribute(task: &str, err: BuildError) -> BuildError {
    match err {
        BuildError::TaskFailed { .. } => err,
        other => BuildError::task_failed(task, other),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::config::RawConfig;
    use crate::fs::mock::MockFileSystem;

    fn ctx() -> TaskContext {
        let cfg = RawConfig::parse("src = \"webapp/\"\ndest = \"target/app/\"\n")
            .unwrap()
            .snapshot()
            .unwrap();
        TaskContext::new(cfg, Arc::new(MockFileSystem::new()), "/w")
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn logging_task(log: &Log, name: &'static str, fail: bool) -> impl Fn(TaskContext) -> BoxFuture<'static, Result<Completion>> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_ctx| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(format!("start:{name}"));
                tokio::time::sleep(Duration::from_millis(5)).await;
                log.lock().unwrap().push(format!("end:{name}"));
                if fail {
                    Err(BuildError::Other(anyhow!("{name} broke")))
                } else {
                    Ok(Completion::Done)
                }
            })
        }
    }

    fn pos(log: &[String], entry: &str) -> Option<usize> {
        log.iter().position(|e| e == entry)
    }

    #[tokio::test]
    async fn sequence_steps_do_not_overlap() {
        let log: Log = Arc::default();
        let mut reg = TaskRegistry::new();
        reg.declare("clean", &[], logging_task(&log, "clean", false))
            .declare("a", &[], logging_task(&log, "a", false))
            .declare("b", &[], logging_task(&log, "b", false));
        reg.declare_sequence("all", vec![Step::from("clean"), Step::group(["a", "b"])]);

        let sched = Scheduler::new(reg).unwrap();
        let report = sched.run(&ctx(), &["all".to_string()]).await.unwrap();

        let log = log.lock().unwrap().clone();
        let clean_end = pos(&log, "end:clean").unwrap();
        assert!(clean_end < pos(&log, "start:a").unwrap());
        assert!(clean_end < pos(&log, "start:b").unwrap());
        assert_eq!(report.completed.last().map(String::as_str), Some("all"));
    }

    #[tokio::test]
    async fn failing_step_aborts_the_sequence() {
        let log: Log = Arc::default();
        let mut reg = TaskRegistry::new();
        reg.declare("bad", &[], logging_task(&log, "bad", true))
            .declare("later", &[], logging_task(&log, "later", false));
        reg.declare_sequence("seq", vec![Step::from("bad"), Step::from("later")]);

        let sched = Scheduler::new(reg).unwrap();
        let err = sched.run(&ctx(), &["seq".to_string()]).await.unwrap_err();

        assert_eq!(err.failed_task(), Some("bad"));
        assert!(pos(&log.lock().unwrap(), "start:later").is_none());
    }

    #[tokio::test]
    async fn empty_stream_and_no_stream_both_succeed() {
        let mut reg = TaskRegistry::new();
        reg.declare("none", &[], |_ctx: TaskContext| async { Ok::<_, BuildError>(Completion::Done) })
            .declare("empty", &[], |_ctx: TaskContext| async {
                let (_tx, rx) = tokio::sync::mpsc::channel(1);
                Ok::<_, BuildError>(Completion::Stream(rx))
            });

        let sched = Scheduler::new(reg).unwrap();
        let report = sched
            .run(&ctx(), &["none".to_string(), "empty".to_string()])
            .await
            .unwrap();
        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.units, 0);
    }

    #[tokio::test]
    async fn error_in_stream_fails_the_task() {
        let mut reg = TaskRegistry::new();
        reg.declare("streamy", &[], |_ctx: TaskContext| async {
            let (tx, rx) = tokio::sync::mpsc::channel(4);
            tx.send(Ok("out/a.js".into())).await.ok();
            tx.send(Err(BuildError::PatternError("bad glob".into()))).await.ok();
            Ok::<_, BuildError>(Completion::Stream(rx))
        });

        let sched = Scheduler::new(reg).unwrap();
        let err = sched.run(&ctx(), &["streamy".to_string()]).await.unwrap_err();
        assert_eq!(err.failed_task(), Some("streamy"));
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let sched = Scheduler::new(TaskRegistry::new()).unwrap();
        let err = sched.run(&ctx(), &["ghost".to_string()]).await.unwrap_err();
        assert!(matches!(err, BuildError::TaskNotFound(_)));
    }
}
