// src/dag/state_manager.rs

//! Per-run state machine: which tasks are part of a run, which are ready,
//! and what a failure takes down with it.
//!
//! This is pure bookkeeping with no IO so it can be stepped by hand in tests;
//! [`crate::dag::Scheduler`] drives it from the async side.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::task::{RunState, TaskName, TaskRunState};
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct RunPlan {
    run_id: u64,
    states: BTreeMap<TaskName, RunState>,
    deps: BTreeMap<TaskName, Vec<TaskName>>,
    dependents: BTreeMap<TaskName, Vec<TaskName>>,
    /// Set by the first failure; nothing new is dispatched afterwards.
    halted: bool,
}

impl RunPlan {
    /// Include the targets and all their transitive predecessors, all
    /// `Pending`.
    pub fn new(graph: &DagGraph, targets: &[TaskName], run_id: u64) -> Result<Self> {
        let members = graph.closure_of(targets)?;

        let mut states = BTreeMap::new();
        let mut deps = BTreeMap::new();
        let mut dependents = BTreeMap::new();
        for name in &members {
            states.insert(name.clone(), RunState::Pending);
            deps.insert(name.clone(), graph.dependencies_of(name).to_vec());
            dependents.insert(
                name.clone(),
                graph
                    .dependents_of(name)
                    .iter()
                    .filter(|d| members.contains(*d))
                    .cloned()
                    .collect(),
            );
        }

        debug!(run_id, tasks = ?members, "planned run");

        Ok(Self {
            run_id,
            states,
            deps,
            dependents,
            halted: false,
        })
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn state_of(&self, task: &str) -> TaskRunState {
        self.states.get(task).copied().into()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn deps_completed(&self, task: &str) -> bool {
        self.deps.get(task).is_none_or(|deps| {
            deps.iter()
                .all(|d| matches!(self.states.get(d), Some(RunState::Completed)))
        })
    }

    /// Mark every `Pending` task whose predecessors have all completed as
    /// `Running` and return them, in name order. Returns nothing once the
    /// run is halted.
    pub fn collect_ready(&mut self) -> Vec<TaskName> {
        if self.halted {
            return Vec::new();
        }

        let ready: Vec<TaskName> = self
            .states
            .iter()
            .filter(|(name, state)| **state == RunState::Pending && self.deps_completed(name))
            .map(|(name, _)| name.clone())
            .collect();

        for name in &ready {
            info!(task = %name, run_id = self.run_id, "starting task");
            self.states.insert(name.clone(), RunState::Running);
        }

        ready
    }

    pub fn mark_completed(&mut self, task: &str) {
        match self.states.get_mut(task) {
            Some(state) => {
                *state = RunState::Completed;
                debug!(task = %task, run_id = self.run_id, "task completed");
            }
            None => warn!(task = %task, "completion for task outside this run; ignoring"),
        }
    }

    /// Mark `task` failed, fail every dependent still waiting on it, and
    /// halt the run. Returns the dependents newly marked failed.
    pub fn mark_failed(&mut self, task: &str) -> Vec<TaskName> {
        if let Some(state) = self.states.get_mut(task) {
            *state = RunState::Failed;
        }
        self.halted = true;

        let mut stack: Vec<TaskName> = self.dependents.get(task).cloned().unwrap_or_default();
        let mut blocked = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(state) = self.states.get_mut(&name) {
                if *state == RunState::Pending {
                    *state = RunState::Failed;
                    debug!(task = %name, failed = %task, "blocked by failed predecessor");
                    blocked.push(name.clone());
                    stack.extend(self.dependents.get(&name).cloned().unwrap_or_default());
                }
            }
        }

        blocked
    }

    /// Stop dispatching without attributing the failure to a task.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn running(&self) -> usize {
        self.states.values().filter(|s| **s == RunState::Running).count()
    }

    /// Nothing is running and nothing more will be dispatched.
    pub fn is_finished(&self) -> bool {
        if self.running() > 0 {
            return false;
        }
        self.halted || !self.states.values().any(|s| *s == RunState::Pending)
    }

    /// Tasks that never started because the run halted.
    pub fn skipped(&self) -> Vec<TaskName> {
        self.states
            .iter()
            .filter(|(_, s)| **s == RunState::Pending)
            .map(|(n, _)| n.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::registry::TaskRegistry;
    use crate::dag::task::Completion;
    use crate::errors::BuildError;
    use crate::exec::TaskContext;

    async fn noop(_ctx: TaskContext) -> Result<Completion> {
        Ok(Completion::Done)
    }

    fn diamond() -> DagGraph {
        let mut reg = TaskRegistry::new();
        reg.declare("A", &[], noop)
            .declare("B", &["A"], noop)
            .declare("C", &["A"], noop)
            .declare("D", &["B", "C"], noop)
            .declare("E", &[], noop);
        DagGraph::from_registry(&reg)
    }

    fn names(v: &[&str]) -> Vec<TaskName> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diamond_runs_in_dependency_order() {
        let mut plan = RunPlan::new(&diamond(), &names(&["D"]), 1).unwrap();
        assert_eq!(plan.state_of("E"), TaskRunState::NotInRun);

        assert_eq!(plan.collect_ready(), names(&["A"]));
        assert!(plan.collect_ready().is_empty());

        plan.mark_completed("A");
        assert_eq!(plan.collect_ready(), names(&["B", "C"]));

        plan.mark_completed("B");
        assert!(plan.collect_ready().is_empty());
        plan.mark_completed("C");
        assert_eq!(plan.collect_ready(), names(&["D"]));

        plan.mark_completed("D");
        assert!(plan.is_finished());
        assert!(plan.skipped().is_empty());
    }

    #[test]
    fn failure_blocks_dependents_and_halts() {
        let mut plan = RunPlan::new(&diamond(), &names(&["D"]), 1).unwrap();
        plan.collect_ready();
        plan.mark_completed("A");
        plan.collect_ready();

        let blocked = plan.mark_failed("B");
        assert_eq!(blocked, names(&["D"]));
        assert_eq!(plan.state_of("D"), TaskRunState::Failed);

        // C is still running and is allowed to finish.
        assert!(!plan.is_finished());
        plan.mark_completed("C");
        assert!(plan.is_finished());
        assert!(plan.collect_ready().is_empty());
    }

    #[test]
    fn halted_run_skips_unrelated_pending_tasks() {
        let mut plan = RunPlan::new(&diamond(), &names(&["B", "E"]), 2).unwrap();
        assert_eq!(plan.collect_ready(), names(&["A", "E"]));
        plan.mark_failed("A");
        plan.mark_completed("E");
        assert!(plan.is_finished());
        assert!(plan.skipped().is_empty());
        assert_eq!(plan.state_of("B"), TaskRunState::Failed);
    }

    #[test]
    fn unknown_target_is_not_found() {
        let err = RunPlan::new(&diamond(), &names(&["nope"]), 1).unwrap_err();
        assert!(matches!(err, BuildError::TaskNotFound(ref n) if n == "nope"));
    }
}
