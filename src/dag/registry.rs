// src/dag/registry.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dag::graph::check_acyclic;
use crate::dag::task::{Step, TaskAction, TaskDef, TaskKind, TaskName};
use crate::errors::{BuildError, Result};

/// Static table of declared tasks, looked up by name at run time.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, TaskDef>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a task with an action. Re-declaring a name replaces the
    /// earlier definition.
    pub fn declare<A>(&mut self, name: &str, predecessors: &[&str], action: A) -> &mut Self
    where
        A: TaskAction + 'static,
    {
        self.insert(TaskDef {
            name: name.to_string(),
            predecessors: predecessors.iter().map(|p| p.to_string()).collect(),
            kind: TaskKind::Action(Arc::new(action)),
        })
    }

    /// Declare a task whose action is running `steps` in order.
    pub fn declare_sequence(&mut self, name: &str, steps: Vec<Step>) -> &mut Self {
        self.insert(TaskDef {
            name: name.to_string(),
            predecessors: Vec::new(),
            kind: TaskKind::Sequence(steps),
        })
    }

    fn insert(&mut self, def: TaskDef) -> &mut Self {
        debug!(task = %def.name, predecessors = ?def.predecessors, "declared task");
        if let Some(old) = self.tasks.insert(def.name.clone(), def) {
            warn!(task = %old.name, "task re-declared; previous definition replaced");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check references and ordering before the first run.
    ///
    /// - every predecessor and sequence member names a declared task
    /// - no task lists itself as a predecessor
    /// - the graph has no cycles
    pub fn validate(&self) -> Result<()> {
        for def in self.tasks.values() {
            for dep in &def.predecessors {
                if dep == &def.name {
                    return Err(BuildError::ConfigError(format!(
                        "task '{}' cannot be its own predecessor",
                        def.name
                    )));
                }
                if !self.contains(dep) {
                    return Err(BuildError::ConfigError(format!(
                        "task '{}' has unknown predecessor '{}'",
                        def.name, dep
                    )));
                }
            }

            if let TaskKind::Sequence(steps) = &def.kind {
                for member in steps.iter().flat_map(|s| s.names()) {
                    if !self.contains(member) {
                        return Err(BuildError::ConfigError(format!(
                            "sequence '{}' references unknown task '{}'",
                            def.name, member
                        )));
                    }
                }
            }
        }

        check_acyclic(self)
    }
}
