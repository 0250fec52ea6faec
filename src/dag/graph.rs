// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::registry::TaskRegistry;
use crate::dag::task::{TaskKind, TaskName};
use crate::errors::{BuildError, Result};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Tasks that must complete before this one can start.
    deps: Vec<TaskName>,
    /// Tasks that list this one as a predecessor.
    dependents: Vec<TaskName>,
}

/// Predecessor adjacency of a task registry, keyed by task name.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<TaskName, DagNode>,
}

impl DagGraph {
    /// Build the graph from a registry. Unknown predecessor names are kept
    /// as edges but have no node; [`check_acyclic`] and
    /// `TaskRegistry::validate` report them.
    pub fn from_registry(registry: &TaskRegistry) -> Self {
        let mut nodes: HashMap<TaskName, DagNode> = HashMap::new();

        for def in registry.tasks() {
            nodes.insert(
                def.name.clone(),
                DagNode {
                    deps: def.predecessors.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        let names: Vec<TaskName> = nodes.keys().cloned().collect();
        for name in names {
            let deps = nodes.get(&name).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        for node in nodes.values_mut() {
            node.dependents.sort();
        }

        Self { nodes }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes.get(name).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// The given targets plus every transitive predecessor.
    pub fn closure_of(&self, targets: &[TaskName]) -> Result<BTreeSet<TaskName>> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<TaskName> = targets.to_vec();

        while let Some(name) = stack.pop() {
            if !self.contains(&name) {
                return Err(BuildError::TaskNotFound(name));
            }
            if seen.insert(name.clone()) {
                stack.extend(self.dependencies_of(&name).iter().cloned());
            }
        }

        Ok(seen)
    }
}

/// Fail with [`BuildError::DagCycle`] if the registry's tasks cannot be
/// ordered.
///
/// Edge direction is `dep -> task`. Sequence steps count as edges too
/// (`step member -> sequence task`): a sequence that reaches itself would
/// never terminate.
pub fn check_acyclic(registry: &TaskRegistry) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for def in registry.tasks() {
        graph.add_node(def.name.as_str());
    }

    for def in registry.tasks() {
        for dep in &def.predecessors {
            graph.add_edge(dep.as_str(), def.name.as_str(), ());
        }
        if let TaskKind::Sequence(steps) = &def.kind {
            for member in steps.iter().flat_map(|s| s.names()) {
                graph.add_edge(member.as_str(), def.name.as_str(), ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(BuildError::DagCycle(format!(
            "cycle in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
