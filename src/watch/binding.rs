// src/watch/binding.rs

use crate::dag::Step;
use crate::errors::Result;
use crate::patterns::{CompiledGroup, PatternGroup};

pub type BindingId = usize;

/// One pattern group bound to the steps it re-runs.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    id: BindingId,
    label: String,
    group: CompiledGroup,
    steps: Vec<Step>,
}

impl WatchBinding {
    pub fn new(id: BindingId, label: impl Into<String>, group: &PatternGroup, steps: Vec<Step>) -> Result<Self> {
        Ok(Self {
            id,
            label: label.into(),
            group: CompiledGroup::compile(group)?,
            steps,
        })
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    /// Human-readable origin, e.g. `scripts#0`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn patterns(&self) -> &[String] {
        self.group.patterns()
    }

    /// `rel_path` is relative to the watched root, forward slashes.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.group.matches(rel_path)
    }
}
