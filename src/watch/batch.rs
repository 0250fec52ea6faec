// src/watch/batch.rs

//! Debounced change batches.
//!
//! Each binding owns one batcher task. The batcher waits for a first event,
//! then keeps collecting while a single-shot timer is reset by every new
//! event. When the timer elapses the batch fires once and the batcher waits
//! for the rebuild to finish; events arriving meanwhile start the next batch.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::dag::Step;
use crate::watch::binding::WatchBinding;
use crate::watch::RebuildTarget;

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Add => "add",
            ChangeKind::Change => "change",
            ChangeKind::Unlink => "unlink",
        };
        f.write_str(s)
    }
}

/// A change to a path relative to the watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: String,
}

/// The changes that triggered one rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub binding: usize,
    pub label: String,
    pub steps: Vec<Step>,
    /// Last change seen per path.
    pub changes: BTreeMap<String, ChangeKind>,
}

impl ChangeBatch {
    fn new(binding: &WatchBinding) -> Self {
        Self {
            binding: binding.id(),
            label: binding.label().to_string(),
            steps: binding.steps().to_vec(),
            changes: BTreeMap::new(),
        }
    }

    fn push(&mut self, event: ChangeEvent) {
        self.changes.insert(event.path, event.kind);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Batcher loop for one binding. Ends when the event channel closes or the
/// stop signal is raised; a rebuild already running is awaited first.
pub(crate) async fn run_batcher(
    binding: Arc<WatchBinding>,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    debounce: Duration,
    target: Arc<dyn RebuildTarget>,
    mut stop: watch::Receiver<bool>,
) {
    let id = binding.id();

    'outer: loop {
        let first = tokio::select! {
            biased;
            _ = stop.changed() => break,
            ev = events.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
        };

        let mut batch = ChangeBatch::new(&binding);
        batch.push(first);

        let timer = sleep(debounce);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => {
                    debug!(binding = id, pending = batch.len(), "stopped; dropping pending batch");
                    break 'outer;
                }
                ev = events.recv() => match ev {
                    Some(ev) => {
                        batch.push(ev);
                        timer.as_mut().reset(Instant::now() + debounce);
                    }
                    None => break 'outer,
                },
                _ = &mut timer => break,
            }
        }

        if *stop.borrow() {
            break;
        }

        info!(
            binding = id,
            label = %batch.label,
            files = batch.len(),
            "change batch ready; rebuilding"
        );
        if let Err(err) = target.rebuild(batch).await {
            warn!(binding = id, error = %err, "rebuild failed; waiting for the next change");
        }
    }

    debug!(binding = id, "batcher ended");
}
