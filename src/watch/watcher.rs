// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::dag::Step;
use crate::errors::{BuildError, Result};
use crate::patterns::{relative_str, PatternGroupSet};
use crate::watch::batch::{run_batcher, ChangeEvent, ChangeKind};
use crate::watch::binding::{BindingId, WatchBinding};
use crate::watch::RebuildTarget;

/// A raw change before it is related to the watched root.
#[derive(Debug, Clone)]
struct RawChange {
    path: PathBuf,
    kind: ChangeKind,
}

struct Running {
    /// `None` when started without a filesystem watcher.
    watcher: Option<RecommendedWatcher>,
    injector: mpsc::UnboundedSender<RawChange>,
    stop_tx: watch::Sender<bool>,
    router: JoinHandle<()>,
    batchers: Vec<JoinHandle<()>>,
}

/// Binds pattern groups under the source root to task steps and re-runs
/// those steps, once per debounced batch of changes.
///
/// Every binding debounces on its own; two bindings firing at the same time
/// rebuild concurrently.
pub struct WatchCoordinator {
    target: Arc<dyn RebuildTarget>,
    root: PathBuf,
    debounce: Duration,
    bindings: Vec<Arc<WatchBinding>>,
    running: Option<Running>,
}

impl std::fmt::Debug for WatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchCoordinator")
            .field("root", &self.root)
            .field("debounce", &self.debounce)
            .field("bindings", &self.bindings.len())
            .field("running", &self.running.is_some())
            .finish()
    }
}

impl WatchCoordinator {
    pub fn new(target: Arc<dyn RebuildTarget>, root: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            target,
            root: root.into(),
            debounce,
            bindings: Vec::new(),
            running: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bindings(&self) -> impl Iterator<Item = &WatchBinding> {
        self.bindings.iter().map(|b| b.as_ref())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bind every group of `groups` to `steps`, one binding per group.
    ///
    /// Must be called before [`start`](Self::start). Returns the new
    /// binding ids.
    pub fn bind(&mut self, label: &str, groups: &PatternGroupSet, steps: Vec<Step>) -> Result<Vec<BindingId>> {
        if self.running.is_some() {
            return Err(BuildError::WatchError(
                "cannot add bindings while the watcher is running".to_string(),
            ));
        }

        let mut ids = Vec::with_capacity(groups.len());
        for (idx, group) in groups.iter().enumerate() {
            let id = self.bindings.len();
            let binding = WatchBinding::new(id, format!("{label}#{idx}"), group, steps.clone())?;
            debug!(binding = id, label = %binding.label(), patterns = ?binding.patterns(), "bound watch patterns");
            self.bindings.push(Arc::new(binding));
            ids.push(id);
        }
        Ok(ids)
    }

    /// Start batchers and a recursive filesystem watcher on the root.
    pub fn start(&mut self) -> Result<()> {
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        self.root = root.clone();

        self.start_without_watcher()?;
        let injector = match &self.running {
            Some(running) => running.injector.clone(),
            None => return Err(BuildError::WatchError("watch workers did not start".to_string())),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in map_notify_event(event) {
                        if injector.send(change).is_err() {
                            return;
                        }
                    }
                }
                // Typically a temp file that vanished before it could be
                // inspected; never a reason to stop watching.
                Err(err) => match err.kind {
                    notify::ErrorKind::PathNotFound => debug!(paths = ?err.paths, "watch: path vanished"),
                    _ => warn!(error = %err, "watch error suppressed"),
                },
            },
            Config::default(),
        )
        .map_err(|e| BuildError::WatchError(format!("creating watcher: {e}")))?;

        if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
            self.abort_workers();
            return Err(BuildError::WatchError(format!("watching {}: {e}", root.display())));
        }

        if let Some(running) = self.running.as_mut() {
            running.watcher = Some(watcher);
        }

        info!(root = %root.display(), bindings = self.bindings.len(), "file watcher started");
        Ok(())
    }

    /// Start routing and batching only; changes come from
    /// [`notify_change`](Self::notify_change).
    pub fn start_without_watcher(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(BuildError::WatchError("watcher already started".to_string()));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (injector, raw_rx) = mpsc::unbounded_channel::<RawChange>();

        let mut routes = Vec::with_capacity(self.bindings.len());
        let mut batchers = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let (tx, rx) = mpsc::unbounded_channel::<ChangeEvent>();
            routes.push((Arc::clone(binding), tx));
            batchers.push(tokio::spawn(run_batcher(
                Arc::clone(binding),
                rx,
                self.debounce,
                Arc::clone(&self.target),
                stop_rx.clone(),
            )));
        }

        let router = tokio::spawn(route_changes(self.root.clone(), raw_rx, routes, stop_rx));

        self.running = Some(Running {
            watcher: None,
            injector,
            stop_tx,
            router,
            batchers,
        });
        Ok(())
    }

    fn abort_workers(&mut self) {
        if let Some(running) = self.running.take() {
            running.router.abort();
            for handle in running.batchers {
                handle.abort();
            }
        }
    }

    /// Feed a change as if the filesystem watcher had reported it.
    pub fn notify_change(&self, path: impl Into<PathBuf>, kind: ChangeKind) {
        if let Some(running) = &self.running {
            let _ = running.injector.send(RawChange {
                path: path.into(),
                kind,
            });
        }
    }

    /// Tear down all subscriptions. Batches still collecting are dropped; a
    /// rebuild already in flight is awaited.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.stop_tx.send(true);
        drop(running.watcher);
        drop(running.injector);

        if let Err(err) = running.router.await {
            warn!(error = %err, "watch router ended abnormally");
        }
        for handle in running.batchers {
            if let Err(err) = handle.await {
                warn!(error = %err, "watch batcher ended abnormally");
            }
        }
        info!("file watcher stopped");
    }
}

/// Relate raw changes to the root and fan them out to matching bindings.
async fn route_changes(
    root: PathBuf,
    mut raw_rx: mpsc::UnboundedReceiver<RawChange>,
    routes: Vec<(Arc<WatchBinding>, mpsc::UnboundedSender<ChangeEvent>)>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let change = tokio::select! {
            biased;
            _ = stop.changed() => break,
            change = raw_rx.recv() => match change {
                Some(change) => change,
                None => break,
            },
        };

        let Some(rel) = relative_str(&root, &change.path) else {
            debug!(path = %change.path.display(), "change outside the watched root; ignoring");
            continue;
        };

        for (binding, tx) in &routes {
            if binding.matches(&rel) {
                trace!(binding = binding.id(), path = %rel, kind = %change.kind, "change routed");
                let _ = tx.send(ChangeEvent {
                    kind: change.kind,
                    path: rel.clone(),
                });
            }
        }
    }
    debug!("watch router ended");
}

fn map_notify_event(event: Event) -> Vec<RawChange> {
    let Event { kind, paths, .. } = event;

    let change = |path: PathBuf, kind: ChangeKind| RawChange { path, kind };

    match kind {
        EventKind::Create(_) => paths.into_iter().map(|p| change(p, ChangeKind::Add)).collect(),
        EventKind::Remove(_) => paths.into_iter().map(|p| change(p, ChangeKind::Unlink)).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => paths.into_iter().map(|p| change(p, ChangeKind::Unlink)).collect(),
            RenameMode::To => paths.into_iter().map(|p| change(p, ChangeKind::Add)).collect(),
            RenameMode::Both => {
                let mut out = Vec::with_capacity(2);
                let mut it = paths.into_iter();
                if let Some(from) = it.next() {
                    out.push(change(from, ChangeKind::Unlink));
                }
                if let Some(to) = it.next() {
                    out.push(change(to, ChangeKind::Add));
                }
                out
            }
            RenameMode::Any | RenameMode::Other => {
                paths.into_iter().map(|p| change(p, ChangeKind::Change)).collect()
            }
        },
        EventKind::Modify(_) => paths.into_iter().map(|p| change(p, ChangeKind::Change)).collect(),
        _ => Vec::new(),
    }
}
