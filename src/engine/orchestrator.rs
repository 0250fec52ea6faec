// src/engine/orchestrator.rs

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::config::{apply_profile, BuildConfig, RawConfig};
use crate::dag::{BoxFuture, RunReport, Scheduler, Step, TaskName};
use crate::errors::{BuildError, Result};
use crate::exec::builtin::DEFAULT;
use crate::exec::{TaskContext, WatchBindingSpec};
use crate::fs::FileSystem;
use crate::watch::{ChangeBatch, RebuildTarget, WatchCoordinator};

/// Command that watches the source tree and rebuilds on change.
pub const WATCH_COMMAND: &str = "watch";
/// Command that switches to the `serve` profile, builds, then watches.
pub const SERVE_COMMAND: &str = "serve";
pub const SERVE_PROFILE: &str = "serve";

struct Inner {
    scheduler: Scheduler,
    raw: Mutex<RawConfig>,
    snapshot: RwLock<Arc<BuildConfig>>,
    fs: Arc<dyn FileSystem>,
    cwd: PathBuf,
    watch_bindings: Vec<WatchBindingSpec>,
}

/// Owns the live configuration and runs tasks against snapshots of it.
///
/// Every run captures the current snapshot once; a profile switch builds a
/// new snapshot for later runs and leaves running ones alone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cwd", &self.inner.cwd)
            .field("profile", &self.snapshot().active_profile())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        scheduler: Scheduler,
        raw: RawConfig,
        snapshot: Arc<BuildConfig>,
        fs: Arc<dyn FileSystem>,
        cwd: impl Into<PathBuf>,
        watch_bindings: Vec<WatchBindingSpec>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                scheduler,
                raw: Mutex::new(raw),
                snapshot: RwLock::new(snapshot),
                fs,
                cwd: cwd.into(),
                watch_bindings,
            }),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// The snapshot new runs will use.
    pub fn snapshot(&self) -> Arc<BuildConfig> {
        match self.inner.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn context(&self) -> TaskContext {
        TaskContext::new(self.snapshot(), Arc::clone(&self.inner.fs), self.inner.cwd.clone())
    }

    /// Overlay another profile on the live configuration and publish a new
    /// snapshot. A missing profile leaves the configuration unchanged.
    ///
    /// Callers sequence this before the runs that should see it.
    pub fn switch_profile(&self, name: &str) -> Result<Arc<BuildConfig>> {
        let mut raw = self
            .inner
            .raw
            .lock()
            .map_err(|_| BuildError::Other(anyhow!("configuration lock poisoned")))?;

        let mut next = raw.clone();
        if apply_profile(&mut next, name)?.is_none() {
            debug!(profile = %name, "no such profile; configuration unchanged");
        }
        let snapshot = next.snapshot()?;
        *raw = next;

        let mut current = self
            .inner
            .snapshot
            .write()
            .map_err(|_| BuildError::Other(anyhow!("snapshot lock poisoned")))?;
        *current = Arc::clone(&snapshot);

        info!(profile = ?snapshot.active_profile(), dest = %snapshot.dest, "switched profile");
        Ok(snapshot)
    }

    /// Run tasks (and their predecessors) against the current snapshot.
    pub async fn run(&self, names: &[TaskName]) -> Result<RunReport> {
        let ctx = self.context();
        self.inner.scheduler.run(&ctx, names).await
    }

    pub async fn run_sequence(&self, steps: &[Step]) -> Result<RunReport> {
        let ctx = self.context();
        self.inner.scheduler.run_sequence(&ctx, steps).await
    }

    /// Build a watch coordinator for the current snapshot: every pattern
    /// group of every bound pattern set becomes a binding under `src`.
    pub fn watch_coordinator(&self) -> Result<WatchCoordinator> {
        let cfg = self.snapshot();
        let target: Arc<dyn RebuildTarget> = Arc::new(self.clone());
        let mut coordinator =
            WatchCoordinator::new(target, cfg.src_root(&self.inner.cwd), cfg.debounce());

        for binding in &self.inner.watch_bindings {
            let groups = match cfg.pattern_groups(&binding.pattern_set) {
                Ok(groups) => groups,
                Err(e) => {
                    warn!(patterns = %binding.pattern_set, error = %e, "cannot watch malformed patterns");
                    continue;
                }
            };
            if groups.is_empty() {
                debug!(patterns = %binding.pattern_set, "no patterns to watch");
                continue;
            }
            coordinator.bind(&binding.pattern_set, &groups, binding.steps.clone())?;
        }

        Ok(coordinator)
    }

    /// Watch until `shutdown` resolves, then stop the watcher.
    pub async fn watch_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut coordinator = self.watch_coordinator()?;
        coordinator.start()?;
        info!(root = %coordinator.root().display(), "watching for changes");

        shutdown.await;

        coordinator.stop().await;
        Ok(())
    }

    /// Switch to the `serve` profile, build everything, then watch.
    ///
    /// The build output directory is only logged; serving it over HTTP is
    /// left to an external static server.
    pub async fn serve_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.switch_profile(SERVE_PROFILE)?;
        self.run(&[DEFAULT.to_string()]).await?;

        let cfg = self.snapshot();
        info!(root = %cfg.dest_root(&self.inner.cwd).display(), "build output ready to be served");

        self.watch_until(shutdown).await
    }

    /// Run what the command line asked for, left to right. Consecutive task
    /// names run together as one run; `watch` and `serve` block until
    /// Ctrl-C.
    pub async fn run_command(&self, names: &[TaskName]) -> Result<()> {
        let mut pending: Vec<TaskName> = Vec::new();

        for name in names {
            match name.as_str() {
                WATCH_COMMAND | SERVE_COMMAND => {
                    if !pending.is_empty() {
                        self.run(&pending).await?;
                        pending.clear();
                    }
                    if name == WATCH_COMMAND {
                        self.watch_until(ctrl_c()).await?;
                    } else {
                        self.serve_until(ctrl_c()).await?;
                    }
                }
                _ => pending.push(name.clone()),
            }
        }

        if !pending.is_empty() {
            self.run(&pending).await?;
        }
        Ok(())
    }
}

impl RebuildTarget for Orchestrator {
    fn rebuild(&self, batch: ChangeBatch) -> BoxFuture<'static, Result<()>> {
        let this = self.clone();
        Box::pin(async move {
            debug!(binding = batch.binding, changes = ?batch.changes, "rebuilding");
            this.run_sequence(&batch.steps).await.map(|_| ())
        })
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C; stopping now");
    }
}
