#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use cbn_build::config::{resolve, BuildConfig, RawConfig};
use cbn_build::dag::{Scheduler, TaskRegistry};
use cbn_build::engine::Orchestrator;
use cbn_build::exec::{default_watch_bindings, register_builtin_tasks};
use cbn_build::fs::RealFileSystem;
use cbn_build::pipeline::Processors;
use cbn_build_test_utils::builders::ConfigBuilder;

pub use cbn_build_test_utils::{init_tracing, with_timeout};

/// A throwaway project directory on the real file system.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, contents).expect("write file");
    }

    pub fn read(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.path(rel)).ok()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Orchestrator over the builtin task table with the given processors.
    pub fn orchestrator_with(&self, builder: &ConfigBuilder, processors: &Processors) -> Orchestrator {
        self.build_orchestrator(builder.raw(), builder.build(), processors)
    }

    /// Orchestrator over an already resolved configuration.
    pub fn orchestrator_from(&self, raw: RawConfig, snapshot: Arc<BuildConfig>) -> Orchestrator {
        self.build_orchestrator(raw, snapshot, &Processors::default())
    }

    fn build_orchestrator(
        &self,
        raw: RawConfig,
        snapshot: Arc<BuildConfig>,
        processors: &Processors,
    ) -> Orchestrator {
        let mut registry = TaskRegistry::new();
        register_builtin_tasks(&mut registry, processors);
        let scheduler = Scheduler::new(registry).expect("builtin tasks validate");

        Orchestrator::new(
            scheduler,
            raw,
            snapshot,
            Arc::new(RealFileSystem),
            self.root(),
            default_watch_bindings(),
        )
    }

    /// Orchestrator as the command line would start it with `--env <profile>`.
    pub fn orchestrator_selecting(&self, builder: &ConfigBuilder, profile: &str) -> Orchestrator {
        let mut raw = builder.raw();
        resolve(&mut raw, profile).expect("profile resolves");
        let snapshot = raw.snapshot().expect("resolved config is valid");
        self.orchestrator_from(raw, snapshot)
    }

    pub fn orchestrator(&self, builder: &ConfigBuilder) -> Orchestrator {
        self.orchestrator_with(builder, &Processors::default())
    }
}
