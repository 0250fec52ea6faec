// src/exec/builtin.rs

//! The standard task table of a web app build.
//!
//! | task            | after  | does                                                |
//! |-----------------|--------|-----------------------------------------------------|
//! | `clean`         |        | delete `patterns.clean`                             |
//! | `clean-before`  |        | production only: delete `patterns.clean_production` |
//! | `copy`          |        | copy `components` and `others` unchanged            |
//! | `build-scripts` | `copy` | `scripts` through the scripts pipeline              |
//! | `build-styles`  | `copy` | `styles` through the styles pipeline                |
//! | `vulcanize`     | `copy` | bundle, or the development path (see below)         |
//! | `default`       |        | `clean-before`, then the three builds concurrently  |

use std::sync::Arc;

use tracing::debug;

use crate::dag::{BoxFuture, Completion, Step, TaskAction, TaskRegistry};
use crate::errors::Result;
use crate::exec::{CleanTask, FileTask, TaskContext};
use crate::pipeline::stages::{bundle_pipeline, processing_pipeline, scripts_pipeline, styles_pipeline};
use crate::pipeline::{ContentCache, Processors};

pub const CLEAN: &str = "clean";
pub const CLEAN_BEFORE: &str = "clean-before";
pub const COPY: &str = "copy";
pub const BUILD_SCRIPTS: &str = "build-scripts";
pub const BUILD_STYLES: &str = "build-styles";
pub const VULCANIZE: &str = "vulcanize";
pub const DEFAULT: &str = "default";

pub const PRODUCTION_PROFILE: &str = "production";

/// Bundles `patterns.vulcanize` when the `vulcanize` flag is set; otherwise
/// passes `patterns.development_vulcanize` through the processing pipeline,
/// skipping files already written unchanged, so watch re-runs only
/// reprocess edited files.
///
/// The flag is read from the snapshot of each run.
#[derive(Clone)]
struct VulcanizeTask {
    bundle: FileTask,
    development: FileTask,
}

impl VulcanizeTask {
    fn new(processors: &Processors) -> Self {
        let cache = Arc::new(ContentCache::new("development"));
        let development = FileTask::new(VULCANIZE, &["development_vulcanize"], processing_pipeline(processors))
            .with_cache(cache);

        Self {
            bundle: FileTask::new(VULCANIZE, &["vulcanize"], bundle_pipeline(processors)),
            development,
        }
    }
}

impl TaskAction for VulcanizeTask {
    fn run(&self, ctx: TaskContext) -> BoxFuture<'static, Result<Completion>> {
        let task = if ctx.config.vulcanize {
            self.bundle.clone()
        } else {
            debug!(task = VULCANIZE, "vulcanize flag off; using the development path");
            self.development.clone()
        };
        Box::pin(async move { task.start(ctx) })
    }
}

/// Declare the standard tasks into `registry`.
pub fn register_builtin_tasks(registry: &mut TaskRegistry, processors: &Processors) {
    registry
        .declare(CLEAN, &[], CleanTask::new(CLEAN, "clean"))
        .declare(
            CLEAN_BEFORE,
            &[],
            CleanTask::new(CLEAN_BEFORE, "clean_production").only_in_profile(PRODUCTION_PROFILE),
        )
        .declare(COPY, &[], FileTask::copy(COPY, &["components", "others"]))
        .declare(
            BUILD_SCRIPTS,
            &[COPY],
            FileTask::new(BUILD_SCRIPTS, &["scripts"], scripts_pipeline(processors)),
        )
        .declare(
            BUILD_STYLES,
            &[COPY],
            FileTask::new(BUILD_STYLES, &["styles"], styles_pipeline(processors)),
        )
        .declare(VULCANIZE, &[COPY], VulcanizeTask::new(processors))
        .declare_sequence(
            DEFAULT,
            vec![
                Step::from(CLEAN_BEFORE),
                Step::group([BUILD_SCRIPTS, BUILD_STYLES, VULCANIZE]),
            ],
        );
}

/// A pattern set whose groups trigger a task when files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBindingSpec {
    pub pattern_set: String,
    pub steps: Vec<Step>,
}

impl WatchBindingSpec {
    pub fn new(pattern_set: &str, task: &str) -> Self {
        Self {
            pattern_set: pattern_set.to_string(),
            steps: vec![Step::from(task)],
        }
    }
}

/// Which pattern sets the `watch` command binds to which task.
pub fn default_watch_bindings() -> Vec<WatchBindingSpec> {
    vec![
        WatchBindingSpec::new("components", VULCANIZE),
        WatchBindingSpec::new("others", VULCANIZE),
        WatchBindingSpec::new("scripts", BUILD_SCRIPTS),
        WatchBindingSpec::new("styles", BUILD_STYLES),
        WatchBindingSpec::new("vulcanize_watch", VULCANIZE),
    ]
}
