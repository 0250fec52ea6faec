// src/pipeline/compose.rs

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::BuildConfig;
use crate::errors::Result;
use crate::pipeline::predicate::Gate;
use crate::pipeline::{FileRecord, StageFault, Transform};

/// What a stage does to the files its gate admits.
#[derive(Clone)]
pub enum StageBody {
    Transform(Arc<dyn Transform>),
    /// A whole pipeline, built when the outer pipeline runs.
    Nested(LazyPipeline),
}

/// One gated stage.
#[derive(Clone)]
pub struct StageSpec {
    pub label: String,
    pub gate: Gate,
    pub body: StageBody,
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("label", &self.label)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl StageSpec {
    pub fn always(transform: Arc<dyn Transform>) -> Self {
        Self::when(Gate::Always, transform)
    }

    pub fn when(gate: Gate, transform: Arc<dyn Transform>) -> Self {
        Self {
            label: transform.name().to_string(),
            gate,
            body: StageBody::Transform(transform),
        }
    }

    pub fn nested(label: impl Into<String>, gate: Gate, pipeline: LazyPipeline) -> Self {
        Self {
            label: label.into(),
            gate,
            body: StageBody::Nested(pipeline),
        }
    }
}

/// Result of running a pipeline over a batch of files.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub files: Vec<FileRecord>,
    /// Files dropped by the fault boundary, one entry per failed file.
    pub faults: Vec<StageFault>,
}

/// An instantiated pipeline: stages in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<StageSpec>,
}

impl Pipeline {
    pub fn new(stages: Vec<StageSpec>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Run every file through every stage, in order.
    ///
    /// Flag gates are read once from `cfg` and apply to the whole stage.
    /// Nested pipelines are built here, against `cfg`. A stage that faults on
    /// a file drops that file (logged, recorded in
    /// [`PipelineOutput::faults`]); all other files continue. An `Err` is only
    /// returned when a nested pipeline cannot be built at all.
    pub fn run(&self, files: Vec<FileRecord>, cfg: &BuildConfig) -> Result<PipelineOutput> {
        let mut current = files;
        let mut faults = Vec::new();

        for stage in &self.stages {
            if !stage.gate.enabled(cfg) {
                trace!(stage = %stage.label, "stage disabled by flag; skipping");
                continue;
            }

            let (admitted, mut passed): (Vec<_>, Vec<_>) =
                current.into_iter().partition(|f| stage.gate.admits(f));

            if admitted.is_empty() {
                current = passed;
                continue;
            }

            match &stage.body {
                StageBody::Transform(t) => {
                    for file in admitted {
                        let path = file.path.clone();
                        match t.apply(file, cfg) {
                            Ok(out) => passed.extend(out),
                            Err(mut fault) => {
                                warn!(
                                    stage = %stage.label,
                                    path = %path,
                                    error = %fault,
                                    "stage failed; dropping file from this run"
                                );
                                // Attributed to the file that entered the stage.
                                fault.path = path;
                                faults.push(fault);
                            }
                        }
                    }
                }
                StageBody::Nested(lazy) => {
                    debug!(stage = %stage.label, files = admitted.len(), "entering nested pipeline");
                    let out = lazy.run(admitted, cfg)?;
                    passed.extend(out.files);
                    faults.extend(out.faults);
                }
            }

            current = passed;
        }

        Ok(PipelineOutput {
            files: current,
            faults,
        })
    }
}

type Builder = dyn Fn(&BuildConfig) -> Result<Vec<StageSpec>> + Send + Sync;

/// A pipeline whose stage list is produced when it runs.
///
/// The builder sees the snapshot of the run that invokes it, so branches that
/// depend on configuration reflect the profile that is active at run time,
/// not the one active when the pipeline was declared.
#[derive(Clone)]
pub struct LazyPipeline {
    builder: Arc<Builder>,
}

impl fmt::Debug for LazyPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyPipeline").finish_non_exhaustive()
    }
}

impl LazyPipeline {
    pub fn build(&self, cfg: &BuildConfig) -> Result<Pipeline> {
        (self.builder)(cfg).map(Pipeline::new)
    }

    pub fn run(&self, files: Vec<FileRecord>, cfg: &BuildConfig) -> Result<PipelineOutput> {
        self.build(cfg)?.run(files, cfg)
    }
}

/// Declare a pipeline without building it.
///
/// ```ignore
/// let scripts = compose(move |_cfg| Ok(vec![
///     StageSpec::when(Gate::Path(PathMatcher::glob("*.js")?), transpile.clone()),
///     StageSpec::when(Gate::Flag(FlagRef::new("minify")), minify.clone()),
/// ]));
/// ```
pub fn compose<F>(builder: F) -> LazyPipeline
where
    F: Fn(&BuildConfig) -> Result<Vec<StageSpec>> + Send + Sync + 'static,
{
    LazyPipeline {
        builder: Arc::new(builder),
    }
}
