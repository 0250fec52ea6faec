// src/exec/file_task.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::{BoxFuture, Completion, TaskAction, TaskName};
use crate::errors::{BuildError, Result};
use crate::exec::TaskContext;
use crate::patterns::{CompiledGroup, PatternGroup, PatternGroupSet};
use crate::pipeline::{content_hash, ContentCache, FileRecord, LazyPipeline};

const STREAM_CAPACITY: usize = 64;

/// Reads the files selected by one or more named pattern sets from the
/// source root, runs them through a pipeline, and writes the results under
/// the destination root at the same relative paths.
///
/// Pattern sets are looked up in the snapshot each time the task runs. Every
/// pattern group becomes its own concurrent sub-task; written paths are
/// streamed back to the scheduler as they finish.
///
/// With a [`ContentCache`], sources whose contents were already written to
/// the current destination root are skipped.
#[derive(Clone)]
pub struct FileTask {
    name: TaskName,
    pattern_sets: Vec<String>,
    /// `None` copies files unchanged.
    pipeline: Option<LazyPipeline>,
    cache: Option<Arc<ContentCache>>,
}

impl FileTask {
    pub fn new(name: &str, pattern_sets: &[&str], pipeline: LazyPipeline) -> Self {
        Self {
            name: name.to_string(),
            pattern_sets: pattern_sets.iter().map(|s| s.to_string()).collect(),
            pipeline: Some(pipeline),
            cache: None,
        }
    }

    pub fn copy(name: &str, pattern_sets: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            pattern_sets: pattern_sets.iter().map(|s| s.to_string()).collect(),
            pipeline: None,
            cache: None,
        }
    }

    /// Skip sources that are unchanged since they were last written.
    pub fn with_cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All groups of all configured pattern sets, in declaration order.
    pub fn groups(&self, ctx: &TaskContext) -> Result<PatternGroupSet> {
        let mut groups = PatternGroupSet::new();
        for set in &self.pattern_sets {
            groups.extend(ctx.config.pattern_groups(set)?);
        }
        Ok(groups)
    }

    /// Start the group sub-tasks and hand back their stream.
    ///
    /// No groups means nothing to do: the task completes without a stream.
    pub fn start(&self, ctx: TaskContext) -> Result<Completion> {
        let groups = self.groups(&ctx)?;
        if groups.is_empty() {
            debug!(task = %self.name, sets = ?self.pattern_sets, "no patterns configured; nothing to do");
            return Ok(Completion::Done);
        }

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        for (idx, group) in groups.into_iter().enumerate() {
            let tx = tx.clone();
            let job = GroupJob {
                task: self.name.clone(),
                index: idx,
                group,
                pipeline: self.pipeline.clone(),
                cache: self.cache.clone(),
                ctx: ctx.clone(),
            };

            tokio::spawn(async move {
                let task = job.task.clone();
                let outcome = tokio::task::spawn_blocking(move || job.build())
                    .await
                    .unwrap_or_else(|e| Err(BuildError::Other(anyhow!("group worker panicked: {e}"))));

                match outcome {
                    Ok(written) => {
                        for path in written {
                            if tx.send(Ok(path)).await.is_err() {
                                debug!(task = %task, "stream receiver dropped");
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                    }
                }
            });
        }

        Ok(Completion::Stream(rx))
    }
}

impl TaskAction for FileTask {
    fn run(&self, ctx: TaskContext) -> BoxFuture<'static, Result<Completion>> {
        let this = self.clone();
        Box::pin(async move { this.start(ctx) })
    }
}

/// One pattern group of one task invocation.
struct GroupJob {
    task: TaskName,
    index: usize,
    group: PatternGroup,
    pipeline: Option<LazyPipeline>,
    cache: Option<Arc<ContentCache>>,
    ctx: TaskContext,
}

impl GroupJob {
    /// Match, read, transform, write. Returns the written paths.
    fn build(self) -> Result<Vec<PathBuf>> {
        let compiled = CompiledGroup::compile(&self.group)?;
        let src_root = self.ctx.src_root();
        let dest_root = self.ctx.dest_root();
        let fs = self.ctx.fs.as_ref();

        let matched = compiled.collect(fs, &src_root)?;
        if matched.is_empty() {
            debug!(task = %self.task, group = self.index, patterns = ?self.group, "no files matched");
            return Ok(Vec::new());
        }

        let cache_scope = dest_root.to_string_lossy().into_owned();
        let mut records = Vec::with_capacity(matched.len());
        let mut hashes = Vec::new();
        for m in matched {
            match fs.read(&m.abs) {
                Ok(contents) => {
                    if let Some(cache) = &self.cache {
                        let hash = content_hash(&contents);
                        if cache.is_unchanged(&cache_scope, &m.rel, &hash) {
                            debug!(task = %self.task, path = %m.rel, "unchanged since last write; skipping");
                            continue;
                        }
                        hashes.push((m.rel.clone(), hash));
                    }
                    records.push(FileRecord::new(m.rel, contents));
                }
                // Typically a file removed between matching and reading.
                Err(err) => warn!(task = %self.task, path = %m.rel, error = %err, "could not read source file; skipping"),
            }
        }

        let mut faulted = HashSet::new();
        let files = match &self.pipeline {
            Some(pipeline) => {
                let out = pipeline.run(records, &self.ctx.config)?;
                if !out.faults.is_empty() {
                    warn!(task = %self.task, group = self.index, faults = out.faults.len(), "some files were dropped by stage faults");
                }
                faulted.extend(out.faults.into_iter().map(|f| f.path));
                out.files
            }
            None => records,
        };

        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let dest = dest_root.join(&file.path);
            fs.write(&dest, &file.contents)
                .with_context(|| format!("task '{}' writing {}", self.task, dest.display()))?;
            written.push(dest);
        }

        // Only now that every output is on disk.
        if let Some(cache) = &self.cache {
            cache.record(
                &cache_scope,
                hashes.into_iter().filter(|(path, _)| !faulted.contains(path)),
            );
        }

        info!(task = %self.task, group = self.index, files = written.len(), "group written");
        Ok(written)
    }
}
