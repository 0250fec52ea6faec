// src/exec/clean.rs

use anyhow::Context;
use tracing::{debug, info};

use crate::dag::{BoxFuture, Completion, TaskAction, TaskName};
use crate::errors::Result;
use crate::exec::TaskContext;
use crate::fs::walk_dirs;
use crate::patterns::{relative_str, CompiledGroup};

/// Deletes the files selected by a pattern set, matched relative to the
/// working directory (clean patterns usually name the destination roots,
/// e.g. `target/{app,app-prod}/**`). Matching directories left empty
/// afterwards are removed too.
#[derive(Debug, Clone)]
pub struct CleanTask {
    name: TaskName,
    pattern_set: String,
    /// Only act when this profile was selected on the command line.
    only_in_profile: Option<String>,
}

impl CleanTask {
    pub fn new(name: &str, pattern_set: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern_set: pattern_set.to_string(),
            only_in_profile: None,
        }
    }

    pub fn only_in_profile(mut self, profile: &str) -> Self {
        self.only_in_profile = Some(profile.to_string());
        self
    }

    /// Delete matching files; returns how many were removed.
    ///
    /// The profile restriction compares against the selection made on the
    /// command line, not against profiles switched to later (`serve`).
    pub fn clean(&self, ctx: &TaskContext) -> Result<usize> {
        if let Some(profile) = &self.only_in_profile {
            if ctx.config.selected_profile() != Some(profile.as_str()) {
                debug!(task = %self.name, profile = %profile, "profile not selected; skipping");
                return Ok(0);
            }
        }

        let mut removed = 0;
        let mut pruned = 0;
        for group in ctx.config.pattern_groups(&self.pattern_set)? {
            let compiled = CompiledGroup::compile(&group)?;
            for file in compiled.collect(ctx.fs.as_ref(), &ctx.cwd)? {
                ctx.fs
                    .remove_file(&file.abs)
                    .with_context(|| format!("removing {}", file.abs.display()))?;
                removed += 1;
            }
            pruned += self.prune_dirs(ctx, &compiled)?;
        }

        info!(task = %self.name, removed, pruned, "clean finished");
        Ok(removed)
    }

    /// Remove matching directories that are empty, children first.
    fn prune_dirs(&self, ctx: &TaskContext, group: &CompiledGroup) -> Result<usize> {
        let mut pruned = 0;
        for dir in walk_dirs(ctx.fs.as_ref(), &ctx.cwd)?.into_iter().rev() {
            let Some(rel) = relative_str(&ctx.cwd, &dir) else {
                continue;
            };
            if !group.matches(&rel) || !ctx.fs.read_dir(&dir)?.is_empty() {
                continue;
            }
            ctx.fs
                .remove_dir(&dir)
                .with_context(|| format!("removing {}", dir.display()))?;
            debug!(task = %self.name, dir = %rel, "removed empty directory");
            pruned += 1;
        }
        Ok(pruned)
    }
}

impl TaskAction for CleanTask {
    fn run(&self, ctx: TaskContext) -> BoxFuture<'static, Result<Completion>> {
        let this = self.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || this.clean(&ctx))
                .await
                .map_err(|e| anyhow::anyhow!("clean worker panicked: {e}"))??;
            Ok(Completion::Done)
        })
    }
}
