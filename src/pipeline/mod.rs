// src/pipeline/mod.rs

//! Per-file processing pipelines.
//!
//! A pipeline is an ordered list of stages. Each stage is a [`Transform`]
//! (or a nested pipeline) behind a [`Gate`]: a path predicate deciding which
//! files the stage touches, a config flag deciding whether the stage runs at
//! all, or both. Files a stage does not apply to pass through unchanged.
//!
//! - [`predicate`] holds the closed set of gates and path matchers.
//! - [`compose`] builds and runs pipelines, lazily and behind a per-file
//!   fault boundary.
//! - [`stages`] defines the pluggable processors and the pipeline shapes
//!   used by the built-in tasks.
//! - [`cache`] remembers the content hashes last written per destination so
//!   file tasks can skip unchanged inputs.

use std::borrow::Cow;
use std::sync::Arc;

use thiserror::Error;

use crate::config::BuildConfig;

pub mod cache;
pub mod compose;
pub mod predicate;
pub mod stages;

pub use cache::{content_hash, ContentCache};
pub use compose::{compose, LazyPipeline, Pipeline, PipelineOutput, StageBody, StageSpec};
pub use predicate::{ExtClass, FlagRef, Gate, PathMatcher};
pub use stages::Processors;

/// One file flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the source root (and later the destination root),
    /// forward slashes.
    pub path: String,
    pub contents: Vec<u8>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }
}

/// A stage failed on one file.
///
/// The pipeline's fault boundary logs it and drops that file; the rest of
/// the run carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("stage '{stage}' failed on {path}: {message}")]
pub struct StageFault {
    pub stage: String,
    pub path: String,
    pub message: String,
}

impl StageFault {
    pub fn new(stage: impl Into<String>, path: impl Into<String>, message: impl ToString) -> Self {
        Self {
            stage: stage.into(),
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// A processing step applied to one file at a time.
///
/// Implementations may read the configuration (flags, tool option blocks) but
/// never change it. Returning no records drops the file; returning several
/// adds siblings (a split-out script, a source map).
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, file: FileRecord, cfg: &BuildConfig) -> Result<Vec<FileRecord>, StageFault>;
}

/// Adapter turning a closure into a [`Transform`].
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(FileRecord, &BuildConfig) -> Result<Vec<FileRecord>, StageFault> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, file: FileRecord, cfg: &BuildConfig) -> Result<Vec<FileRecord>, StageFault> {
        (self.f)(file, cfg)
    }
}

/// Build a shared transform from a closure.
pub fn transform_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Transform>
where
    F: Fn(FileRecord, &BuildConfig) -> Result<Vec<FileRecord>, StageFault> + Send + Sync + 'static,
{
    Arc::new(FnTransform {
        name: name.into(),
        f,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased_and_dotfiles_have_none() {
        assert_eq!(FileRecord::new("a/B.HTML", "").extension().as_deref(), Some("html"));
        assert_eq!(FileRecord::new("a/.bowerrc", "").extension(), None);
        assert_eq!(FileRecord::new("Makefile", "").extension(), None);
        assert_eq!(FileRecord::new("a/b/c.js", "").file_name(), "c.js");
    }
}
