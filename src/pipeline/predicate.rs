// src/pipeline/predicate.rs

//! Stage gates.
//!
//! Path matchers are compiled when the stage is composed; the only thing
//! read at run time is the flag value, from the snapshot the run was started
//! with.

use std::fmt;

use globset::GlobMatcher;
use regex::{Regex, RegexBuilder};

use crate::config::BuildConfig;
use crate::errors::{BuildError, Result};
use crate::patterns::{compile_glob, CompiledGroup, PatternGroupSet};
use crate::pipeline::FileRecord;

/// Coarse file type classes used by the built-in pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtClass {
    Markup,
    Style,
    Script,
}

impl ExtClass {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ExtClass::Markup => &["html", "htm"],
            ExtClass::Style => &["css"],
            ExtClass::Script => &["js", "mjs"],
        }
    }

    pub fn of(file: &FileRecord) -> Option<ExtClass> {
        let ext = file.extension()?;
        [ExtClass::Markup, ExtClass::Style, ExtClass::Script]
            .into_iter()
            .find(|class| class.extensions().contains(&ext.as_str()))
    }
}

/// Which files a stage applies to.
#[derive(Clone)]
pub enum PathMatcher {
    /// A single glob. Without a `/` it is matched against the file name,
    /// otherwise against the whole relative path.
    Glob { source: String, matcher: GlobMatcher },
    /// A regular expression searched in the relative path.
    Regex(Regex),
    /// Any of the given file type classes.
    Extension(Vec<ExtClass>),
    /// Any of a set of ordered include/exclude pattern groups.
    Groups(Vec<CompiledGroup>),
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathMatcher::Glob { source, .. } => f.debug_tuple("Glob").field(source).finish(),
            PathMatcher::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            PathMatcher::Extension(classes) => f.debug_tuple("Extension").field(classes).finish(),
            PathMatcher::Groups(groups) => f.debug_tuple("Groups").field(&groups.len()).finish(),
        }
    }
}

impl PathMatcher {
    pub fn glob(pattern: &str) -> Result<Self> {
        Ok(PathMatcher::Glob {
            source: pattern.to_string(),
            matcher: compile_glob(pattern)?,
        })
    }

    /// Case-insensitive regex, e.g. `\.(html|css)$`.
    pub fn regex(pattern: &str) -> Result<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(PathMatcher::Regex)
            .map_err(|e| BuildError::PatternError(format!("invalid regex '{pattern}': {e}")))
    }

    pub fn extension(class: ExtClass) -> Self {
        PathMatcher::Extension(vec![class])
    }

    pub fn groups(groups: &PatternGroupSet) -> Result<Self> {
        let compiled = groups
            .iter()
            .map(|g| CompiledGroup::compile(g))
            .collect::<Result<Vec<_>>>()?;
        Ok(PathMatcher::Groups(compiled))
    }

    pub fn matches(&self, file: &FileRecord) -> bool {
        match self {
            PathMatcher::Glob { source, matcher } => {
                if source.contains('/') {
                    matcher.is_match(&file.path)
                } else {
                    matcher.is_match(file.file_name())
                }
            }
            PathMatcher::Regex(re) => re.is_match(&file.path),
            PathMatcher::Extension(classes) => {
                ExtClass::of(file).is_some_and(|c| classes.contains(&c))
            }
            PathMatcher::Groups(groups) => groups.iter().any(|g| g.matches(&file.path)),
        }
    }
}

/// Reference to a boolean configuration flag, read when a pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRef(pub String);

impl FlagRef {
    pub fn new(name: impl Into<String>) -> Self {
        FlagRef(name.into())
    }

    pub fn is_set(&self, cfg: &BuildConfig) -> bool {
        cfg.flag(&self.0)
    }
}

/// Condition attached to a stage.
#[derive(Debug, Clone)]
pub enum Gate {
    Always,
    /// Applies to matching files only.
    Path(PathMatcher),
    /// Applies to every file, but only while the flag is set.
    Flag(FlagRef),
    /// Applies to matching files, only while the flag is set.
    FlagAndPath(FlagRef, PathMatcher),
}

impl Gate {
    /// Whether the stage takes part in this run at all.
    pub fn enabled(&self, cfg: &BuildConfig) -> bool {
        match self {
            Gate::Always | Gate::Path(_) => true,
            Gate::Flag(flag) | Gate::FlagAndPath(flag, _) => flag.is_set(cfg),
        }
    }

    /// Whether an enabled stage applies to this file.
    pub fn admits(&self, file: &FileRecord) -> bool {
        match self {
            Gate::Always | Gate::Flag(_) => true,
            Gate::Path(m) | Gate::FlagAndPath(_, m) => m.matches(file),
        }
    }
}
