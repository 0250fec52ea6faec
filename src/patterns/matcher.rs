// src/patterns/matcher.rs

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};

use crate::errors::{BuildError, Result};
use crate::fs::{walk_files, FileSystem};
use crate::patterns::path_utils::relative_str;

/// Build a single glob matcher with path-aware semantics: `*` stops at `/`,
/// `**` crosses directories.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| BuildError::PatternError(format!("invalid glob pattern '{pattern}': {e}")))
}

#[derive(Clone)]
struct Rule {
    negated: bool,
    matcher: GlobMatcher,
}

/// A compiled pattern group.
///
/// Rules are applied in order: an include marks a path as matched, a
/// `!`-prefixed exclude removes it again, and a later include can bring it
/// back. A group without any include matches nothing.
#[derive(Clone)]
pub struct CompiledGroup {
    source: Vec<String>,
    rules: Vec<Rule>,
}

impl fmt::Debug for CompiledGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGroup")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// A file selected by a pattern group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Location on disk.
    pub abs: PathBuf,
    /// Path relative to the matching root, forward slashes.
    pub rel: String,
}

impl CompiledGroup {
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut rules = Vec::with_capacity(patterns.len());
        for pat in patterns {
            let (negated, glob) = match pat.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, pat.as_str()),
            };
            if glob.is_empty() {
                return Err(BuildError::PatternError(format!(
                    "empty glob in pattern group {patterns:?}"
                )));
            }
            rules.push(Rule {
                negated,
                matcher: compile_glob(glob)?,
            });
        }
        Ok(Self {
            source: patterns.to_vec(),
            rules,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.source
    }

    /// Whether a root-relative path (forward slashes) belongs to this group.
    pub fn matches(&self, rel_path: &str) -> bool {
        let mut matched = false;
        for rule in &self.rules {
            if rule.negated {
                if matched && rule.matcher.is_match(rel_path) {
                    matched = false;
                }
            } else if !matched && rule.matcher.is_match(rel_path) {
                matched = true;
            }
        }
        matched
    }

    /// Collect all files under `root` selected by this group, sorted by path.
    pub fn collect(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<MatchedFile>> {
        let mut out = Vec::new();
        for abs in walk_files(fs, root)? {
            if let Some(rel) = relative_str(root, &abs) {
                if self.matches(&rel) {
                    out.push(MatchedFile { abs, rel });
                }
            }
        }
        Ok(out)
    }
}
