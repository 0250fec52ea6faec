// src/patterns/normalize.rs

//! Normalisation of `patterns.<name>` entries into pattern group sets.

use serde::{Deserialize, Serialize};

use crate::errors::{BuildError, Result};

/// One ordered list of include / `!`exclude globs matched as a unit.
pub type PatternGroup = Vec<String>;

/// Ordered sequence of pattern groups; each group is processed as an
/// independent sub-task.
pub type PatternGroupSet = Vec<PatternGroup>;

/// A `patterns.<name>` value exactly as written in the config.
///
/// ```toml
/// [patterns]
/// scripts = ["scripts/*.{js,html}"]
/// others = [["**", "!bower_components/**"], ["*.{html,js,css}"]]
/// ```
///
/// Values of any other shape (a bare string, a list mixing strings and
/// lists) are kept as [`PatternInput::Malformed`] so that loading the config
/// still succeeds; they fail the task that asks for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternInput {
    /// Already grouped: a list whose first element is itself a list.
    Grouped(Vec<Vec<String>>),
    /// Flat list of globs forming a single group.
    Flat(Vec<String>),
    Malformed(toml::Value),
}

impl From<PatternGroupSet> for PatternInput {
    fn from(groups: PatternGroupSet) -> Self {
        PatternInput::Grouped(groups)
    }
}

impl From<Vec<&str>> for PatternInput {
    fn from(globs: Vec<&str>) -> Self {
        PatternInput::Flat(globs.into_iter().map(str::to_string).collect())
    }
}

/// Turn any pattern input into a uniform group sequence.
///
/// - `None` or an empty list yields no groups.
/// - A flat list becomes exactly one group.
/// - A grouped list is passed through unchanged, so
///   `normalize(normalize(x)) == normalize(x)`.
/// - Anything else is a [`BuildError::PatternError`].
pub fn normalize(globs: Option<&PatternInput>) -> Result<PatternGroupSet> {
    match globs {
        None => Ok(Vec::new()),
        Some(PatternInput::Flat(list)) if list.is_empty() => Ok(Vec::new()),
        Some(PatternInput::Flat(list)) => Ok(vec![list.clone()]),
        Some(PatternInput::Grouped(groups)) => Ok(groups.clone()),
        Some(PatternInput::Malformed(value)) => Err(BuildError::PatternError(format!(
            "expected a list of globs or a list of glob lists, found {value}"
        ))),
    }
}
