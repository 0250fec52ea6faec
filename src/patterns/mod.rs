// src/patterns/mod.rs

//! Glob pattern handling.
//!
//! - [`normalize`] turns the heterogeneous `patterns.<name>` config values
//!   into an ordered [`PatternGroupSet`].
//! - [`matcher`] compiles one group into an ordered include/exclude matcher
//!   and collects the files it selects.
//! - [`path_utils`] relates event and walk paths back to a pattern root.

pub mod matcher;
pub mod normalize;
pub mod path_utils;

pub use matcher::{compile_glob, CompiledGroup, MatchedFile};
pub use normalize::{normalize, PatternGroup, PatternGroupSet, PatternInput};
pub use path_utils::relative_str;
