// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::model::{BuildConfig, RawConfig};
use crate::config::profile;
use crate::errors::{BuildError, Result};

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cbn-build.toml";

/// Load a configuration file from a given path and return the raw table.
///
/// This only performs TOML deserialization; no profile is applied and no
/// semantic validation runs. Any failure is a [`BuildError::ConfigError`]
/// naming the path.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        BuildError::ConfigError(format!("no build config found at {:?}: {e}", path))
    })?;

    RawConfig::parse(&contents)
        .map_err(|e| BuildError::ConfigError(format!("parsing config {:?}: {e}", path)))
}

/// Load a config file, overlay the selected profile and build the first
/// snapshot.
///
/// The raw config is returned too, so that later profile switches (e.g.
/// `serve`) can overlay on top of what was applied here.
pub fn load_and_resolve(
    path: impl AsRef<Path>,
    profile_name: &str,
) -> Result<(RawConfig, Arc<BuildConfig>)> {
    let mut raw = load_from_path(path)?;
    profile::resolve(&mut raw, profile_name)?;
    let snapshot = raw.snapshot()?;
    Ok((raw, snapshot))
}

/// Resolve the config path against the working directory.
pub fn config_path(cwd: &Path, config: &str) -> PathBuf {
    let p = Path::new(config);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}
