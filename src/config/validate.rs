// src/config/validate.rs

use crate::config::model::BuildConfig;
use crate::errors::{BuildError, Result};

/// Semantic checks on a deserialized snapshot.
///
/// Pattern syntax is deliberately not checked here: a malformed glob is a
/// task failure for the task that uses it, not a reason to refuse to start.
pub(crate) fn validate_build_config(cfg: &BuildConfig) -> Result<()> {
    ensure_non_empty("src", &cfg.src)?;
    ensure_non_empty("dest", &cfg.dest)?;

    if cfg.debounce_ms == 0 {
        return Err(BuildError::ConfigError(
            "debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if normalized(&cfg.src) == normalized(&cfg.dest) {
        return Err(BuildError::ConfigError(format!(
            "dest '{}' must differ from src '{}'",
            cfg.dest, cfg.src
        )));
    }

    Ok(())
}

fn ensure_non_empty(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BuildError::ConfigError(format!(
            "`{key}` is empty; set it in the config or in the selected profile"
        )));
    }
    Ok(())
}

fn normalized(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_end_matches('/')
}
