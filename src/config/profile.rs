// src/config/profile.rs

//! Profile overlay: the named partial configurations under `[profiles.*]`.
//!
//! Overlays are shallow (whole top-level values are replaced), cumulative and
//! order-dependent: applying `development` and then `serve` leaves every key
//! that `serve` sets at its `serve` value.

use tracing::{debug, info};

use crate::config::model::RawConfig;
use crate::errors::{BuildError, Result};

/// Profile name that indirects to `default_profile`.
pub const DEFAULT_PROFILE: &str = "default";

/// Used for `"default"` when the config declares no `default_profile`.
pub const FALLBACK_PROFILE: &str = "development";

/// Map the special name `"default"` to the configured default profile.
pub fn effective_profile_name(raw: &RawConfig, name: &str) -> String {
    if name != DEFAULT_PROFILE {
        return name.to_string();
    }
    raw.get("default_profile")
        .or_else(|| raw.get("defaultProfile"))
        .and_then(toml::Value::as_str)
        .unwrap_or(FALLBACK_PROFILE)
        .to_string()
}

/// Overlay the named profile onto `raw`.
///
/// Returns the name of the profile that was applied, or `None` when the
/// config has no such profile (in which case `raw` is left untouched).
pub fn apply_profile(raw: &mut RawConfig, name: &str) -> Result<Option<String>> {
    let name = effective_profile_name(raw, name);

    let profiles = match raw.table.get("profiles") {
        None => return Ok(None),
        Some(toml::Value::Table(t)) => t,
        Some(other) => {
            return Err(BuildError::ConfigError(format!(
                "`profiles` must be a table, found {}",
                other.type_str()
            )));
        }
    };

    let overlay = match profiles.get(&name) {
        None => return Ok(None),
        Some(toml::Value::Table(t)) => t.clone(),
        Some(other) => {
            return Err(BuildError::ConfigError(format!(
                "profile '{name}' must be a table, found {}",
                other.type_str()
            )));
        }
    };

    for (key, value) in overlay {
        debug!(profile = %name, key = %key, "profile overrides key");
        raw.insert(key, value);
    }
    raw.applied_profiles.push(name.clone());

    info!(profile = %name, "applied build profile");
    Ok(Some(name))
}

/// Resolve a profile selection coming from the command surface.
///
/// - `"default"` is optional: if neither `default_profile` nor the fallback
///   exists, the base config is used unmodified.
/// - Any other name must exist; a missing profile is a [`BuildError::ConfigError`].
///
/// `name` is recorded as the selected profile, exactly as given.
pub fn resolve(raw: &mut RawConfig, name: &str) -> Result<Option<String>> {
    let applied = apply_profile(raw, name)?;
    raw.selected_profile = Some(name.to_string());
    if applied.is_none() {
        if name == DEFAULT_PROFILE {
            debug!(
                profile = %effective_profile_name(raw, name),
                "no default profile found; using base configuration"
            );
        } else {
            return Err(BuildError::ConfigError(format!(
                "unknown profile '{name}' (not found under [profiles])"
            )));
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(s: &str) -> RawConfig {
        RawConfig::parse(s).unwrap()
    }

    #[test]
    fn overlay_touches_only_profile_keys() {
        let mut cfg = raw(
            r#"
a = 1
b = 2
[profiles.p]
b = 5
c = 9
"#,
        );
        apply_profile(&mut cfg, "p").unwrap();

        assert_eq!(cfg.get("a").and_then(|v| v.as_integer()), Some(1));
        assert_eq!(cfg.get("b").and_then(|v| v.as_integer()), Some(5));
        assert_eq!(cfg.get("c").and_then(|v| v.as_integer()), Some(9));
        assert_eq!(cfg.applied_profiles(), ["p".to_string()]);
    }

    #[test]
    fn default_indirects_to_declared_default() {
        let base = raw(
            r#"
default_profile = "development"
[profiles.development]
dest = "x"
"#,
        );

        let mut via_default = base.clone();
        let mut explicit = base.clone();
        resolve(&mut via_default, "default").unwrap();
        resolve(&mut explicit, "development").unwrap();

        assert_eq!(via_default.table(), explicit.table());
        assert_eq!(via_default.applied_profiles(), explicit.applied_profiles());
        assert_eq!(via_default.selected_profile(), Some("default"));
        assert_eq!(explicit.selected_profile(), Some("development"));
        assert_eq!(via_default.get("dest").and_then(|v| v.as_str()), Some("x"));
    }

    #[test]
    fn default_without_any_profile_keeps_base() {
        let base = raw("src = \"webapp/\"\n");
        let mut cfg = base.clone();
        assert_eq!(resolve(&mut cfg, "default").unwrap(), None);
        assert_eq!(cfg.table(), base.table());
        assert!(cfg.applied_profiles().is_empty());
    }

    #[test]
    fn unknown_explicit_profile_is_an_error() {
        let mut cfg = raw("[profiles.development]\ndest = \"x\"\n");
        let err = resolve(&mut cfg, "production").unwrap_err();
        assert!(matches!(err, BuildError::ConfigError(_)));
    }

    #[test]
    fn overlays_are_cumulative_and_last_wins() {
        let mut cfg = raw(
            r#"
dest = "base"
minify = false
[profiles.development]
dest = "dev"
minify = true
[profiles.serve]
dest = "served"
"#,
        );
        apply_profile(&mut cfg, "development").unwrap();
        apply_profile(&mut cfg, "serve").unwrap();

        assert_eq!(cfg.get("dest").and_then(|v| v.as_str()), Some("served"));
        assert_eq!(cfg.get("minify").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn switching_keeps_the_selected_profile() {
        let mut cfg = raw(
            r#"
[profiles.production]
dest = "prod"
[profiles.serve]
dest = "served"
"#,
        );
        resolve(&mut cfg, "production").unwrap();
        apply_profile(&mut cfg, "serve").unwrap();

        assert_eq!(cfg.selected_profile(), Some("production"));
        assert_eq!(cfg.applied_profiles(), ["production".to_string(), "serve".to_string()]);
    }

    #[test]
    fn camel_case_default_profile_is_honoured() {
        let mut cfg = raw(
            r#"
defaultProfile = "production"
[profiles.production]
generateMaps = true
dest = "prod"
"#,
        );
        assert_eq!(effective_profile_name(&cfg, "default"), "production");

        resolve(&mut cfg, "default").unwrap();
        assert_eq!(cfg.applied_profiles(), ["production".to_string()]);
        assert_eq!(cfg.get("generate_maps").and_then(|v| v.as_bool()), Some(true));
        assert!(cfg.get("generateMaps").is_none());
    }

    #[test]
    fn camel_case_profile_key_overrides_snake_case_base() {
        let mut cfg = raw(
            r#"
generate_maps = false
[profiles.development]
generateMaps = true
"#,
        );
        apply_profile(&mut cfg, "development").unwrap();
        assert_eq!(cfg.get("generate_maps").and_then(|v| v.as_bool()), Some(true));
    }
}
