// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::errors::{BuildError, Result};
use crate::patterns::{normalize, PatternGroupSet, PatternInput};

/// Configuration exactly as read from disk, before and between profile
/// overlays.
///
/// This is kept as a loose TOML table so that a profile can override any
/// top-level key, including ones this crate knows nothing about (tool option
/// blocks). Use [`RawConfig::snapshot`] to get the typed view that tasks run
/// against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConfig {
    pub(crate) table: toml::Table,
    pub(crate) applied_profiles: Vec<String>,
    pub(crate) selected_profile: Option<String>,
}

/// camelCase spellings accepted for the known top-level keys.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("defaultProfile", "default_profile"),
    ("generateMaps", "generate_maps"),
    ("crisperIncludeScript", "crisper_include_script"),
    ("renameAssets", "rename_assets"),
    ("debounceMs", "debounce_ms"),
];

/// The snake_case name for a known camelCase key; anything else unchanged.
pub(crate) fn canonical_key(key: &str) -> &str {
    KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, name)| *name)
        .unwrap_or(key)
}

/// `clean_production` -> `cleanProduction`.
fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl RawConfig {
    /// Wrap a parsed table. Known camelCase keys are renamed to their
    /// snake_case form.
    pub fn new(table: toml::Table) -> Self {
        let mut raw = Self::default();
        for (key, value) in table {
            raw.insert(key, value);
        }
        raw
    }

    /// Set a top-level key, under its canonical name.
    pub(crate) fn insert(&mut self, key: String, value: toml::Value) {
        let key = canonical_key(&key).to_string();
        self.table.insert(key, value);
    }

    /// Parse a TOML document.
    pub fn parse(contents: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(contents)?;
        Ok(Self::new(table))
    }

    pub fn table(&self) -> &toml::Table {
        &self.table
    }

    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.table.get(key)
    }

    /// Profiles overlaid so far, oldest first.
    pub fn applied_profiles(&self) -> &[String] {
        &self.applied_profiles
    }

    /// The profile name chosen on the command line, as given (`"default"`
    /// stays `"default"`). Later profile switches do not change it.
    pub fn selected_profile(&self) -> Option<&str> {
        self.selected_profile.as_deref()
    }

    /// Produce a validated, immutable [`BuildConfig`] from the current state.
    pub fn snapshot(&self) -> Result<Arc<BuildConfig>> {
        BuildConfig::try_from(self).map(Arc::new)
    }
}

/// Typed, immutable view of the effective configuration for one run.
///
/// ```toml
/// src = "webapp/"
/// dest = ""
/// vulcanize = false
/// default_profile = "development"
///
/// [profiles.development]
/// dest = "target/app/"
///
/// [patterns]
/// scripts = ["scripts/*.{js,html}"]
///
/// [autoprefixer]
/// browsers = ["Firefox >= 30"]
/// ```
///
/// Anything that is not a known field lands in [`BuildConfig::tools`] and is
/// handed to pipeline stages untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Source root, relative to the working directory.
    pub src: String,

    /// Destination root, relative to the working directory. Usually set by a
    /// profile.
    #[serde(default)]
    pub dest: String,

    /// Bundle the elements, or process them as-is?
    #[serde(default)]
    pub vulcanize: bool,

    /// Generate source maps?
    #[serde(default)]
    pub generate_maps: bool,

    /// Minify scripts and bundled markup?
    #[serde(default)]
    pub minify: bool,

    /// Split inline scripts out of bundled markup?
    #[serde(default = "default_true")]
    pub crisper: bool,

    /// Keep a `<script>` reference to the split-out script?
    #[serde(default)]
    pub crisper_include_script: bool,

    /// Rename assets to include a revision hash?
    #[serde(default)]
    pub rename_assets: bool,

    /// Coalescing window for watch-triggered rebuilds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Profile selected by the name `"default"`.
    #[serde(default)]
    pub default_profile: Option<String>,

    #[serde(default)]
    pub profiles: BTreeMap<String, toml::Table>,

    /// Named pattern group inputs (`patterns.scripts`, `patterns.others`, ...).
    #[serde(default)]
    pub patterns: BTreeMap<String, PatternInput>,

    /// Opaque third-party tool option blocks.
    #[serde(flatten)]
    pub tools: toml::Table,

    /// Profiles that were overlaid to produce this snapshot, oldest first.
    #[serde(skip)]
    pub applied_profiles: Vec<String>,

    /// See [`RawConfig::selected_profile`].
    #[serde(skip)]
    pub selected_profile: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

impl BuildConfig {
    /// Read a boolean flag by name, for flag-gated pipeline stages.
    ///
    /// Unknown names are looked up in the tool table; anything missing or
    /// non-boolean reads as `false`.
    pub fn flag(&self, name: &str) -> bool {
        match name {
            "vulcanize" => self.vulcanize,
            "generate_maps" => self.generate_maps,
            "minify" => self.minify,
            "crisper" => self.crisper,
            "crisper_include_script" => self.crisper_include_script,
            "rename_assets" => self.rename_assets,
            other => self
                .tools
                .get(other)
                .and_then(toml::Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// Opaque option block for a third-party tool (e.g. `autoprefixer`).
    pub fn tool(&self, name: &str) -> Option<&toml::Value> {
        self.tools.get(name)
    }

    /// Normalised pattern groups for `patterns.<name>`; empty if undefined.
    ///
    /// `patterns.cleanProduction` is found under `clean_production` when no
    /// snake_case entry exists. A value of the wrong shape is a
    /// [`BuildError::PatternError`].
    pub fn pattern_groups(&self, name: &str) -> Result<PatternGroupSet> {
        let input = self
            .patterns
            .get(name)
            .or_else(|| self.patterns.get(&camel_case(name)));
        normalize(input).map_err(|e| match e {
            BuildError::PatternError(msg) => BuildError::PatternError(format!("patterns.{name}: {msg}")),
            other => other,
        })
    }

    /// The most recently applied profile, if any.
    pub fn active_profile(&self) -> Option<&str> {
        self.applied_profiles.last().map(String::as_str)
    }

    /// See [`RawConfig::selected_profile`].
    pub fn selected_profile(&self) -> Option<&str> {
        self.selected_profile.as_deref()
    }

    pub fn src_root(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.src)
    }

    pub fn dest_root(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.dest)
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

impl TryFrom<&RawConfig> for BuildConfig {
    type Error = BuildError;

    fn try_from(raw: &RawConfig) -> std::result::Result<Self, Self::Error> {
        let mut cfg: BuildConfig = toml::Value::Table(raw.table.clone())
            .try_into()
            .map_err(|e| BuildError::ConfigError(format!("invalid configuration: {e}")))?;
        cfg.applied_profiles = raw.applied_profiles.clone();
        cfg.selected_profile = raw.selected_profile.clone();
        crate::config::validate::validate_build_config(&cfg)?;
        Ok(cfg)
    }
}
