#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use cbn_build::config::{BuildConfig, RawConfig};
use cbn_build::exec::TaskContext;
use cbn_build::fs::FileSystem;

/// Builder for a build config, to simplify test setup.
///
/// Starts from `src = "webapp/"`, `dest = "target/app/"` and a short
/// debounce window.
pub struct ConfigBuilder {
    table: toml::Table,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut table = toml::Table::new();
        table.insert("src".into(), "webapp/".into());
        table.insert("dest".into(), "target/app/".into());
        table.insert("debounce_ms".into(), toml::Value::Integer(50));
        Self { table }
    }

    pub fn src(mut self, src: &str) -> Self {
        self.table.insert("src".into(), src.into());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.table.insert("dest".into(), dest.into());
        self
    }

    pub fn flag(mut self, name: &str, value: bool) -> Self {
        self.table.insert(name.into(), value.into());
        self
    }

    pub fn debounce_ms(mut self, ms: i64) -> Self {
        self.table.insert("debounce_ms".into(), toml::Value::Integer(ms));
        self
    }

    /// `patterns.<name>` as a flat list (one group).
    pub fn patterns(self, name: &str, globs: &[&str]) -> Self {
        let list = globs.iter().map(|g| toml::Value::from(*g)).collect::<Vec<_>>();
        self.pattern_value(name, toml::Value::Array(list))
    }

    /// `patterns.<name>` as a list of groups.
    pub fn grouped_patterns(self, name: &str, groups: &[&[&str]]) -> Self {
        let list = groups
            .iter()
            .map(|g| toml::Value::Array(g.iter().map(|s| toml::Value::from(*s)).collect()))
            .collect::<Vec<_>>();
        self.pattern_value(name, toml::Value::Array(list))
    }

    fn pattern_value(mut self, name: &str, value: toml::Value) -> Self {
        let patterns = self
            .table
            .entry("patterns")
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(t) = patterns {
            t.insert(name.into(), value);
        }
        self
    }

    /// `[profiles.<name>]` with the given `key = value` overrides.
    pub fn profile(mut self, name: &str, overrides: &[(&str, toml::Value)]) -> Self {
        let profiles = self
            .table
            .entry("profiles")
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(t) = profiles {
            let body = overrides
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<toml::Table>();
            t.insert(name.into(), toml::Value::Table(body));
        }
        self
    }

    pub fn to_toml(&self) -> String {
        toml::to_string(&self.table).expect("config table serializes")
    }

    pub fn raw(&self) -> RawConfig {
        RawConfig::new(self.table.clone())
    }

    pub fn build(&self) -> Arc<BuildConfig> {
        self.raw()
            .snapshot()
            .expect("Failed to build valid config from builder")
    }

    /// A task context over `fs` with `cwd` as the working directory.
    pub fn context(&self, fs: Arc<dyn FileSystem>, cwd: impl AsRef<Path>) -> TaskContext {
        TaskContext::new(self.build(), fs, cwd.as_ref())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
