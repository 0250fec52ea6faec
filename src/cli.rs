// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Environment variable consulted when `--env` is not given.
pub const ENV_VAR: &str = "CBN_ENV";

/// Command-line arguments for `cbn`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cbn",
    version,
    about = "Profile-driven web application build orchestrator.",
    long_about = None
)]
pub struct CliArgs {
    /// Tasks to run (e.g. `clean`, `copy`, `build-scripts`, `watch`, `serve`).
    ///
    /// Defaults to `default`.
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Build profile to apply (e.g. `development`, `production`).
    ///
    /// If omitted, `CBN_ENV` or `default` will be used.
    #[arg(long, value_name = "NAME")]
    pub env: Option<String>,

    /// Working directory that the config and all patterns are relative to.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub cwd: String,

    /// Path to the build config file (TOML), relative to `--cwd`.
    #[arg(long, value_name = "PATH", default_value = "cbn-build.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CBN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve the config and print tasks and pattern groups without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Requested task names, falling back to `default`.
    pub fn task_names(&self) -> Vec<String> {
        if self.tasks.is_empty() {
            vec!["default".to_string()]
        } else {
            self.tasks.clone()
        }
    }

    /// Profile name from `--env`, then `CBN_ENV`, then `default`.
    pub fn profile_name(&self) -> String {
        self.env
            .clone()
            .or_else(|| std::env::var(ENV_VAR).ok().filter(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| "default".to_string())
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_positional_tasks_means_default() {
        let args = CliArgs::parse_from(["cbn"]);
        assert_eq!(args.task_names(), vec!["default".to_string()]);
        assert_eq!(args.config, "cbn-build.toml");
    }

    #[test]
    fn explicit_env_wins() {
        let args = CliArgs::parse_from(["cbn", "--env", "production", "clean", "copy"]);
        assert_eq!(args.profile_name(), "production");
        assert_eq!(args.task_names(), vec!["clean".to_string(), "copy".to_string()]);
    }
}
