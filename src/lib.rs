// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod patterns;
pub mod pipeline;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{config_path, load_and_resolve, BuildConfig};
use crate::dag::{Scheduler, TaskKind, TaskRegistry};
use crate::engine::Orchestrator;
use crate::exec::{default_watch_bindings, register_builtin_tasks};
use crate::fs::RealFileSystem;
use crate::pipeline::stages::{
    active_stage_labels, bundle_pipeline, processing_pipeline, scripts_pipeline, styles_pipeline,
};
use crate::pipeline::Processors;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the initial profile
/// - the builtin task table and the scheduler
/// - the orchestrator, which runs tasks and the `watch` / `serve` commands
pub async fn run(args: CliArgs) -> Result<()> {
    let cwd = PathBuf::from(&args.cwd);
    let path = config_path(&cwd, &args.config);
    let profile = args.profile_name();

    let (raw, snapshot) = load_and_resolve(&path, &profile)?;
    info!(
        config = %path.display(),
        profile = ?snapshot.active_profile(),
        src = %snapshot.src,
        dest = %snapshot.dest,
        "configuration resolved"
    );

    let processors = Processors::default();
    let mut registry = TaskRegistry::new();
    register_builtin_tasks(&mut registry, &processors);

    if args.dry_run {
        print_dry_run(&snapshot, &registry, &processors)?;
        return Ok(());
    }

    let scheduler = Scheduler::new(registry).context("invalid task table")?;
    let orchestrator = Orchestrator::new(
        scheduler,
        raw,
        snapshot,
        Arc::new(RealFileSystem),
        cwd,
        default_watch_bindings(),
    );

    orchestrator.run_command(&args.task_names()).await?;
    Ok(())
}

/// Print the resolved configuration, the task table, pattern groups and the
/// stages each pipeline would run.
fn print_dry_run(cfg: &BuildConfig, registry: &TaskRegistry, processors: &Processors) -> Result<()> {
    println!("cbn dry-run");
    println!("  profile = {}", cfg.active_profile().unwrap_or("<none>"));
    println!("  selected = {}", cfg.selected_profile().unwrap_or("<none>"));
    println!("  applied = {:?}", cfg.applied_profiles);
    println!("  src = {}", cfg.src);
    println!("  dest = {}", cfg.dest);
    println!(
        "  flags: vulcanize={} generate_maps={} minify={} crisper={}",
        cfg.vulcanize, cfg.generate_maps, cfg.minify, cfg.crisper
    );
    println!("  debounce_ms = {}", cfg.debounce_ms);
    println!();

    println!("tasks ({}):", registry.len());
    for def in registry.tasks() {
        println!("  - {}", def.name);
        if !def.predecessors.is_empty() {
            println!("      after: {:?}", def.predecessors);
        }
        if let TaskKind::Sequence(steps) = &def.kind {
            let steps: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
            println!("      sequence: {}", steps.join(" -> "));
        }
    }
    println!();

    println!("patterns ({}):", cfg.patterns.len());
    for name in cfg.patterns.keys() {
        match cfg.pattern_groups(name) {
            Ok(groups) => {
                for (idx, group) in groups.iter().enumerate() {
                    println!("  - {name}#{idx}: {group:?}");
                }
            }
            Err(e) => println!("  - {name}: {e}"),
        }
    }
    println!();

    println!("pipelines:");
    let pipelines = [
        ("scripts", scripts_pipeline(processors)),
        ("styles", styles_pipeline(processors)),
        ("processing", processing_pipeline(processors)),
        ("bundle", bundle_pipeline(processors)),
    ];
    for (name, pipeline) in &pipelines {
        let labels = active_stage_labels(pipeline, cfg)?;
        println!("  - {name}: {}", labels.join(", "));
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
