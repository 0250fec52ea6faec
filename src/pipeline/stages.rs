// src/pipeline/stages.rs

//! Processor slots and the pipeline shapes used by the built-in tasks.
//!
//! The actual rewriting (transpiling, CSS post-processing, bundling, splitting
//! inline scripts, minification, source maps) is done by external processors
//! plugged into [`Processors`]. Every slot defaults to a pass-through.

use std::sync::Arc;

use tracing::trace;

use crate::config::BuildConfig;
use crate::errors::Result;
use crate::pipeline::compose::{compose, LazyPipeline, StageSpec};
use crate::pipeline::predicate::{ExtClass, FlagRef, Gate, PathMatcher};
use crate::pipeline::{FileRecord, StageFault, Transform};

/// Flag enabling source map bracketing.
pub const MAPS_FLAG: &str = "generate_maps";
pub const MINIFY_FLAG: &str = "minify";
pub const SPLIT_FLAG: &str = "crisper";

/// Pattern set selecting which files on the development bundle path get
/// style and script processing.
pub const PROCESS_FILES_PATTERNS: &str = "vulcanize_process_files";

/// Leaves every file untouched.
#[derive(Debug, Clone)]
pub struct Passthrough {
    name: String,
}

impl Passthrough {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn shared(name: &str) -> Arc<dyn Transform> {
        Arc::new(Self::new(name))
    }
}

impl Transform for Passthrough {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, file: FileRecord, _cfg: &BuildConfig) -> std::result::Result<Vec<FileRecord>, StageFault> {
        trace!(stage = %self.name, path = %file.path, "pass-through");
        Ok(vec![file])
    }
}

/// The pluggable processors behind every built-in pipeline.
#[derive(Clone)]
pub struct Processors {
    pub maps_init: Arc<dyn Transform>,
    pub maps_write: Arc<dyn Transform>,
    /// Script transpiler (`*.js`).
    pub transpile: Arc<dyn Transform>,
    pub minify_scripts: Arc<dyn Transform>,
    /// CSS post-processing of standalone stylesheets.
    pub styles: Arc<dyn Transform>,
    /// CSS post-processing of `<style>` blocks inside markup.
    pub markup_styles: Arc<dyn Transform>,
    /// Inlines imports, styles and scripts into one markup file.
    pub bundle: Arc<dyn Transform>,
    pub minify_markup: Arc<dyn Transform>,
    /// Post-bundling fix-up: split inline scripts out of bundled markup.
    pub split_scripts: Arc<dyn Transform>,
}

impl Default for Processors {
    fn default() -> Self {
        Self {
            maps_init: Passthrough::shared("maps-init"),
            maps_write: Passthrough::shared("maps-write"),
            transpile: Passthrough::shared("transpile"),
            minify_scripts: Passthrough::shared("minify-scripts"),
            styles: Passthrough::shared("styles"),
            markup_styles: Passthrough::shared("markup-styles"),
            bundle: Passthrough::shared("bundle"),
            minify_markup: Passthrough::shared("minify-markup"),
            split_scripts: Passthrough::shared("split-scripts"),
        }
    }
}

fn maps_gate() -> Gate {
    Gate::Flag(FlagRef::new(MAPS_FLAG))
}

/// Scripts: maps-init, then on `*.js` (transpile, then minify when the flag
/// is set), then maps-write.
pub fn scripts_pipeline(p: &Processors) -> LazyPipeline {
    let p = p.clone();
    let js = {
        let p = p.clone();
        compose(move |_cfg| {
            Ok(vec![
                StageSpec::always(p.transpile.clone()),
                StageSpec::when(Gate::Flag(FlagRef::new(MINIFY_FLAG)), p.minify_scripts.clone()),
            ])
        })
    };

    compose(move |_cfg| {
        Ok(vec![
            StageSpec::when(maps_gate(), p.maps_init.clone()),
            StageSpec::nested("scripts", Gate::Path(PathMatcher::glob("*.js")?), js.clone()),
            StageSpec::when(maps_gate(), p.maps_write.clone()),
        ])
    })
}

/// Styles: maps-init, `<style>` blocks in `*.html`, `*.css` files, maps-write.
pub fn styles_pipeline(p: &Processors) -> LazyPipeline {
    let p = p.clone();
    compose(move |_cfg| {
        Ok(vec![
            StageSpec::when(maps_gate(), p.maps_init.clone()),
            StageSpec::when(Gate::Path(PathMatcher::glob("*.html")?), p.markup_styles.clone()),
            StageSpec::when(Gate::Path(PathMatcher::glob("*.css")?), p.styles.clone()),
            StageSpec::when(maps_gate(), p.maps_write.clone()),
        ])
    })
}

/// Styles then scripts on the subset of files selected by
/// `patterns.vulcanize_process_files`, read from the running snapshot.
pub fn processing_pipeline(p: &Processors) -> LazyPipeline {
    let styles = styles_pipeline(p);
    let scripts = scripts_pipeline(p);

    let inner = compose(move |_cfg| {
        Ok(vec![
            StageSpec::nested("styles", Gate::Path(PathMatcher::regex(r"\.(html|css)$")?), styles.clone()),
            StageSpec::nested("scripts", Gate::Path(PathMatcher::regex(r"\.(html|js)$")?), scripts.clone()),
        ])
    });

    compose(move |cfg: &BuildConfig| {
        let selected = PathMatcher::groups(&cfg.pattern_groups(PROCESS_FILES_PATTERNS)?)?;
        Ok(vec![StageSpec::nested("process-files", Gate::Path(selected), inner.clone())])
    })
}

/// Bundling: maps-init, bundle, styles, scripts, minify markup (flag),
/// split scripts (flag), maps-write.
pub fn bundle_pipeline(p: &Processors) -> LazyPipeline {
    let p = p.clone();
    let styles = styles_pipeline(&p);
    let scripts = scripts_pipeline(&p);

    compose(move |_cfg| {
        let markup = PathMatcher::extension(ExtClass::Markup);
        Ok(vec![
            StageSpec::when(maps_gate(), p.maps_init.clone()),
            StageSpec::always(p.bundle.clone()),
            StageSpec::nested("styles", Gate::Path(PathMatcher::regex(r"\.(html|css)$")?), styles.clone()),
            StageSpec::nested("scripts", Gate::Path(PathMatcher::regex(r"\.(html|js)$")?), scripts.clone()),
            StageSpec::when(
                Gate::FlagAndPath(FlagRef::new(MINIFY_FLAG), markup.clone()),
                p.minify_markup.clone(),
            ),
            StageSpec::when(
                Gate::FlagAndPath(FlagRef::new(SPLIT_FLAG), markup),
                p.split_scripts.clone(),
            ),
            StageSpec::when(maps_gate(), p.maps_write.clone()),
        ])
    })
}

/// Labels of the stages a lazy pipeline would run against `cfg`, flags
/// applied, nested pipelines left folded. Used by `--dry-run`.
pub fn active_stage_labels(pipeline: &LazyPipeline, cfg: &BuildConfig) -> Result<Vec<String>> {
    Ok(pipeline
        .build(cfg)?
        .stages()
        .iter()
        .filter(|s| s.gate.enabled(cfg))
        .map(|s| s.label.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::RawConfig;
    use crate::pipeline::transform_fn;

    fn cfg(extra: &str) -> Arc<BuildConfig> {
        RawConfig::parse(&format!("src = \"webapp/\"\ndest = \"target/app/\"\n{extra}"))
            .unwrap()
            .snapshot()
            .unwrap()
    }

    /// Processors that record "<stage>:<path>" into a shared log.
    fn recording() -> (Processors, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let rec = |name: &'static str| {
            let log = Arc::clone(&log);
            transform_fn(name, move |f: FileRecord, _: &BuildConfig| {
                log.lock().unwrap().push(format!("{name}:{}", f.path));
                Ok(vec![f])
            })
        };
        let p = Processors {
            maps_init: rec("maps-init"),
            maps_write: rec("maps-write"),
            transpile: rec("transpile"),
            minify_scripts: rec("minify-scripts"),
            styles: rec("styles"),
            markup_styles: rec("markup-styles"),
            bundle: rec("bundle"),
            minify_markup: rec("minify-markup"),
            split_scripts: rec("split-scripts"),
        };
        (p, log)
    }

    #[test]
    fn bundle_order_with_every_flag_on() {
        let (p, log) = recording();
        let cfg = cfg("generate_maps = true\nminify = true\ncrisper = true\n");

        bundle_pipeline(&p)
            .run(vec![FileRecord::new("elements/elements.html", "<x>")], &cfg)
            .unwrap();

        let log = log.lock().unwrap().clone();
        let stages: Vec<&str> = log.iter().map(|e| e.split(':').next().unwrap()).collect();
        assert_eq!(
            stages,
            vec![
                "maps-init",
                "bundle",
                "maps-init",
                "markup-styles",
                "maps-write",
                "maps-init",
                "maps-write",
                "minify-markup",
                "split-scripts",
                "maps-write",
            ]
        );
    }

    #[test]
    fn bundle_without_flags_skips_optional_stages() {
        let (p, log) = recording();
        let cfg = cfg("crisper = false\n");

        bundle_pipeline(&p)
            .run(vec![FileRecord::new("elements/elements.html", "<x>")], &cfg)
            .unwrap();

        let log = log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "bundle:elements/elements.html".to_string(),
                "markup-styles:elements/elements.html".to_string(),
            ]
        );
    }

    #[test]
    fn scripts_minify_only_js_and_only_when_flagged() {
        let (p, log) = recording();
        let files = vec![FileRecord::new("scripts/a.js", ""), FileRecord::new("scripts/b.html", "")];

        scripts_pipeline(&p).run(files.clone(), &cfg("minify = true\n")).unwrap();
        let with_minify = log.lock().unwrap().drain(..).collect::<Vec<_>>();
        assert_eq!(
            with_minify,
            vec!["transpile:scripts/a.js".to_string(), "minify-scripts:scripts/a.js".to_string()]
        );

        scripts_pipeline(&p).run(files, &cfg("")).unwrap();
        let without = log.lock().unwrap().clone();
        assert_eq!(without, vec!["transpile:scripts/a.js".to_string()]);
    }

    #[test]
    fn processing_reads_selected_patterns_from_the_running_config() {
        let (p, log) = recording();
        let cfg = cfg("[patterns]\nvulcanize_process_files = [\"**\", \"!bower_components/**\"]\n");

        processing_pipeline(&p)
            .run(
                vec![
                    FileRecord::new("elements/x.css", ""),
                    FileRecord::new("bower_components/lib/y.css", ""),
                ],
                &cfg,
            )
            .unwrap();

        assert_eq!(log.lock().unwrap().clone(), vec!["styles:elements/x.css".to_string()]);
    }

    #[test]
    fn dry_run_labels_reflect_flags() {
        let p = Processors::default();
        let labels = active_stage_labels(&scripts_pipeline(&p), &cfg("")).unwrap();
        assert_eq!(labels, vec!["scripts".to_string()]);

        let labels = active_stage_labels(&scripts_pipeline(&p), &cfg("generate_maps = true\n")).unwrap();
        assert_eq!(labels, vec!["maps-init".to_string(), "scripts".to_string(), "maps-write".to_string()]);
    }
}
