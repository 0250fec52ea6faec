// tests/build_end_to_end.rs

mod common;

use std::future;

use common::Project;

use cbn_build::config::{load_and_resolve, resolve, RawConfig};
use cbn_build::errors::BuildError;
use cbn_build::pipeline::{transform_fn, FileRecord, Processors, StageFault};
use cbn_build_test_utils::builders::ConfigBuilder;
use cbn_build_test_utils::{init_tracing, with_timeout};

fn webapp(project: &Project) {
    project.write("webapp/index.html", "<html></html>");
    project.write("webapp/images/logo.png", "png");
    project.write("webapp/notes.txt", "not copied");
    project.write("webapp/scripts/app.js", "let a = 1;");
    project.write("webapp/scripts/util.js", "let b = 2;");
    project.write("webapp/styles/main.css", "a { color: red }");
    project.write("webapp/elements/my-el.html", "<dom-module></dom-module>");
}

fn config() -> ConfigBuilder {
    ConfigBuilder::new()
        .patterns("others", &["index.html", "images/**"])
        .patterns("scripts", &["scripts/*.js"])
        .patterns("styles", &["styles/*.css"])
        .patterns("development_vulcanize", &["elements/**/*.html"])
        .patterns("vulcanize_process_files", &["elements/**"])
        .patterns("clean", &["target/**"])
        .patterns("clean_production", &["target/app-prod/**"])
        .profile(
            "production",
            &[
                ("dest", "target/app-prod/".into()),
                ("minify", true.into()),
                ("vulcanize", false.into()),
            ],
        )
        .profile("serve", &[("dest", "target/serve/".into())])
}

#[tokio::test]
async fn build_scripts_copies_first_then_writes_scripts() {
    init_tracing();
    let project = Project::new();
    webapp(&project);
    let orch = project.orchestrator(&config());

    let report = with_timeout(orch.run(&["build-scripts".to_string()])).await.unwrap();

    assert_eq!(report.completed, vec!["copy".to_string(), "build-scripts".to_string()]);
    assert_eq!(project.read("target/app/scripts/app.js").as_deref(), Some("let a = 1;"));
    assert_eq!(project.read("target/app/scripts/util.js").as_deref(), Some("let b = 2;"));
    assert_eq!(project.read("target/app/index.html").as_deref(), Some("<html></html>"));
    assert!(project.exists("target/app/images/logo.png"));
    assert!(!project.exists("target/app/notes.txt"));
    assert!(!project.exists("target/app/styles/main.css"));
}

#[tokio::test]
async fn default_builds_everything_on_the_development_path() {
    let project = Project::new();
    webapp(&project);
    let orch = project.orchestrator(&config());

    with_timeout(orch.run(&["default".to_string()])).await.unwrap();

    for rel in [
        "target/app/index.html",
        "target/app/scripts/app.js",
        "target/app/styles/main.css",
        "target/app/elements/my-el.html",
    ] {
        assert!(project.exists(rel), "{rel} should have been written");
    }
}

#[tokio::test]
async fn processors_rewrite_contents_and_minify_follows_the_flag() {
    let project = Project::new();
    webapp(&project);

    let processors = Processors {
        transpile: transform_fn("transpile", |f: FileRecord, _cfg| {
            let text = f.text().replace("let", "var");
            Ok(vec![FileRecord::new(f.path.clone(), text)])
        }),
        minify_scripts: transform_fn("minify", |f: FileRecord, _cfg| {
            let text = f.text().replace(' ', "");
            Ok(vec![FileRecord::new(f.path.clone(), text)])
        }),
        ..Processors::default()
    };

    let plain = project.orchestrator_with(&config(), &processors);
    with_timeout(plain.run(&["build-scripts".to_string()])).await.unwrap();
    assert_eq!(project.read("target/app/scripts/app.js").as_deref(), Some("var a = 1;"));

    let minified = project.orchestrator_with(&config().flag("minify", true), &processors);
    with_timeout(minified.run(&["build-scripts".to_string()])).await.unwrap();
    assert_eq!(project.read("target/app/scripts/app.js").as_deref(), Some("vara=1;"));
}

#[tokio::test]
async fn a_faulting_file_is_dropped_and_the_rest_are_written() {
    init_tracing();
    let project = Project::new();
    webapp(&project);
    project.write("webapp/scripts/broken.js", "let = ;");

    let processors = Processors {
        transpile: transform_fn("transpile", |f: FileRecord, _cfg| {
            if f.path.ends_with("broken.js") {
                return Err(StageFault::new("transpile", f.path.clone(), "unexpected token"));
            }
            Ok(vec![f])
        }),
        ..Processors::default()
    };
    let orch = project.orchestrator_with(&config(), &processors);

    with_timeout(orch.run(&["build-scripts".to_string()])).await.unwrap();

    assert!(project.exists("target/app/scripts/app.js"));
    assert!(!project.exists("target/app/scripts/broken.js"));
}

#[tokio::test]
async fn production_cleans_its_output_before_building() {
    let project = Project::new();
    webapp(&project);
    project.write("target/app-prod/stale.js", "old");
    let orch = project.orchestrator_selecting(&config(), "production");

    with_timeout(orch.run(&["default".to_string()])).await.unwrap();

    assert!(!project.exists("target/app-prod/stale.js"));
    assert!(project.exists("target/app-prod/scripts/app.js"));
    assert!(!project.exists("target/app/scripts/app.js"));
}

#[tokio::test]
async fn serving_a_production_selection_still_cleans_first() {
    init_tracing();
    let project = Project::new();
    webapp(&project);
    project.write("target/app-prod/stale.js", "old");
    let orch = project.orchestrator_selecting(&config(), "production");

    with_timeout(orch.serve_until(future::ready(()))).await.unwrap();

    assert_eq!(orch.snapshot().active_profile(), Some("serve"));
    assert!(!project.exists("target/app-prod/stale.js"));
    assert!(project.exists("target/serve/scripts/app.js"));
}

#[tokio::test]
async fn default_selection_does_not_clean_even_when_it_means_production() {
    let project = Project::new();
    webapp(&project);
    project.write("target/app-prod/stale.js", "old");
    let mut table = config().raw().table().clone();
    table.insert("default_profile".into(), "production".into());
    let mut raw = RawConfig::new(table);
    resolve(&mut raw, "default").unwrap();
    let snapshot = raw.snapshot().unwrap();
    assert_eq!(snapshot.active_profile(), Some("production"));
    let orch = project.orchestrator_from(raw, snapshot);

    with_timeout(orch.run(&["default".to_string()])).await.unwrap();

    assert!(project.exists("target/app-prod/stale.js"));
    assert!(project.exists("target/app-prod/scripts/app.js"));
}

#[tokio::test]
async fn switching_destination_rewrites_unchanged_elements() {
    let project = Project::new();
    webapp(&project);
    let orch = project.orchestrator(&config());

    with_timeout(orch.run(&["vulcanize".to_string()])).await.unwrap();
    assert!(project.exists("target/app/elements/my-el.html"));

    orch.switch_profile("serve").unwrap();
    with_timeout(orch.run(&["vulcanize".to_string()])).await.unwrap();

    assert_eq!(
        project.read("target/serve/elements/my-el.html").as_deref(),
        Some("<dom-module></dom-module>")
    );
}

#[tokio::test]
async fn elements_are_written_once_a_blocked_destination_clears() {
    init_tracing();
    let project = Project::new();
    webapp(&project);
    project.write("target/app", "not a directory");
    let cfg = ConfigBuilder::new().patterns("development_vulcanize", &["elements/**/*.html"]);
    let orch = project.orchestrator(&cfg);

    let err = with_timeout(orch.run(&["vulcanize".to_string()])).await.unwrap_err();
    assert_eq!(err.failed_task(), Some("vulcanize"));

    std::fs::remove_file(project.path("target/app")).unwrap();
    with_timeout(orch.run(&["vulcanize".to_string()])).await.unwrap();

    assert!(project.exists("target/app/elements/my-el.html"));
}

#[tokio::test]
async fn malformed_patterns_fail_only_the_task_that_uses_them() {
    let project = Project::new();
    webapp(&project);
    project.write("target/app/old.js", "old");
    project.write(
        "cbn.toml",
        r#"
src = "webapp/"
dest = "target/app/"

[patterns]
scripts = ["scripts/*.js", ["scripts/util.js"]]
clean = ["target/**"]
"#,
    );

    let (raw, snapshot) = load_and_resolve(project.path("cbn.toml"), "default").unwrap();
    let orch = project.orchestrator_from(raw, snapshot);

    with_timeout(orch.run(&["clean".to_string()])).await.unwrap();
    assert!(!project.exists("target/app/old.js"));

    let err = with_timeout(orch.run(&["build-scripts".to_string()])).await.unwrap_err();
    assert_eq!(err.failed_task(), Some("build-scripts"));
    assert!(matches!(err, BuildError::TaskFailed { ref reason, .. } if reason.contains("patterns.scripts")));
}

#[tokio::test]
async fn development_default_leaves_production_output_alone() {
    let project = Project::new();
    webapp(&project);
    project.write("target/app-prod/stale.js", "old");
    let orch = project.orchestrator(&config());

    with_timeout(orch.run(&["default".to_string()])).await.unwrap();

    assert!(project.exists("target/app-prod/stale.js"));
}

#[tokio::test]
async fn clean_removes_matching_files() {
    let project = Project::new();
    webapp(&project);
    project.write("target/app/old.js", "old");
    project.write("target/app/WEB-INF/web.xml", "<web/>");

    let cfg = config().patterns("clean", &["target/**", "!target/*/WEB-INF/**"]);
    let orch = project.orchestrator(&cfg);

    with_timeout(orch.run(&["clean".to_string()])).await.unwrap();

    assert!(!project.exists("target/app/old.js"));
    assert!(project.exists("target/app/WEB-INF/web.xml"));
    assert!(project.exists("webapp/scripts/app.js"));
}

#[tokio::test]
async fn clean_prunes_directories_it_empties() {
    let project = Project::new();
    webapp(&project);
    project.write("target/app/elements/my-el/my-el.html", "old");
    project.write("target/app/WEB-INF/web.xml", "<web/>");

    let cfg = config().patterns("clean", &["target/**", "!target/*/WEB-INF/**"]);
    let orch = project.orchestrator(&cfg);

    with_timeout(orch.run(&["clean".to_string()])).await.unwrap();

    assert!(!project.exists("target/app/elements"));
    assert!(project.exists("target/app/WEB-INF/web.xml"));
    assert!(project.exists("webapp/elements"));
}

#[tokio::test]
async fn task_without_patterns_succeeds_silently() {
    let project = Project::new();
    webapp(&project);
    let orch = project.orchestrator(&ConfigBuilder::new().patterns("scripts", &["scripts/*.js"]));

    let report = with_timeout(orch.run(&["build-styles".to_string()])).await.unwrap();

    assert_eq!(report.completed, vec!["copy".to_string(), "build-styles".to_string()]);
    assert_eq!(report.units, 0);
}

#[tokio::test]
async fn flags_are_read_when_the_task_runs() {
    let project = Project::new();
    webapp(&project);
    let processors = Processors {
        minify_scripts: transform_fn("minify", |f: FileRecord, _cfg| {
            let text = f.text().replace(' ', "");
            Ok(vec![FileRecord::new(f.path.clone(), text)])
        }),
        ..Processors::default()
    };
    let orch = project.orchestrator_with(&config(), &processors);

    with_timeout(orch.run(&["build-scripts".to_string()])).await.unwrap();
    assert_eq!(project.read("target/app/scripts/app.js").as_deref(), Some("let a = 1;"));

    orch.switch_profile("production").unwrap();
    with_timeout(orch.run(&["build-scripts".to_string()])).await.unwrap();
    assert_eq!(project.read("target/app-prod/scripts/app.js").as_deref(), Some("leta=1;"));
}
