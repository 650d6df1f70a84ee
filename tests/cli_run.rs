mod common;

use std::path::Path;

use clap::Parser;

use sitepipe::cli::{CliArgs, GraphSelector};
use sitepipe::errors::{GraphConfigError, SitepipeError};

use common::*;

fn args(config: &Path, extra: &[&str]) -> CliArgs {
    let config = config.to_string_lossy().into_owned();
    let mut argv = vec!["sitepipe", "--config", config.as_str()];
    argv.extend_from_slice(extra);
    CliArgs::try_parse_from(argv).unwrap()
}

const SITE: &str = r#"
[config]
destination = "dist"

[task.clean]
transform = "clean"

[task.pages]
transform = "template"
src = ["src/*.html"]
"#;

#[test]
fn unknown_graph_selector_is_a_usage_error() {
    assert!(CliArgs::try_parse_from(["sitepipe", "staging"]).is_err());
    let parsed = CliArgs::try_parse_from(["sitepipe", "release", "--port", "8080"]).unwrap();
    assert_eq!(parsed.graph, GraphSelector::Release);
    assert_eq!(parsed.port, Some(8080));
}

#[tokio::test]
async fn release_run_builds_and_returns() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Sitepipe.toml", SITE);
    write(dir.path(), "src/index.html", "<p>{{ mode }}</p>");

    let config = dir.path().join("Sitepipe.toml");
    with_timeout(sitepipe::run(args(&config, &["release", "--production"])))
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "dist/index.html"), "<p>production</p>");
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Sitepipe.toml", SITE);
    write(dir.path(), "src/index.html", "<p>{{ mode }}</p>");

    let config = dir.path().join("Sitepipe.toml");
    with_timeout(sitepipe::run(args(&config, &["release", "--dry-run"])))
        .await
        .unwrap();

    assert!(!dir.path().join("dist").exists());
}

#[tokio::test]
async fn broken_template_fails_the_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Sitepipe.toml", SITE);
    write(dir.path(), "src/index.html", "<p>{% if %}</p>");

    let config = dir.path().join("Sitepipe.toml");
    let err = with_timeout(sitepipe::run(args(&config, &["release"])))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SitepipeError>(),
        Some(SitepipeError::BuildFailed { failures }) if failures.len() == 1
    ));
}

#[tokio::test]
async fn unknown_transform_is_reported_before_building() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "Sitepipe.toml",
        "[task.css]\ntransform = \"sass\"\nsrc = [\"src/*.scss\"]\n",
    );
    write(dir.path(), "src/main.scss", "a { color: red; }");

    let config = dir.path().join("Sitepipe.toml");
    let err = with_timeout(sitepipe::run(args(&config, &["release"])))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GraphConfigError>(),
        Some(GraphConfigError::UnknownTransformName { name, .. }) if name == "sass"
    ));
    assert!(!dir.path().join("dist").exists());
}

#[tokio::test]
async fn invalid_toml_is_a_config_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Sitepipe.toml", "[task.pages\ntransform = ");

    let config = dir.path().join("Sitepipe.toml");
    let err = sitepipe::run(args(&config, &["release"])).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SitepipeError>(),
        Some(SitepipeError::TomlError(_))
    ));
}

#[test]
fn bundled_demo_config_instantiates_both_graphs() {
    use sitepipe::config::{BuildConfig, load_and_validate};
    use sitepipe::graph::TaskGraph;
    use sitepipe::transform::TransformRegistry;

    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/Sitepipe.toml");
    let cfg = load_and_validate(&path).unwrap();
    let build = BuildConfig::from_config(&cfg, Path::new("/site"));
    let registry = TransformRegistry::with_builtins();

    let develop = TaskGraph::from_config(&cfg, "develop", &registry, &build).unwrap();
    assert!(develop.serve());
    assert_eq!(develop.phases().len(), 2);
    assert_eq!(develop.task("styles").unwrap().destination(), Path::new("/site/dist/css"));

    let release = TaskGraph::from_config(&cfg, "release", &registry, &build).unwrap();
    assert!(!release.serve());
    assert_eq!(release.tasks().count(), 8);
}

#[test]
fn zero_debounce_and_escaping_dest_are_rejected() {
    let err = ConfigFileBuilder::new()
        .debounce_ms(0)
        .with_task("pages", TaskConfigBuilder::new("template").src("src/*.html"))
        .try_build()
        .unwrap_err();
    assert!(matches!(err, SitepipeError::ConfigError(msg) if msg.contains("debounce_ms")));

    let err = ConfigFileBuilder::new()
        .with_task("css", TaskConfigBuilder::new("style").dest("../elsewhere"))
        .try_build()
        .unwrap_err();
    assert!(matches!(err, SitepipeError::ConfigError(msg) if msg.contains("../elsewhere")));
}
