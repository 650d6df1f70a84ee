// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fileset;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod server;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::{BuildConfig, config_root_dir, load_and_validate};
use crate::engine::{Orchestrator, WatchEvent, WatchSession};
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::TaskGraph;
use crate::server::DevServer;
use crate::transform::TransformRegistry;
use crate::types::Mode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and graph construction
/// - the one-shot build
/// - for serving graphs: dev server, file watcher, watch runtime
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let mut build_cfg = BuildConfig::from_config(&cfg, config_root_dir(&config_path));
    if let Some(port) = args.port {
        build_cfg.server_port = port;
    }
    let mode = args.mode();

    let registry = TransformRegistry::with_builtins();
    let graph = TaskGraph::from_config(&cfg, args.graph.graph_name(), &registry, &build_cfg)?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    if args.dry_run {
        graph.validate(fs.as_ref(), &build_cfg.root, mode)?;
        print_dry_run(&graph, &build_cfg, mode);
        return Ok(());
    }

    let orchestrator = Orchestrator::new(fs, build_cfg.clone(), mode);

    let report = orchestrator.build(&graph).await?;
    for failure in report.failures() {
        error!(task = %failure.task(), "{failure}");
    }
    report.into_result()?;

    if !graph.serve() {
        return Ok(());
    }
    serve_and_watch(&orchestrator, &graph, &build_cfg).await
}

async fn serve_and_watch(orchestrator: &Orchestrator, graph: &TaskGraph, build_cfg: &BuildConfig) -> Result<()> {
    let server = DevServer::new(&build_cfg.destination, &build_cfg.server_host, build_cfg.server_port)
        .start()
        .await
        .context("starting dev server")?;

    let session = WatchSession::new(orchestrator, graph, Some(server.signals()));
    let profiles = crate::watch::build_watch_profiles(graph)?;
    let watcher = crate::watch::spawn_watcher(
        &build_cfg.root,
        vec![build_cfg.destination.clone()],
        profiles,
        session.sender(),
    )?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = session.sender();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(WatchEvent::Shutdown).await;
        });
    }

    let result = session.run().await;
    watcher.cancel();
    server.stop().await;
    info!("bye");
    Ok(result?)
}

/// Print the graph that would run, without touching the destination.
fn print_dry_run(graph: &TaskGraph, build_cfg: &BuildConfig, mode: Mode) {
    println!("sitepipe dry-run");
    println!("  graph = {}", graph.name());
    println!("  mode = {mode}");
    println!("  destination = {}", build_cfg.destination.display());
    if graph.serve() {
        println!("  serve = {}:{}", build_cfg.server_host, build_cfg.server_port);
    }
    println!();

    for (index, phase) in graph.phases().iter().enumerate() {
        println!("phase {} ({} task(s)):", index + 1, phase.len());
        for task in phase {
            println!("  - {} [{}]", task.name, task.transform.name());
            println!("      src: {:?}", task.files.include);
            if !task.files.exclude.is_empty() {
                println!("      exclude: {:?}", task.files.exclude);
            }
            println!("      dest: {}", task.destination().display());
            if task.is_watched() {
                println!("      watch: {:?}", task.watch);
            }
            if task.use_hash {
                println!("      use_hash: true");
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
