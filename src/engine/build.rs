// src/engine/build.rs

//! One-shot graph execution.
//!
//! Phases run in order. Each task of a phase runs on the blocking pool;
//! the phase ends when all of them have finished, and a failure in any of
//! them stops the graph before the next phase starts.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::BuildConfig;
use crate::errors::{Result, SitepipeError, TaskError, TransformError};
use crate::fileset::{SourceFile, resolve};
use crate::fs::FileSystem;
use crate::graph::{Task, TaskGraph};
use crate::transform::{Artifact, TransformInput};
use crate::types::{Mode, TaskName};

/// What one task changed on disk (absolute paths).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub written: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct TaskReport {
    pub task: TaskName,
    /// Zero-based phase index.
    pub phase: usize,
    pub result: std::result::Result<TaskSummary, TaskError>,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub tasks: Vec<TaskReport>,
    /// Index of the phase that failed, if the graph stopped early.
    pub halted_after: Option<usize>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(|t| t.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskError> {
        self.tasks.iter().filter_map(|t| t.result.as_ref().err())
    }

    pub fn written(&self) -> impl Iterator<Item = &PathBuf> {
        self.tasks
            .iter()
            .filter_map(|t| t.result.as_ref().ok())
            .flat_map(|s| s.written.iter())
    }

    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.task == name)
    }

    /// `Err(BuildFailed)` carrying every task error, if there were any.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let failures = self.tasks.into_iter().filter_map(|t| t.result.err()).collect();
        Err(SitepipeError::BuildFailed { failures })
    }
}

/// Resolve a task's file set against `root`.
pub fn resolve_sources(
    fs: &dyn FileSystem,
    root: &Path,
    task: &Task,
) -> std::result::Result<Vec<SourceFile>, TaskError> {
    resolve(fs, root, &task.files).map_err(|source| TaskError::FileSet {
        task: task.name.clone(),
        source,
    })
}

/// Run the task's transform over `sources` and apply its artifacts.
///
/// Every artifact is attempted even after one fails, so a bad input never
/// costs the outputs of the good ones. The first error is returned.
pub fn apply_task(
    fs: Arc<dyn FileSystem>,
    task: &Task,
    sources: Vec<SourceFile>,
    mode: Mode,
) -> std::result::Result<TaskSummary, TaskError> {
    let destination = task.destination();
    let input = TransformInput {
        sources,
        destination,
        fs: Arc::clone(&fs),
        mode,
    };

    let mut summary = TaskSummary::default();
    let mut first_error: Option<TransformError> = None;
    let mut failed = 0usize;

    for item in task.transform.apply(input) {
        let outcome = item.and_then(|artifact| apply_artifact(fs.as_ref(), destination, artifact, &mut summary));
        if let Err(err) = outcome {
            warn!(task = %task.name, error = %err, "artifact failed");
            failed += 1;
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        None => Ok(summary),
        Some(source) => {
            if failed > 1 {
                debug!(task = %task.name, failed, "multiple artifacts failed");
            }
            Err(TaskError::Transform {
                task: task.name.clone(),
                source,
            })
        }
    }
}

/// Resolve and apply in one go.
pub fn run_task(
    fs: Arc<dyn FileSystem>,
    root: &Path,
    task: &Task,
    mode: Mode,
) -> std::result::Result<TaskSummary, TaskError> {
    let sources = resolve_sources(fs.as_ref(), root, task)?;
    debug!(task = %task.name, sources = sources.len(), transform = task.transform.name(), "running task");
    apply_task(fs, task, sources, mode)
}

fn apply_artifact(
    fs: &dyn FileSystem,
    destination: &Path,
    artifact: Artifact,
    summary: &mut TaskSummary,
) -> std::result::Result<(), TransformError> {
    match artifact {
        Artifact::File(file) => {
            let path = inside(destination, &file.path)?;
            fs.write_atomic(&path, &file.bytes)
                .map_err(|source| TransformError::WriteFailure {
                    path: path.clone(),
                    source,
                })?;
            summary.written.push(path);
        }
        Artifact::Delete(rel) => {
            let path = inside(destination, &rel)?;
            match fs.remove(&path) {
                Ok(()) => summary.removed.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(TransformError::WriteFailure { path, source }),
            }
        }
    }
    Ok(())
}

/// Join `rel` onto `destination`, refusing anything that would leave it.
fn inside(destination: &Path, rel: &Path) -> std::result::Result<PathBuf, TransformError> {
    let escapes = rel.as_os_str().is_empty()
        || rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(TransformError::WriteFailure {
            path: destination.join(rel),
            source: io::Error::new(io::ErrorKind::InvalidInput, "output path leaves the task destination"),
        });
    }
    Ok(destination.join(rel))
}

/// Runs task graphs against one filesystem in one mode.
#[derive(Clone)]
pub struct Orchestrator {
    fs: Arc<dyn FileSystem>,
    config: Arc<BuildConfig>,
    mode: Mode,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("root", &self.config.root)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(fs: Arc<dyn FileSystem>, config: BuildConfig, mode: Mode) -> Self {
        Self {
            fs,
            config: Arc::new(config),
            mode,
        }
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn config(&self) -> &Arc<BuildConfig> {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Build every phase of `graph`.
    ///
    /// Destination conflicts are reported as `Err` before anything is
    /// written; task failures are recorded in the returned report.
    pub async fn build(&self, graph: &TaskGraph) -> Result<BuildReport> {
        graph.validate(self.fs.as_ref(), &self.config.root, self.mode)?;

        let started = Instant::now();
        let mut report = BuildReport::default();
        info!(graph = %graph.name(), mode = %self.mode, phases = graph.phases().len(), "build started");

        for (index, phase) in graph.phases().iter().enumerate() {
            let names: Vec<&str> = phase.iter().map(|t| t.name.as_str()).collect();
            debug!(phase = index + 1, tasks = ?names, "starting phase");

            let handles: Vec<_> = phase
                .iter()
                .map(|task| {
                    let name = task.name.clone();
                    let task = Arc::clone(task);
                    let fs = Arc::clone(&self.fs);
                    let config = Arc::clone(&self.config);
                    let mode = self.mode;
                    let handle = tokio::task::spawn_blocking(move || {
                        let started = Instant::now();
                        let result = run_task(fs, &config.root, &task, mode);
                        (result, started.elapsed())
                    });
                    (name, handle)
                })
                .collect();

            let mut phase_failed = false;
            for (name, handle) in handles {
                let (result, elapsed) = match handle.await {
                    Ok(done) => done,
                    Err(join_err) => {
                        let reason = if join_err.is_panic() {
                            "transform panicked".to_string()
                        } else {
                            "worker cancelled".to_string()
                        };
                        (
                            Err(TaskError::Panicked {
                                task: name.clone(),
                                reason,
                            }),
                            Duration::ZERO,
                        )
                    }
                };

                match &result {
                    Ok(summary) => info!(
                        task = %name,
                        written = summary.written.len(),
                        removed = summary.removed.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "task finished"
                    ),
                    Err(err) => {
                        phase_failed = true;
                        error!(task = %name, error = %err, "task failed");
                    }
                }
                report.tasks.push(TaskReport {
                    task: name,
                    phase: index,
                    result,
                    elapsed,
                });
            }

            if phase_failed {
                warn!(phase = index + 1, "phase failed; skipping remaining phases");
                report.halted_after = Some(index);
                break;
            }
        }

        info!(
            graph = %graph.name(),
            ok = report.is_success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build finished"
        );
        Ok(report)
    }
}
