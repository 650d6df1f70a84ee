// src/engine/mod.rs

//! Orchestration engine for sitepipe.
//!
//! - [`build`]: one-shot execution of a task graph, phase by phase.
//! - [`core`]: the pure watch-mode state machine (debounce, rebuild,
//!   pending changes, failure recovery).
//! - [`runtime`]: the async shell that feeds events into the core and
//!   carries out its commands.

use std::path::PathBuf;

use crate::server::ReloadSignal;
use crate::types::TaskName;

pub mod build;
pub mod core;
pub mod runtime;

pub use build::{BuildReport, Orchestrator, TaskReport, TaskSummary, apply_task, run_task};
pub use core::{TaskWatchState, WatchCore};
pub use runtime::{WatchRuntime, WatchSession};

/// Result of one watch-mode rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Outputs written, relative to the destination root.
    Built { outputs: Vec<PathBuf> },
    /// Sources hashed identical to the last successful build.
    Unchanged,
    Failed(String),
}

/// Events flowing into the watch runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file matching the task's watch globs changed.
    Changed { task: TaskName, path: PathBuf },
    /// The debounce timer armed with `generation` fired.
    DebounceElapsed { task: TaskName, generation: u64 },
    RebuildFinished { task: TaskName, outcome: RebuildOutcome },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    Shutdown,
}

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send `DebounceElapsed { task, generation }` after the debounce window.
    ArmDebounce { task: TaskName, generation: u64 },
    StartRebuild(TaskName),
    Reload(ReloadSignal),
    ReportFailure { task: TaskName, error: String },
}

/// Decision returned by the core after handling a single [`WatchEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}
