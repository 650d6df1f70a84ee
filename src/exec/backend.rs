// src/exec/backend.rs

//! Pluggable rebuild backend.
//!
//! The watch runtime talks to a [`RebuildExecutor`] instead of running
//! tasks itself, so tests can swap in a fake that records requests and
//! answers with canned [`WatchEvent::RebuildFinished`] events.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::BuildConfig;
use crate::engine::build::{apply_task, resolve_sources};
use crate::engine::{RebuildOutcome, WatchEvent};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::graph::Task;
use crate::types::{Mode, TaskName};
use crate::watch::hash::{HashStore, MemoryHashStore, compute_sources_hash};

pub trait RebuildExecutor: Send {
    /// Start rebuilding `task`. Completion is reported asynchronously as a
    /// `RebuildFinished` event on the runtime channel.
    fn start_rebuild(&mut self, task: TaskName) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Runs rebuilds on the blocking pool through the same code path as the
/// initial build.
pub struct RealRebuildExecutor {
    tasks: HashMap<TaskName, Arc<Task>>,
    fs: Arc<dyn FileSystem>,
    config: Arc<BuildConfig>,
    mode: Mode,
    runtime_tx: mpsc::Sender<WatchEvent>,
    hashes: Arc<Mutex<MemoryHashStore>>,
}

impl std::fmt::Debug for RealRebuildExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealRebuildExecutor")
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl RealRebuildExecutor {
    pub fn new(
        tasks: Vec<Arc<Task>>,
        fs: Arc<dyn FileSystem>,
        config: Arc<BuildConfig>,
        mode: Mode,
        runtime_tx: mpsc::Sender<WatchEvent>,
    ) -> Self {
        Self {
            tasks: tasks.into_iter().map(|t| (t.name.clone(), t)).collect(),
            fs,
            config,
            mode,
            runtime_tx,
            hashes: Arc::new(Mutex::new(MemoryHashStore::new())),
        }
    }
}

impl RebuildExecutor for RealRebuildExecutor {
    fn start_rebuild(&mut self, task: TaskName) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let Some(job) = self.tasks.get(&task).cloned() else {
            // Called from inside the runtime loop: never wait on its own channel.
            let outcome = RebuildOutcome::Failed(format!("unknown task '{task}'"));
            if let Err(err) = tx.try_send(WatchEvent::RebuildFinished { task, outcome }) {
                warn!(%err, "dropped failure report for unknown task");
            }
            return Box::pin(async { Ok(()) });
        };
        let fs = Arc::clone(&self.fs);
        let config = Arc::clone(&self.config);
        let hashes = Arc::clone(&self.hashes);
        let mode = self.mode;

        Box::pin(async move {
            tokio::spawn(async move {
                let joined =
                    tokio::task::spawn_blocking(move || rebuild(fs, &config, &job, mode, &hashes)).await;
                let outcome = joined.unwrap_or_else(|e| RebuildOutcome::Failed(format!("rebuild aborted: {e}")));
                if tx.send(WatchEvent::RebuildFinished { task, outcome }).await.is_err() {
                    debug!("runtime gone before rebuild finished");
                }
            });
            Ok(())
        })
    }
}

fn rebuild(
    fs: Arc<dyn FileSystem>,
    config: &BuildConfig,
    task: &Task,
    mode: Mode,
    hashes: &Mutex<MemoryHashStore>,
) -> RebuildOutcome {
    let sources = match resolve_sources(fs.as_ref(), &config.root, task) {
        Ok(sources) => sources,
        Err(e) => return RebuildOutcome::Failed(e.to_string()),
    };

    let hash = if task.use_hash {
        match compute_sources_hash(fs.as_ref(), &sources) {
            Ok(hash) => {
                let store = hashes.lock().unwrap_or_else(|e| e.into_inner());
                if store.load(&task.name).as_deref() == Some(hash.as_str()) {
                    debug!(task = %task.name, "sources unchanged; skipping rebuild");
                    return RebuildOutcome::Unchanged;
                }
                Some(hash)
            }
            Err(e) => {
                warn!(task = %task.name, error = %e, "hashing failed; rebuilding anyway");
                None
            }
        }
    } else {
        None
    };

    match apply_task(fs, task, sources, mode) {
        Ok(summary) => {
            if let Some(hash) = hash {
                hashes
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .save(&task.name, &hash);
            }
            let outputs: Vec<PathBuf> = summary
                .written
                .iter()
                .map(|p| p.strip_prefix(&config.destination).unwrap_or(p).to_path_buf())
                .collect();
            RebuildOutcome::Built { outputs }
        }
        Err(e) => RebuildOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fileset::FileSet;
    use crate::fs::mock::MockFileSystem;
    use crate::transform::copy;

    fn setup(use_hash: bool) -> (MockFileSystem, RealRebuildExecutor, mpsc::Receiver<WatchEvent>) {
        let fs = MockFileSystem::new();
        fs.add_file("/site/fonts/a.woff", b"a".to_vec());
        let task = Task::new(
            "fonts",
            copy::factory(&toml::Table::new()).unwrap(),
            FileSet::new(["fonts/*.woff"], Vec::<String>::new(), "/site/dist/fonts"),
        )
        .with_watch(["fonts/*.woff"])
        .with_use_hash(use_hash);
        let config = BuildConfig {
            root: PathBuf::from("/site"),
            destination: PathBuf::from("/site/dist"),
            debounce: Duration::from_millis(10),
            server_host: "127.0.0.1".into(),
            server_port: 0,
        };
        let (tx, rx) = mpsc::channel(8);
        let exec = RealRebuildExecutor::new(
            vec![Arc::new(task)],
            Arc::new(fs.clone()),
            Arc::new(config),
            Mode::Development,
            tx,
        );
        (fs, exec, rx)
    }

    async fn next_outcome(rx: &mut mpsc::Receiver<WatchEvent>) -> RebuildOutcome {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(WatchEvent::RebuildFinished { outcome, .. })) => outcome,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn rebuild_reports_outputs_relative_to_destination() {
        let (_fs, mut exec, mut rx) = setup(false);
        exec.start_rebuild("fonts".into()).await.unwrap();
        assert_eq!(
            next_outcome(&mut rx).await,
            RebuildOutcome::Built {
                outputs: vec![PathBuf::from("fonts/a.woff")]
            }
        );
    }

    #[tokio::test]
    async fn unchanged_sources_skip_when_hashing() {
        let (fs, mut exec, mut rx) = setup(true);
        exec.start_rebuild("fonts".into()).await.unwrap();
        assert!(matches!(next_outcome(&mut rx).await, RebuildOutcome::Built { .. }));

        exec.start_rebuild("fonts".into()).await.unwrap();
        assert_eq!(next_outcome(&mut rx).await, RebuildOutcome::Unchanged);

        fs.add_file("/site/fonts/a.woff", b"changed".to_vec());
        exec.start_rebuild("fonts".into()).await.unwrap();
        assert!(matches!(next_outcome(&mut rx).await, RebuildOutcome::Built { .. }));
    }

    #[tokio::test]
    async fn unknown_task_does_not_wait_on_a_full_channel() {
        let fs = MockFileSystem::new();
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(WatchEvent::Shutdown).unwrap();
        let mut exec = RealRebuildExecutor::new(
            Vec::new(),
            Arc::new(fs),
            Arc::new(BuildConfig {
                root: PathBuf::from("/site"),
                destination: PathBuf::from("/site/dist"),
                debounce: Duration::from_millis(10),
                server_host: "127.0.0.1".into(),
                server_port: 0,
            }),
            Mode::Development,
            tx,
        );
        tokio::time::timeout(Duration::from_secs(1), exec.start_rebuild("nope".into()))
            .await
            .expect("start_rebuild returned")
            .unwrap();
        assert!(matches!(rx.recv().await, Some(WatchEvent::Shutdown)));
    }

    #[tokio::test]
    async fn unknown_task_fails() {
        let (_fs, mut exec, mut rx) = setup(false);
        exec.start_rebuild("nope".into()).await.unwrap();
        assert!(matches!(next_outcome(&mut rx).await, RebuildOutcome::Failed(msg) if msg.contains("nope")));
    }
}
