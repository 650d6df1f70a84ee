// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::Orchestrator;
use crate::errors::Result;
use crate::exec::{RealRebuildExecutor, RebuildExecutor};
use crate::graph::TaskGraph;
use crate::server::ReloadSignal;

use super::core::WatchCore;
use super::{CoreCommand, WatchEvent};

/// Drives the watch core in response to [`WatchEvent`]s and delegates the
/// rebuilds themselves to a [`RebuildExecutor`].
pub struct WatchRuntime<E: RebuildExecutor> {
    core: WatchCore,
    event_rx: mpsc::Receiver<WatchEvent>,
    /// Used by debounce timers to report back.
    event_tx: mpsc::Sender<WatchEvent>,
    executor: E,
    reload_tx: Option<mpsc::Sender<ReloadSignal>>,
    debounce: Duration,
}

impl<E: RebuildExecutor> fmt::Debug for WatchRuntime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRuntime")
            .field("core", &self.core)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl<E: RebuildExecutor> WatchRuntime<E> {
    pub fn new(
        core: WatchCore,
        event_rx: mpsc::Receiver<WatchEvent>,
        event_tx: mpsc::Sender<WatchEvent>,
        executor: E,
        debounce: Duration,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            executor,
            reload_tx: None,
            debounce,
        }
    }

    /// Forward reload signals (normally to the dev server).
    pub fn with_reload(mut self, reload_tx: mpsc::Sender<ReloadSignal>) -> Self {
        self.reload_tx = Some(reload_tx);
        self
    }

    pub async fn run(mut self) -> Result<()> {
        info!(debounce_ms = self.debounce.as_millis() as u64, "watching for changes");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "runtime received event");
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("shutdown requested; stopping watch runtime");
                break;
            }
        }

        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::ArmDebounce { task, generation } => {
                let tx = self.event_tx.clone();
                let delay = self.debounce;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // Closed channel: the runtime already stopped.
                    let _ = tx.send(WatchEvent::DebounceElapsed { task, generation }).await;
                });
            }
            CoreCommand::StartRebuild(task) => {
                info!(task = %task, "rebuilding");
                self.executor.start_rebuild(task).await?;
            }
            CoreCommand::Reload(signal) => {
                if let Some(tx) = &self.reload_tx
                    && tx.send(signal).await.is_err()
                {
                    warn!("reload receiver closed");
                }
            }
            CoreCommand::ReportFailure { task, error } => {
                error!(task = %task, %error, "rebuild failed; still watching");
            }
        }
        Ok(())
    }
}

/// Watch runtime wired to the real executor for one graph.
#[derive(Debug)]
pub struct WatchSession {
    runtime: WatchRuntime<RealRebuildExecutor>,
    tx: mpsc::Sender<WatchEvent>,
}

impl WatchSession {
    pub fn new(orchestrator: &Orchestrator, graph: &TaskGraph, reload_tx: Option<mpsc::Sender<ReloadSignal>>) -> Self {
        let (tx, rx) = mpsc::channel::<WatchEvent>(256);
        let watched: Vec<_> = graph.tasks().filter(|t| t.is_watched()).cloned().collect();
        let core = WatchCore::new(watched.iter().map(|t| t.name.clone()));
        let executor = RealRebuildExecutor::new(
            watched,
            orchestrator.fs().clone(),
            orchestrator.config().clone(),
            orchestrator.mode(),
            tx.clone(),
        );

        let mut runtime = WatchRuntime::new(core, rx, tx.clone(), executor, orchestrator.config().debounce);
        if let Some(reload_tx) = reload_tx {
            runtime = runtime.with_reload(reload_tx);
        }
        Self { runtime, tx }
    }

    /// Sender for watcher events and shutdown requests.
    pub fn sender(&self) -> mpsc::Sender<WatchEvent> {
        self.tx.clone()
    }

    pub async fn run(self) -> Result<()> {
        self.runtime.run().await
    }
}
