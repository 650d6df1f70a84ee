use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use sitepipe::engine::{RebuildOutcome, WatchEvent};
use sitepipe::errors::Result;
use sitepipe::exec::RebuildExecutor;

/// A fake executor that:
/// - records which tasks were rebuilt
/// - immediately reports `RebuildFinished`, using scripted outcomes in
///   order and `Built` with no outputs once the script runs out.
pub struct FakeRebuildExecutor {
    runtime_tx: mpsc::Sender<WatchEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    outcomes: VecDeque<RebuildOutcome>,
}

impl FakeRebuildExecutor {
    pub fn new(runtime_tx: mpsc::Sender<WatchEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            outcomes: VecDeque::new(),
        }
    }

    pub fn with_outcomes(mut self, outcomes: impl IntoIterator<Item = RebuildOutcome>) -> Self {
        self.outcomes.extend(outcomes);
        self
    }
}

impl RebuildExecutor for FakeRebuildExecutor {
    fn start_rebuild(&mut self, task: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let outcome = self
            .outcomes
            .pop_front()
            .unwrap_or(RebuildOutcome::Built { outputs: Vec::new() });

        Box::pin(async move {
            executed.lock().unwrap().push(task.clone());
            tx.send(WatchEvent::RebuildFinished { task, outcome })
                .await
                .map_err(anyhow::Error::from)?;
            Ok(())
        })
    }
}
