// src/engine/core.rs

//! Pure watch-mode state machine.
//!
//! Each watched task moves independently through
//! `Idle -> Debouncing -> Rebuilding -> Idle | Failed`:
//!
//! - A change while `Idle`/`Failed`/`Debouncing` (re)arms the debounce
//!   timer under a fresh generation; only the newest timer counts.
//! - A change while `Rebuilding` marks the task pending; when the rebuild
//!   finishes it goes straight back to `Debouncing`.
//! - `Failed` is not sticky: the next change starts over.
//!
//! There is no Tokio, channel or filesystem in here; the async shell in
//! [`super::runtime`] turns [`CoreCommand`]s into timers, rebuilds and
//! reload signals.

use std::collections::BTreeMap;

use tracing::debug;

use super::{CoreCommand, CoreStep, RebuildOutcome, WatchEvent};
use crate::server::ReloadSignal;
use crate::types::TaskName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskWatchState {
    Idle,
    Debouncing { generation: u64 },
    Rebuilding { pending: bool },
    Failed { error: String },
}

#[derive(Debug)]
struct Slot {
    state: TaskWatchState,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct WatchCore {
    tasks: BTreeMap<TaskName, Slot>,
}

impl WatchCore {
    pub fn new(tasks: impl IntoIterator<Item = impl Into<TaskName>>) -> Self {
        Self {
            tasks: tasks
                .into_iter()
                .map(|name| {
                    (
                        name.into(),
                        Slot {
                            state: TaskWatchState::Idle,
                            generation: 0,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn state_of(&self, task: &str) -> Option<&TaskWatchState> {
        self.tasks.get(task).map(|slot| &slot.state)
    }

    /// True when no task is debouncing or rebuilding.
    pub fn is_idle(&self) -> bool {
        self.tasks.values().all(|slot| {
            matches!(slot.state, TaskWatchState::Idle | TaskWatchState::Failed { .. })
        })
    }

    pub fn step(&mut self, event: WatchEvent) -> CoreStep {
        match event {
            WatchEvent::Changed { task, path } => {
                debug!(task = %task, path = %path.display(), "change observed");
                CoreStep::running(self.on_change(task))
            }
            WatchEvent::DebounceElapsed { task, generation } => {
                CoreStep::running(self.on_debounce_elapsed(task, generation))
            }
            WatchEvent::RebuildFinished { task, outcome } => {
                CoreStep::running(self.on_rebuild_finished(task, outcome))
            }
            WatchEvent::Shutdown => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }

    fn on_change(&mut self, task: TaskName) -> Vec<CoreCommand> {
        let Some(slot) = self.tasks.get_mut(&task) else {
            debug!(task = %task, "change for unwatched task ignored");
            return Vec::new();
        };
        match slot.state {
            TaskWatchState::Rebuilding { .. } => {
                slot.state = TaskWatchState::Rebuilding { pending: true };
                Vec::new()
            }
            _ => vec![arm(slot, task)],
        }
    }

    fn on_debounce_elapsed(&mut self, task: TaskName, generation: u64) -> Vec<CoreCommand> {
        let Some(slot) = self.tasks.get_mut(&task) else {
            return Vec::new();
        };
        match slot.state {
            TaskWatchState::Debouncing { generation: current } if current == generation => {
                slot.state = TaskWatchState::Rebuilding { pending: false };
                vec![CoreCommand::StartRebuild(task)]
            }
            _ => {
                debug!(task = %task, generation, "stale debounce timer");
                Vec::new()
            }
        }
    }

    fn on_rebuild_finished(&mut self, task: TaskName, outcome: RebuildOutcome) -> Vec<CoreCommand> {
        let Some(slot) = self.tasks.get_mut(&task) else {
            return Vec::new();
        };
        let TaskWatchState::Rebuilding { pending } = slot.state else {
            debug!(task = %task, "rebuild result for task that is not rebuilding");
            return Vec::new();
        };

        let mut commands = Vec::new();
        let settled = match outcome {
            RebuildOutcome::Built { outputs } => {
                if let Some(signal) = ReloadSignal::for_outputs(&outputs) {
                    commands.push(CoreCommand::Reload(signal));
                }
                TaskWatchState::Idle
            }
            RebuildOutcome::Unchanged => TaskWatchState::Idle,
            RebuildOutcome::Failed(error) => {
                commands.push(CoreCommand::ReportFailure {
                    task: task.clone(),
                    error: error.clone(),
                });
                TaskWatchState::Failed { error }
            }
        };

        if pending {
            commands.push(arm(slot, task));
        } else {
            slot.state = settled;
        }
        commands
    }
}

fn arm(slot: &mut Slot, task: TaskName) -> CoreCommand {
    slot.generation += 1;
    slot.state = TaskWatchState::Debouncing {
        generation: slot.generation,
    };
    CoreCommand::ArmDebounce {
        task,
        generation: slot.generation,
    }
}
