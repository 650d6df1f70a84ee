// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::WatchEvent;
use crate::watch::path_utils::{is_inside_any, relative_str};
use crate::watch::patterns::TaskWatchProfile;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping the handle (or
/// calling [`WatcherHandle::cancel`]) stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    forwarder: JoinHandle<()>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

impl WatcherHandle {
    pub fn cancel(self) {
        self.forwarder.abort();
    }
}

/// Watch `root` recursively and send [`WatchEvent::Changed`] to every task
/// whose profile matches a changed path.
///
/// Paths under any of `ignore` (normally the destination root) never
/// trigger anything, so a task's own output cannot re-trigger it.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    ignore: Vec<PathBuf>,
    profiles: Vec<TaskWatchProfile>,
    runtime_tx: mpsc::Sender<WatchEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());
    let ignore: Vec<PathBuf> = ignore
        .into_iter()
        .map(|p| p.canonicalize().unwrap_or(p))
        .collect();
    let profiles = Arc::new(profiles);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("sitepipe: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("sitepipe: file watch error: {err}"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), tasks = profiles.len(), "file watcher started");

    let forwarder = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            for path in event.paths {
                if is_inside_any(&path, &ignore) {
                    continue;
                }
                let Some(rel) = relative_str(&root, &path) else {
                    warn!(path = %path.display(), "could not relativize path against root");
                    continue;
                };

                for profile in profiles.iter().filter(|p| p.matches(&rel)) {
                    debug!(task = %profile.name(), path = %rel, "watch match");
                    let event = WatchEvent::Changed {
                        task: profile.name().to_string(),
                        path: PathBuf::from(&rel),
                    };
                    if runtime_tx.send(event).await.is_err() {
                        debug!("runtime closed; watcher forwarding stops");
                        return;
                    }
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        forwarder,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn changes_reach_matching_tasks_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("src/styles")).unwrap();
        std::fs::create_dir_all(root.join("dist")).unwrap();

        let profiles = vec![
            TaskWatchProfile::new("styles", &["src/styles/**/*.scss".to_string()]).unwrap(),
            TaskWatchProfile::new("everything", &["**/*".to_string()]).unwrap(),
        ];
        let (tx, mut rx) = mpsc::channel(64);
        let handle = spawn_watcher(&root, vec![root.join("dist")], profiles, tx).unwrap();

        // Give the backend a moment to register.
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(root.join("dist/ignored.css"), "x").unwrap();
        std::fs::write(root.join("src/styles/main.scss"), "a { }").unwrap();

        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !seen.contains(&"styles".to_string()) {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(WatchEvent::Changed { task, path })) => {
                    assert!(!path.starts_with("dist"), "destination change leaked: {path:?}");
                    seen.push(task);
                }
                Ok(other) => panic!("unexpected {other:?}"),
                Err(_) => panic!("no change event within 5s, got {seen:?}"),
            }
        }
        handle.cancel();
    }
}
