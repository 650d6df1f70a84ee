// src/watch/patterns.rs

use std::fmt;

use globset::GlobSet;

use crate::errors::FileSetError;
use crate::fileset::{build_globset, normalize_pattern};
use crate::graph::TaskGraph;
use crate::types::TaskName;

/// Compiled watch globs for a single task.
///
/// Patterns are relative to the project root; the watcher passes relative
/// paths (e.g. `"src/styles/_nav.scss"`) into [`TaskWatchProfile::matches`].
#[derive(Clone)]
pub struct TaskWatchProfile {
    name: TaskName,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for TaskWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWatchProfile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TaskWatchProfile {
    /// Compile `globs`; entries starting with `!` exclude.
    pub fn new(name: impl Into<TaskName>, globs: &[String]) -> Result<Self, FileSetError> {
        let (excludes, includes): (Vec<&String>, Vec<&String>) = globs.iter().partition(|g| g.starts_with('!'));
        let includes: Vec<String> = includes.into_iter().map(|g| normalize_pattern(g)).collect();
        let excludes: Vec<String> = excludes
            .into_iter()
            .map(|g| normalize_pattern(&g[1..]))
            .collect();

        Ok(Self {
            name: name.into(),
            watch_set: build_globset(&includes)?,
            exclude_set: if excludes.is_empty() {
                None
            } else {
                Some(build_globset(&excludes)?)
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exclusion always wins over inclusion.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        match &self.exclude_set {
            Some(exclude) => !exclude.is_match(rel_path),
            None => true,
        }
    }
}

/// One profile per watched task of `graph`.
pub fn build_watch_profiles(graph: &TaskGraph) -> Result<Vec<TaskWatchProfile>, FileSetError> {
    graph
        .tasks()
        .filter(|t| t.is_watched())
        .map(|t| TaskWatchProfile::new(t.name.clone(), &t.watch))
        .collect()
}
