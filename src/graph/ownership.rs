// src/graph/ownership.rs

//! Destination ownership.
//!
//! Within one phase, no two tasks may write the same output path, and no
//! task may write a file where another writes a directory (`a.css` vs
//! `a.css/x`). Later phases may overwrite earlier ones.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::TaskGraph;
use crate::errors::GraphConfigError;
use crate::fileset::resolve;
use crate::fs::FileSystem;
use crate::types::Mode;

/// Check every phase of `graph` using each transform's planned outputs.
///
/// Tasks whose sources cannot be resolved are skipped here; the build
/// reports that failure against the task.
pub fn check_destinations(
    graph: &TaskGraph,
    fs: &dyn FileSystem,
    root: &Path,
    mode: Mode,
) -> Result<(), GraphConfigError> {
    for phase in graph.phases() {
        let mut owners: BTreeMap<PathBuf, &str> = BTreeMap::new();

        for task in phase {
            let sources = match resolve(fs, root, &task.files) {
                Ok(sources) => sources,
                Err(err) => {
                    debug!(task = %task.name, %err, "skipping ownership check");
                    continue;
                }
            };
            for rel in task.transform.planned_outputs(&sources, mode) {
                let path = task.destination().join(rel);
                match owners.get(&path) {
                    Some(first) if *first != task.name => {
                        return Err(GraphConfigError::OverlappingDestinations {
                            path,
                            first: first.to_string(),
                            second: task.name.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        owners.insert(path, &task.name);
                    }
                }
            }
        }

        for (path, owner) in &owners {
            for ancestor in path.ancestors().skip(1) {
                if let Some(other) = owners.get(ancestor)
                    && other != owner
                {
                    return Err(GraphConfigError::OverlappingDestinations {
                        path: path.clone(),
                        first: other.to_string(),
                        second: owner.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}
