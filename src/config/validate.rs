// src/config/validate.rs

use std::collections::HashSet;
use std::path::{Component, Path};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{GraphConfigError, Result, SitepipeError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SitepipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_paths(cfg)?;
    validate_graphs(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(SitepipeError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.debounce_ms == 0 {
        return Err(SitepipeError::ConfigError(
            "[config].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.destination.trim().is_empty() {
        return Err(SitepipeError::ConfigError(
            "[config].destination must not be empty".to_string(),
        ));
    }
    if escapes_root(Path::new(&cfg.config.destination)) {
        return Err(SitepipeError::ConfigError(format!(
            "[config].destination '{}' must stay inside the project",
            cfg.config.destination
        )));
    }
    Ok(())
}

fn validate_task_paths(cfg: &RawConfigFile) -> Result<()> {
    let destination = Path::new(strip_dot(&cfg.config.destination));

    for (name, task) in cfg.task.iter() {
        if task.transform.trim().is_empty() {
            return Err(SitepipeError::ConfigError(format!(
                "task '{name}' must name a transform"
            )));
        }
        if let Some(dest) = &task.dest {
            let dest_path = Path::new(strip_dot(dest));
            if escapes_root(dest_path) || !dest_path.starts_with(destination) {
                return Err(SitepipeError::ConfigError(format!(
                    "task '{name}' dest '{dest}' must be inside destination '{}'",
                    cfg.config.destination
                )));
            }
        }
    }
    Ok(())
}

fn validate_graphs(cfg: &RawConfigFile) -> Result<()> {
    for (graph, g) in cfg.graph.iter() {
        let mut seen = HashSet::new();
        for task in g.phases.iter().flatten() {
            if !cfg.task.contains_key(task) {
                return Err(GraphConfigError::UnknownTask {
                    graph: graph.clone(),
                    task: task.clone(),
                }
                .into());
            }
            if !seen.insert(task.as_str()) {
                return Err(SitepipeError::ConfigError(format!(
                    "graph '{graph}' lists task '{task}' more than once"
                )));
            }
        }
    }
    Ok(())
}

fn strip_dot(p: &str) -> &str {
    p.trim_start_matches("./")
}

fn escapes_root(path: &Path) -> bool {
    path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}
