// src/graph/mod.rs

//! Task graphs: named, ordered phases of tasks.
//!
//! A [`TaskGraph`] is built from a validated [`ConfigFile`] once per run.
//! Every transform is instantiated (and its options checked) here, so a
//! typo in a transform name or option never reaches the build.

mod ownership;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::{BuildConfig, ConfigFile};
use crate::errors::GraphConfigError;
use crate::fileset::FileSet;
use crate::fs::FileSystem;
use crate::transform::{Transform, TransformRegistry};
use crate::types::{Mode, TaskName};

pub use ownership::check_destinations;

/// A named unit of work: one transform applied to one file set.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: TaskName,
    pub transform: Arc<dyn Transform>,
    pub files: FileSet,
    /// Watch globs relative to the project root; `!` entries exclude.
    /// Empty means the task is not watched.
    pub watch: Vec<String>,
    pub use_hash: bool,
}

impl Task {
    pub fn new(name: impl Into<TaskName>, transform: Arc<dyn Transform>, files: FileSet) -> Self {
        Self {
            name: name.into(),
            transform,
            files,
            watch: Vec::new(),
            use_hash: false,
        }
    }

    pub fn with_watch(mut self, globs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.watch = globs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_use_hash(mut self, use_hash: bool) -> Self {
        self.use_hash = use_hash;
        self
    }

    pub fn destination(&self) -> &Path {
        &self.files.destination
    }

    pub fn is_watched(&self) -> bool {
        self.watch.iter().any(|g| !g.starts_with('!'))
    }
}

/// Phases run strictly one after another; tasks inside a phase run
/// concurrently.
pub type Phase = Vec<Arc<Task>>;

#[derive(Debug, Clone)]
pub struct TaskGraph {
    name: String,
    phases: Vec<Phase>,
    serve: bool,
}

impl TaskGraph {
    pub fn new(name: impl Into<String>, phases: Vec<Vec<Task>>, serve: bool) -> Self {
        Self {
            name: name.into(),
            phases: phases
                .into_iter()
                .map(|phase| phase.into_iter().map(Arc::new).collect())
                .collect(),
            serve,
        }
    }

    /// Instantiate graph `graph_name` from the config.
    pub fn from_config(
        cfg: &ConfigFile,
        graph_name: &str,
        registry: &TransformRegistry,
        build: &BuildConfig,
    ) -> Result<Self, GraphConfigError> {
        let graph_cfg = cfg
            .graph_config(graph_name)
            .ok_or_else(|| GraphConfigError::UnknownGraph(graph_name.to_string()))?;

        let mut phases = Vec::with_capacity(graph_cfg.phases.len());
        for phase_cfg in &graph_cfg.phases {
            let mut phase = Vec::with_capacity(phase_cfg.len());
            for task_name in phase_cfg {
                let task_cfg = cfg.task.get(task_name).ok_or_else(|| GraphConfigError::UnknownTask {
                    graph: graph_name.to_string(),
                    task: task_name.clone(),
                })?;

                let transform = registry
                    .create(&task_cfg.transform, &task_cfg.options)
                    .ok_or_else(|| GraphConfigError::UnknownTransformName {
                        task: task_name.clone(),
                        name: task_cfg.transform.clone(),
                    })?
                    .map_err(|reason| GraphConfigError::InvalidOptions {
                        task: task_name.clone(),
                        reason,
                    })?;

                let destination = match &task_cfg.dest {
                    Some(dest) => build.resolve(dest),
                    None => build.destination.clone(),
                };
                let files = FileSet::new(task_cfg.src.clone(), task_cfg.exclude.clone(), destination);

                phase.push(
                    Task::new(task_name.clone(), transform, files)
                        .with_watch(task_cfg.watch.clone().unwrap_or_default())
                        .with_use_hash(task_cfg.use_hash),
                );
            }
            phases.push(phase);
        }

        let graph = Self::new(graph_name, phases, graph_cfg.serve);
        debug!(graph = %graph.name, phases = graph.phases.len(), "built task graph");
        Ok(graph)
    }

    /// Fail fast when two tasks of one phase would write the same path.
    pub fn validate(&self, fs: &dyn FileSystem, root: &Path, mode: Mode) -> Result<(), GraphConfigError> {
        check_destinations(self, fs, root, mode)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn serve(&self) -> bool {
        self.serve
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.phases.iter().flatten()
    }

    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.tasks().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::config::{ConfigSection, RawConfigFile, ServerSection, TaskConfig};

    fn task_cfg(transform: &str, dest: Option<&str>) -> TaskConfig {
        TaskConfig {
            transform: transform.to_string(),
            src: vec!["src/**/*".to_string()],
            exclude: Vec::new(),
            dest: dest.map(str::to_string),
            watch: None,
            use_hash: false,
            options: toml::Table::new(),
        }
    }

    fn config(tasks: Vec<(&str, TaskConfig)>) -> ConfigFile {
        let raw = RawConfigFile {
            config: ConfigSection::default(),
            server: ServerSection::default(),
            task: tasks.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
            graph: BTreeMap::new(),
        };
        ConfigFile::try_from(raw).unwrap()
    }

    fn build_cfg() -> BuildConfig {
        BuildConfig {
            root: PathBuf::from("/site"),
            destination: PathBuf::from("/site/dist"),
            debounce: Duration::from_millis(50),
            server_host: "127.0.0.1".into(),
            server_port: 0,
        }
    }

    #[test]
    fn derived_release_graph_cleans_first() {
        let cfg = config(vec![
            ("clean", task_cfg("clean", None)),
            ("img", task_cfg("copy", Some("dist/img"))),
            ("fonts", task_cfg("copy", Some("dist/fonts"))),
        ]);
        let graph = TaskGraph::from_config(&cfg, "release", &TransformRegistry::with_builtins(), &build_cfg()).unwrap();

        let names: Vec<Vec<&str>> = graph
            .phases()
            .iter()
            .map(|p| p.iter().map(|t| t.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["clean"], vec!["fonts", "img"]]);
        assert!(!graph.serve());
        assert_eq!(graph.task("img").unwrap().destination(), Path::new("/site/dist/img"));
        assert_eq!(graph.task("clean").unwrap().destination(), Path::new("/site/dist"));
    }

    #[test]
    fn unknown_transform_is_rejected() {
        let cfg = config(vec![("x", task_cfg("sass", None))]);
        let err = TaskGraph::from_config(&cfg, "develop", &TransformRegistry::with_builtins(), &build_cfg()).unwrap_err();
        assert!(matches!(err, GraphConfigError::UnknownTransformName { task, name } if task == "x" && name == "sass"));
    }

    #[test]
    fn invalid_options_name_the_task() {
        let mut t = task_cfg("copy", None);
        t.options.insert("flaten".into(), toml::Value::Boolean(true));
        let cfg = config(vec![("fonts", t)]);
        let err = TaskGraph::from_config(&cfg, "develop", &TransformRegistry::with_builtins(), &build_cfg()).unwrap_err();
        assert!(matches!(err, GraphConfigError::InvalidOptions { task, .. } if task == "fonts"));
    }

    #[test]
    fn unknown_graph_is_rejected() {
        let cfg = config(vec![("fonts", task_cfg("copy", None))]);
        let err = TaskGraph::from_config(&cfg, "staging", &TransformRegistry::with_builtins(), &build_cfg()).unwrap_err();
        assert!(matches!(err, GraphConfigError::UnknownGraph(name) if name == "staging"));
    }
}
