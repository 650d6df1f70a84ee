// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// destination = "dist"
/// debounce_ms = 100
///
/// [server]
/// port = 4000
///
/// [task.styles]
/// transform = "style"
/// src = ["src/styles/main.scss"]
/// dest = "dist/css"
/// watch = ["src/styles/**/*.scss"]
///
/// [graph.release]
/// phases = [["clean"], ["styles"]]
/// ```
///
/// All sections except `[task.*]` are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub server: ServerSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Explicit graphs from `[graph.<name>]`. Missing `develop` / `release`
    /// graphs are derived from the tasks.
    #[serde(default)]
    pub graph: BTreeMap<String, GraphConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub server: ServerSection,
    pub task: BTreeMap<String, TaskConfig>,
    pub graph: BTreeMap<String, GraphConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            server: raw.server,
            task: raw.task,
            graph: raw.graph,
        }
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    /// Graph declared under `[graph.<name>]`, or the derived standard graph
    /// for `develop` / `release`.
    ///
    /// Derived graphs put every `clean` task in the first phase and all other
    /// tasks in the second; `develop` additionally serves and watches.
    pub fn graph_config(&self, name: &str) -> Option<GraphConfig> {
        if let Some(g) = self.graph.get(name) {
            return Some(g.clone());
        }
        let serve = match name {
            "develop" => true,
            "release" => false,
            _ => return None,
        };

        let (clean, rest): (Vec<_>, Vec<_>) = self
            .task
            .iter()
            .map(|(name, t)| (name.clone(), t.transform == "clean"))
            .partition(|(_, is_clean)| *is_clean);

        let phases = [clean, rest]
            .into_iter()
            .map(|phase| phase.into_iter().map(|(name, _)| name).collect::<Vec<_>>())
            .filter(|phase| !phase.is_empty())
            .collect();

        Some(GraphConfig { phases, serve })
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Destination root, fully owned by the pipeline.
    #[serde(default = "default_destination")]
    pub destination: String,

    /// Watch-mode debounce window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_destination() -> String {
    "dist".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[server]` section for the development server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Registered transform name (`style`, `image`, `copy`, ...).
    pub transform: String,

    /// Include globs; entries starting with `!` are excludes.
    #[serde(default)]
    pub src: Vec<String>,

    /// Additional exclude globs.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Destination directory for this task. Defaults to the destination root.
    #[serde(default)]
    pub dest: Option<String>,

    /// Globs that re-trigger this task in watch mode. `None` = not watched.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Skip watch-mode rebuilds when the task's sources hash is unchanged.
    #[serde(default)]
    pub use_hash: bool,

    /// Transform-specific options, deserialized by the transform factory.
    #[serde(default)]
    pub options: toml::Table,
}

/// `[graph.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GraphConfig {
    /// Phases in execution order; tasks within a phase run concurrently.
    pub phases: Vec<Vec<String>>,

    /// Start the dev server and watchers after the last phase.
    #[serde(default)]
    pub serve: bool,
}
