//! Programmatic config construction, so tests don't hand-write TOML.

use std::collections::BTreeMap;

use sitepipe::config::{ConfigFile, ConfigSection, GraphConfig, RawConfigFile, ServerSection, TaskConfig};
use sitepipe::errors::SitepipeError;

/// Builds a validated [`ConfigFile`]; sections default as in a TOML file
/// that omits them.
#[derive(Debug, Default)]
pub struct ConfigFileBuilder {
    config: ConfigSection,
    server: ServerSection,
    tasks: BTreeMap<String, TaskConfig>,
    graphs: BTreeMap<String, GraphConfig>,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, name: &str, task: impl Into<TaskConfig>) -> Self {
        self.tasks.insert(name.to_string(), task.into());
        self
    }

    /// Declare `[graph.<name>]`; without one, `develop`/`release` are derived.
    pub fn with_graph(mut self, name: &str, phases: &[&[&str]], serve: bool) -> Self {
        let phases = phases
            .iter()
            .map(|phase| phase.iter().map(ToString::to_string).collect())
            .collect();
        self.graphs.insert(name.to_string(), GraphConfig { phases, serve });
        self
    }

    pub fn destination(mut self, dest: &str) -> Self {
        self.config.destination = dest.to_string();
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    pub fn server(mut self, host: &str, port: u16) -> Self {
        self.server = ServerSection {
            host: host.to_string(),
            port,
        };
        self
    }

    pub fn raw(self) -> RawConfigFile {
        RawConfigFile {
            config: self.config,
            server: self.server,
            task: self.tasks,
            graph: self.graphs,
        }
    }

    /// Run validation and return its error, for negative tests.
    pub fn try_build(self) -> Result<ConfigFile, SitepipeError> {
        ConfigFile::try_from(self.raw())
    }

    /// Panics if validation fails.
    pub fn build(self) -> ConfigFile {
        match self.try_build() {
            Ok(cfg) => cfg,
            Err(e) => panic!("builder produced an invalid config: {e}"),
        }
    }
}

/// One `[task.<name>]` section.
#[derive(Debug)]
pub struct TaskConfigBuilder(TaskConfig);

impl TaskConfigBuilder {
    pub fn new(transform: &str) -> Self {
        Self(TaskConfig {
            transform: transform.to_string(),
            src: Vec::new(),
            exclude: Vec::new(),
            dest: None,
            watch: None,
            use_hash: false,
            options: toml::Table::new(),
        })
    }

    /// Add an include glob (`!`-prefixed entries exclude).
    pub fn src(mut self, pattern: &str) -> Self {
        self.0.src.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.0.exclude.push(pattern.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.0.dest = Some(dest.to_string());
        self
    }

    /// Marks the task as watched.
    pub fn watch(mut self, pattern: &str) -> Self {
        self.0.watch.get_or_insert_with(Vec::new).push(pattern.to_string());
        self
    }

    pub fn use_hash(mut self, on: bool) -> Self {
        self.0.use_hash = on;
        self
    }

    /// Set one key of the transform's `options` table.
    pub fn option(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.0.options.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.0
    }
}

impl From<TaskConfigBuilder> for TaskConfig {
    fn from(builder: TaskConfigBuilder) -> Self {
        builder.0
    }
}
