// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Figure out the project root that relative paths resolve against.
///
/// - If the config path has a non-empty parent (e.g. "site/Sitepipe.toml"),
///   we use that directory.
/// - If it's just a bare filename (parent = ""), we fall back to the
///   current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Immutable settings shared by every stage of one run.
///
/// Built once at startup and passed by reference; nothing in the pipeline
/// holds process-wide mutable configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root; task globs resolve against it.
    pub root: PathBuf,
    /// Absolute destination root.
    pub destination: PathBuf,
    pub debounce: Duration,
    pub server_host: String,
    pub server_port: u16,
}

impl BuildConfig {
    pub fn from_config(cfg: &ConfigFile, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let destination = root.join(cfg.config.destination.trim_start_matches("./"));
        Self {
            root,
            destination,
            debounce: Duration::from_millis(cfg.config.debounce_ms),
            server_host: cfg.server.host.clone(),
            server_port: cfg.server.port,
        }
    }

    /// Resolve a project-relative path (e.g. a task's `dest`).
    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel.trim_start_matches("./"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_filename_uses_cwd_as_root() {
        let root = config_root_dir(Path::new("Sitepipe.toml"));
        assert_eq!(root, std::env::current_dir().unwrap());
        assert_eq!(
            config_root_dir(Path::new("site/Sitepipe.toml")),
            PathBuf::from("site")
        );
    }
}
