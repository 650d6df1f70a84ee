// src/errors.rs

//! Crate-wide error types.
//!
//! The taxonomy follows the pipeline layers:
//! - [`FileSetError`]: glob resolution.
//! - [`TransformError`]: a transform (or the writer) rejected its input.
//! - [`TaskError`]: one of the above, attributed to a task.
//! - [`GraphConfigError`]: detected while building a task graph, before any
//!   output is written.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum FileSetError {
    #[error("access denied reading {path:?}: {source}")]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("malformed input {path:?}: {reason}")]
    MalformedInput { path: PathBuf, reason: String },

    #[error("codec `{tool}` failed on {path:?}: {reason}")]
    CodecFailure {
        path: PathBuf,
        tool: String,
        reason: String,
    },

    #[error("failed to write {path:?}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransformError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TransformError::MalformedInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Reading a source is attributed as malformed input of that source.
    pub fn read(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        TransformError::MalformedInput {
            path: path.into(),
            reason: format!("cannot read: {err}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task '{task}': {source}")]
    FileSet {
        task: TaskName,
        #[source]
        source: FileSetError,
    },

    #[error("task '{task}': {source}")]
    Transform {
        task: TaskName,
        #[source]
        source: TransformError,
    },

    /// The transform panicked or its worker was cancelled.
    #[error("task '{task}' aborted: {reason}")]
    Panicked { task: TaskName, reason: String },
}

impl TaskError {
    pub fn task(&self) -> &str {
        match self {
            TaskError::FileSet { task, .. }
            | TaskError::Transform { task, .. }
            | TaskError::Panicked { task, .. } => task,
        }
    }
}

#[derive(Error, Debug)]
pub enum GraphConfigError {
    #[error("tasks '{first}' and '{second}' both write {path:?} in the same phase")]
    OverlappingDestinations {
        path: PathBuf,
        first: TaskName,
        second: TaskName,
    },

    #[error("task '{task}' uses unknown transform '{name}'")]
    UnknownTransformName { task: TaskName, name: String },

    #[error("graph '{graph}' references unknown task '{task}'")]
    UnknownTask { graph: String, task: TaskName },

    #[error("invalid options for task '{task}': {reason}")]
    InvalidOptions { task: TaskName, reason: String },

    #[error("unknown graph '{0}'")]
    UnknownGraph(String),
}

#[derive(Error, Debug)]
pub enum SitepipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Graph(#[from] GraphConfigError),

    #[error("build failed: {} task(s) failed", failures.len())]
    BuildFailed { failures: Vec<TaskError> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SitepipeError>;
