// src/transform/mod.rs

//! Pluggable transforms.
//!
//! A [`Transform`] turns resolved sources into [`Artifact`]s under its
//! task's destination. Transforms never write anything themselves; the
//! orchestrator consumes the artifact stream and performs the (atomic)
//! writes, so every I/O failure is attributed to the owning task.
//!
//! Built-ins are registered by name in [`registry::TransformRegistry`]:
//!
//! | name | module |
//! |------|--------|
//! | `clean` | [`clean`] |
//! | `copy` | [`copy`] |
//! | `template` | [`template`] |
//! | `style` | [`style`] |
//! | `image` | [`image`] |
//! | `alt-format` | [`altformat`] |
//! | `icons` | [`icons`] |
//! | `script` | [`script`] |
//! | `command` | [`command`] |

pub mod altformat;
pub mod clean;
pub mod command;
pub mod copy;
pub mod icons;
pub mod image;
pub mod registry;
pub mod script;
pub mod style;
pub mod template;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::errors::TransformError;
use crate::fileset::SourceFile;
use crate::fs::FileSystem;
use crate::types::Mode;

pub use registry::{TransformFactory, TransformRegistry};

/// A file to be written, relative to the task destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn new(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

/// One unit of transform output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    File(OutputFile),
    /// Remove a file or directory (relative to the task destination).
    Delete(PathBuf),
}

/// Everything a transform may look at.
pub struct TransformInput<'a> {
    pub sources: Vec<SourceFile>,
    /// Absolute destination directory of the task.
    pub destination: &'a Path,
    pub fs: Arc<dyn FileSystem>,
    pub mode: Mode,
}

/// Lazy artifact stream; consumed (and written) one item at a time.
pub type Artifacts<'a> = Box<dyn Iterator<Item = Result<Artifact, TransformError>> + 'a>;

/// A named, pure function of `(sources, mode)`.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Registry name (`style`, `copy`, ...).
    fn name(&self) -> &str;

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a>;

    /// Destination-relative paths `apply` would write for these sources.
    ///
    /// Used to reject overlapping destinations before anything runs. Must
    /// not read file contents.
    fn planned_outputs(&self, sources: &[SourceFile], mode: Mode) -> Vec<PathBuf> {
        let _ = (sources, mode);
        Vec::new()
    }
}

/// Run `f` per source lazily, flattening each source's artifacts.
pub(crate) fn per_source<'a, F>(sources: Vec<SourceFile>, mut f: F) -> Artifacts<'a>
where
    F: FnMut(&SourceFile) -> Result<Vec<Artifact>, TransformError> + 'a,
{
    Box::new(sources.into_iter().flat_map(move |src| match f(&src) {
        Ok(artifacts) => artifacts.into_iter().map(Ok).collect::<Vec<_>>(),
        Err(e) => vec![Err(e)],
    }))
}

/// Read a source, attributing failures to it.
pub(crate) fn read_source(fs: &dyn FileSystem, src: &SourceFile) -> Result<Vec<u8>, TransformError> {
    fs.read(&src.path).map_err(|e| TransformError::read(&src.path, e))
}

pub(crate) fn read_source_text(
    fs: &dyn FileSystem,
    src: &SourceFile,
) -> Result<String, TransformError> {
    fs.read_to_string(&src.path)
        .map_err(|e| TransformError::read(&src.path, e))
}

/// `css/main.scss` + `css` → `css/main.css`.
pub fn with_extension(path: &Path, ext: &str) -> PathBuf {
    path.with_extension(ext)
}

/// `css/main.css` + `.min` → `css/main.min.css`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

/// Lower-cased extension of a path, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Deserialize a task's `options` table into a typed settings struct.
pub fn parse_options<T: DeserializeOwned>(options: &toml::Table) -> Result<T, String> {
    toml::Value::Table(options.clone())
        .try_into::<T>()
        .map_err(|e| e.to_string())
}
