// src/fileset/mod.rs

//! Declarative source selection.
//!
//! A [`FileSet`] is an ordered list of include globs plus exclude globs and
//! a destination. [`resolve`] expands it into concrete [`SourceFile`]s:
//!
//! - `{a,b}` alternation and `**` are handled by `globset`.
//! - Include entries starting with `!` are negations (treated as excludes).
//! - Excludes are applied after expansion and always win.
//! - An empty include list resolves to nothing.
//!
//! Each resolved file remembers its path relative to the literal prefix of
//! the pattern that matched it (its "base"), so `src/img/**/*.png` maps
//! `src/img/icons/a.png` to `icons/a.png` under the destination.

pub mod patterns;

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::FileSetError;
use crate::fs::FileSystem;

pub use patterns::{build_globset, compile_glob, glob_base, has_glob_meta, normalize_pattern};

/// Include/exclude specification plus destination root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub destination: PathBuf,
}

impl FileSet {
    pub fn new(
        include: impl IntoIterator<Item = impl Into<String>>,
        exclude: impl IntoIterator<Item = impl Into<String>>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
            destination: destination.into(),
        }
    }

    /// Positive include patterns (negations removed).
    fn positive_patterns(&self) -> impl Iterator<Item = String> + '_ {
        self.include
            .iter()
            .filter(|p| !p.starts_with('!'))
            .map(|p| normalize_pattern(p))
    }

    /// All exclude patterns: `exclude` plus `!`-prefixed includes.
    fn exclude_patterns(&self) -> Vec<String> {
        self.include
            .iter()
            .filter_map(|p| p.strip_prefix('!'))
            .chain(self.exclude.iter().map(String::as_str))
            .map(normalize_pattern)
            .collect()
    }
}

/// One resolved source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// Path on disk (project root joined with the matched relative path).
    pub path: PathBuf,
    /// Path relative to the base of the pattern that matched it.
    pub relative: PathBuf,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, relative: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            relative: relative.into(),
        }
    }
}

/// Resolve a [`FileSet`] against `root`.
///
/// Pure apart from reading directory listings. A missing base directory
/// contributes no files; an unreadable one fails with
/// [`FileSetError::AccessDenied`].
pub fn resolve(
    fs: &dyn FileSystem,
    root: &Path,
    set: &FileSet,
) -> Result<Vec<SourceFile>, FileSetError> {
    let excludes = build_globset(&set.exclude_patterns())?;
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut out = Vec::new();

    for pattern in set.positive_patterns() {
        let base = glob_base(&pattern);
        let base_dir = root.join(&base);

        if !has_glob_meta(&pattern) {
            let path = root.join(&pattern);
            if fs.is_file(&path) && !excludes.is_match(&pattern) && seen.insert(path.clone()) {
                let relative = path.strip_prefix(&base_dir).unwrap_or(&path).to_path_buf();
                out.push(SourceFile { path, relative });
            }
            continue;
        }

        let matcher = compile_glob(&pattern)?;
        for path in walk_files(fs, &base_dir)? {
            let Some(rel) = relative_to(root, &path) else {
                continue;
            };
            if matcher.is_match(&rel) && !excludes.is_match(&rel) && seen.insert(path.clone()) {
                let relative = path.strip_prefix(&base_dir).unwrap_or(&path).to_path_buf();
                out.push(SourceFile { path, relative });
            }
        }
    }

    debug!(
        include = ?set.include,
        exclude = ?set.exclude,
        resolved = out.len(),
        "resolved file set"
    );
    Ok(out)
}

/// Depth-first walk returning files; entries are visited in sorted order
/// within each directory.
fn walk_files(fs: &dyn FileSystem, start: &Path) -> Result<Vec<PathBuf>, FileSetError> {
    let mut files = Vec::new();
    if !fs.is_dir(start) {
        return Ok(files);
    }

    let mut stack = vec![start.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = match fs.read_dir(&dir) {
            Ok(entries) => entries,
            // Vanished between listing and reading: nothing to match.
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(source) => return Err(FileSetError::AccessDenied { path: dir, source }),
        };
        entries.sort();

        let mut subdirs = Vec::new();
        for path in entries {
            if fs.is_dir(&path) {
                subdirs.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
        // Reverse so the stack pops subdirectories in sorted order.
        stack.extend(subdirs.into_iter().rev());
    }

    Ok(files)
}

fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
