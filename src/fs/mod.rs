// src/fs/mod.rs

//! Filesystem abstraction.
//!
//! Resolution, transforms and the output writer all go through
//! [`FileSystem`] so tests can swap in [`mock::MockFileSystem`], which also
//! records the order of every mutation.

use std::fmt::Debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub mod mock;

/// Abstract filesystem interface.
///
/// Errors are plain `io::Error`s so callers can classify them
/// (e.g. `PermissionDenied` becomes `FileSetError::AccessDenied`).
pub trait FileSystem: Send + Sync + Debug {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Write `contents` so that readers see either the old file or the whole
    /// new file, never a partial one. Parent directories are created.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Remove a file or a directory tree.
    fn remove(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        // Temp file in the target directory so the final rename never
        // crosses filesystems.
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(contents)?;
        tmp.flush()?;
        set_output_permissions(tmp.as_file(), path)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}

/// Temp files start out owner-only. Outputs keep the mode of the file they
/// replace, or get `0644` when new.
#[cfg(unix)]
fn set_output_permissions(file: &fs::File, target: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let perms = match fs::metadata(target) {
        Ok(meta) => meta.permissions(),
        Err(_) => fs::Permissions::from_mode(0o644),
    };
    file.set_permissions(perms)
}

#[cfg(not(unix))]
fn set_output_permissions(_file: &fs::File, _target: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_parents_and_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("css/deep/main.css");
        let fs = RealFileSystem;

        fs.write_atomic(&target, b"a{}").unwrap();
        fs.write_atomic(&target, b"b{}").unwrap();

        assert_eq!(fs.read(&target).unwrap(), b"b{}");
        // No temp files left next to the target.
        let siblings = fs.read_dir(target.parent().unwrap()).unwrap();
        assert_eq!(siblings, vec![target]);
    }

    #[test]
    fn remove_handles_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        fs.write_atomic(&dir.path().join("a/b.txt"), b"x").unwrap();
        fs.write_atomic(&dir.path().join("c.txt"), b"y").unwrap();

        fs.remove(&dir.path().join("a")).unwrap();
        fs.remove(&dir.path().join("c.txt")).unwrap();

        assert!(fs.read_dir(dir.path()).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn outputs_are_readable_by_other_users() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        let page = dir.path().join("dist/index.html");
        fs.write_atomic(&page, b"<p>hi</p>").unwrap();
        let mode = std::fs::metadata(&page).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);

        let script = dir.path().join("dist/run.sh");
        fs.write_atomic(&script, b"#!/bin/sh").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        fs.write_atomic(&script, b"#!/bin/sh\necho").unwrap();
        let mode = std::fs::metadata(&script).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }
}
