// src/fs/mock.rs

use super::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

/// A mutation applied to the mock filesystem, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsOp {
    Write(PathBuf),
    Remove(PathBuf),
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    ops: Vec<FsOp>,
    denied: HashSet<PathBuf>,
    read_only: HashSet<PathBuf>,
}

/// In-memory filesystem for tests.
///
/// Clones share state. Paths are used verbatim as keys; tests normally use
/// absolute paths such as `/site/src/a.png`.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without recording it in the op log.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        insert_file(&mut state, path.as_ref(), content.into());
    }

    /// Make `read_dir` on this directory fail with `PermissionDenied`.
    pub fn deny_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        let path = path.as_ref().to_path_buf();
        ensure_dir(&mut state, &path);
        state.denied.insert(path);
    }

    /// Make writes anywhere below `path` fail with `PermissionDenied`.
    pub fn make_read_only(&self, path: impl AsRef<Path>) {
        self.lock().read_only.insert(path.as_ref().to_path_buf());
    }

    /// Snapshot of every write/remove, in order.
    pub fn ops(&self) -> Vec<FsOp> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    /// Contents of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// All file paths below `root`, sorted.
    pub fn files_under(&self, root: impl AsRef<Path>) -> Vec<PathBuf> {
        let root = root.as_ref();
        let state = self.lock();
        let mut files: Vec<PathBuf> = state
            .entries
            .iter()
            .filter(|(p, e)| matches!(e, MockEntry::File(_)) && p.starts_with(root))
            .map(|(p, _)| p.clone())
            .collect();
        files.sort();
        files
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread poisons the lock; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn insert_file(state: &mut MockState, path: &Path, content: Vec<u8>) {
    if let Some(parent) = path.parent() {
        ensure_dir(state, parent);
        link_child(state, parent, path);
    }
    state
        .entries
        .insert(path.to_path_buf(), MockEntry::File(content));
}

fn ensure_dir(state: &mut MockState, path: &Path) {
    if state.entries.contains_key(path) {
        return;
    }
    state
        .entries
        .insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = path.parent()
        && parent != path
    {
        ensure_dir(state, parent);
        link_child(state, parent, path);
    }
}

fn link_child(state: &mut MockState, parent: &Path, child: &Path) {
    let Some(name) = child.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if let Some(MockEntry::Dir(children)) = state.entries.get_mut(parent)
        && !children.iter().any(|c| c == name)
    {
        children.push(name.to_string());
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("not found: {path:?}"))
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.lock().entries.get(path) {
            Some(MockEntry::File(content)) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(io::Error::other(format!("is a directory: {path:?}"))),
            None => Err(not_found(path)),
        }
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.read_only.iter().any(|ro| path.starts_with(ro)) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("read-only: {path:?}"),
            ));
        }
        insert_file(&mut state, path, contents.to_vec());
        state.ops.push(FsOp::Write(path.to_path_buf()));
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        if !state.entries.contains_key(path) {
            return Err(not_found(path));
        }
        state.entries.retain(|p, _| !p.starts_with(path));
        if let Some(parent) = path.parent()
            && let Some(name) = path.file_name().and_then(|n| n.to_str())
            && let Some(MockEntry::Dir(children)) = state.entries.get_mut(parent)
        {
            children.retain(|c| c != name);
        }
        state.ops.push(FsOp::Remove(path.to_path_buf()));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let state = self.lock();
        if state.denied.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {path:?}"),
            ));
        }
        match state.entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(not_found(path)),
        }
    }
}
