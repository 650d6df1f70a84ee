// src/watch/path_utils.rs

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to canonicalizing both sides when the direct prefix strip
/// fails (symlinked roots, `/private/var` vs `/var` on macOS). Returns
/// `None` if the path is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok()?;
    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// Whether `path` lies inside any of `dirs`.
pub fn is_inside_any(path: &Path, dirs: &[impl AsRef<Path>]) -> bool {
    dirs.iter().any(|d| path.starts_with(d.as_ref()))
}
