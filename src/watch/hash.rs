// src/watch/hash.rs

use std::collections::HashMap;
use std::io;

use blake3::Hasher;
use tracing::{debug, info};

use crate::fileset::SourceFile;
use crate::fs::FileSystem;

/// Deterministic hash over the paths and contents of `sources`.
///
/// Order of `sources` does not matter. Each file contributes its full path
/// and its output-relative path, so renaming a file changes the hash even
/// when its contents do not.
pub fn compute_sources_hash(fs: &dyn FileSystem, sources: &[SourceFile]) -> io::Result<String> {
    let mut sorted: Vec<&SourceFile> = sources.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Hasher::new();
    for src in sorted {
        let contents = fs.read(&src.path)?;
        hasher.update(src.path.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(src.relative.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(blake3::hash(&contents).as_bytes());
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, files = sources.len(), "computed aggregate hash");
    Ok(hash)
}

/// Abstract storage for per-task hashes.
pub trait HashStore: Send {
    fn load(&self, task: &str) -> Option<String>;
    fn save(&mut self, task: &str, hash: &str);
}

/// Hashes kept for the lifetime of one watch session.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    map: HashMap<String, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, task: &str) -> Option<String> {
        self.map.get(task).cloned()
    }

    fn save(&mut self, task: &str, hash: &str) {
        self.map.insert(task.to_string(), hash.to_string());
        info!(task = %task, hash = %hash, "stored task hash");
    }
}
