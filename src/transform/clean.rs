// src/transform/clean.rs

//! `clean`: empty the task destination.
//!
//! Emits one [`Artifact::Delete`] per entry directly under the destination.
//! A missing destination is already clean.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use super::{Artifact, Artifacts, Transform, TransformInput, parse_options};
use crate::errors::TransformError;

pub const NAME: &str = "clean";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CleanOptions {
    /// Top-level entry names to preserve (e.g. `.git`).
    keep: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Clean {
    keep: Vec<String>,
}

pub fn factory(options: &toml::Table) -> Result<Arc<dyn Transform>, String> {
    let opts: CleanOptions = parse_options(options)?;
    Ok(Arc::new(Clean { keep: opts.keep }))
}

impl Transform for Clean {
    fn name(&self) -> &str {
        NAME
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        let entries = match input.fs.read_dir(input.destination) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Box::new(std::iter::once(Err(TransformError::WriteFailure {
                    path: input.destination.to_path_buf(),
                    source,
                })));
            }
        };

        let mut names: Vec<PathBuf> = entries
            .iter()
            .filter_map(|p| p.file_name().map(PathBuf::from))
            .filter(|name| !self.keep.iter().any(|k| name.as_os_str() == k.as_str()))
            .collect();
        names.sort();

        Box::new(names.into_iter().map(|name| Ok(Artifact::Delete(name))))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::fs::FileSystem;
    use crate::fs::mock::MockFileSystem;
    use crate::types::Mode;

    #[test]
    fn deletes_every_top_level_entry_except_kept() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/dist/index.html", b"x".to_vec());
        fs.add_file("/site/dist/css/main.css", b"x".to_vec());
        fs.add_file("/site/dist/.git/HEAD", b"x".to_vec());
        let shared: Arc<dyn FileSystem> = Arc::new(fs);

        let clean = Clean {
            keep: vec![".git".into()],
        };
        let out: Vec<_> = clean
            .apply(TransformInput {
                sources: Vec::new(),
                destination: Path::new("/site/dist"),
                fs: shared,
                mode: Mode::Production,
            })
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            out,
            vec![
                Artifact::Delete(PathBuf::from("css")),
                Artifact::Delete(PathBuf::from("index.html")),
            ]
        );
    }

    #[test]
    fn missing_destination_is_a_no_op() {
        let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
        let clean = Clean::default();
        let count = clean
            .apply(TransformInput {
                sources: Vec::new(),
                destination: Path::new("/nowhere"),
                fs,
                mode: Mode::Development,
            })
            .count();
        assert_eq!(count, 0);
    }
}
