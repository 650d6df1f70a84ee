// src/transform/copy.rs

//! `copy`: static files copied verbatim (fonts, `robots.txt`, ...).

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use super::{Artifact, Artifacts, OutputFile, Transform, TransformInput, parse_options, per_source, read_source};
use crate::fileset::SourceFile;
use crate::types::Mode;

pub const NAME: &str = "copy";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CopyOptions {
    /// Drop the source directory structure and copy into the destination root.
    flatten: bool,
}

#[derive(Debug, Default)]
pub struct StaticCopy {
    flatten: bool,
}

pub fn factory(options: &toml::Table) -> Result<Arc<dyn Transform>, String> {
    let opts: CopyOptions = parse_options(options)?;
    Ok(Arc::new(StaticCopy {
        flatten: opts.flatten,
    }))
}

impl StaticCopy {
    fn output_path(&self, src: &SourceFile) -> PathBuf {
        if self.flatten {
            src.relative
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| src.relative.clone())
        } else {
            src.relative.clone()
        }
    }
}

impl Transform for StaticCopy {
    fn name(&self) -> &str {
        NAME
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        let fs = input.fs;
        per_source(input.sources, move |src| {
            let bytes = read_source(fs.as_ref(), src)?;
            Ok(vec![Artifact::File(OutputFile::new(self.output_path(src), bytes))])
        })
    }

    fn planned_outputs(&self, sources: &[SourceFile], _mode: Mode) -> Vec<PathBuf> {
        sources.iter().map(|s| self.output_path(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::fs::FileSystem;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn copies_bytes_under_relative_path() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/src/fonts/a/regular.woff2", vec![0u8, 1, 2]);
        let shared: Arc<dyn FileSystem> = Arc::new(fs);

        let copy = StaticCopy::default();
        let out: Vec<_> = copy
            .apply(TransformInput {
                sources: vec![SourceFile::new("/site/src/fonts/a/regular.woff2", "a/regular.woff2")],
                destination: Path::new("/site/dist/fonts"),
                fs: shared,
                mode: Mode::Production,
            })
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            out,
            vec![Artifact::File(OutputFile::new("a/regular.woff2", vec![0u8, 1, 2]))]
        );
    }

    #[test]
    fn flatten_uses_file_name_only() {
        let copy = StaticCopy { flatten: true };
        let planned = copy.planned_outputs(&[SourceFile::new("/s/a/b.txt", "a/b.txt")], Mode::Development);
        assert_eq!(planned, vec![PathBuf::from("b.txt")]);
    }
}
