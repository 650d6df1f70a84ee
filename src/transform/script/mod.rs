// src/transform/script/mod.rs

//! `script`: bundle each entry file with its `require` graph, packages
//! from `node_modules` included.
//!
//! Development bundles carry a path banner per module; production bundles
//! are minified and written as `<name>.min.js`.

pub mod bundle;
pub mod minify;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use self::bundle::ModuleGraph;
use self::minify::minify_js;
use super::{Artifact, Artifacts, OutputFile, Transform, TransformInput, parse_options, per_source, with_suffix};
use crate::errors::TransformError;
use crate::fileset::SourceFile;
use crate::fs::FileSystem;
use crate::types::{Mode, ModePredicate, PerMode};

pub const NAME: &str = "script";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptStage {
    Banners,
    Minify,
    RenameMin,
}

const STAGES: &[(ScriptStage, ModePredicate)] = &[
    (ScriptStage::Banners, ModePredicate::Development),
    (ScriptStage::Minify, ModePredicate::Production),
    (ScriptStage::RenameMin, ModePredicate::Production),
];

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ScriptOptions {
    /// Output file name for a single entry (defaults to the entry's name).
    output: Option<String>,
}

#[derive(Debug)]
pub struct Script {
    output: Option<PathBuf>,
    stages: PerMode<Vec<ScriptStage>>,
}

pub fn factory(options: &toml::Table) -> Result<Arc<dyn Transform>, String> {
    let opts: ScriptOptions = parse_options(options)?;
    if let Some(out) = &opts.output
        && (Path::new(out).is_absolute() || out.contains(".."))
    {
        return Err(format!("output must be a relative file name (got {out:?})"));
    }
    Ok(Arc::new(Script {
        output: opts.output.map(PathBuf::from),
        stages: PerMode::filter_stages(STAGES),
    }))
}

impl Script {
    fn output_name(&self, entry: &SourceFile, single: bool, mode: Mode) -> PathBuf {
        let base = match (&self.output, single) {
            (Some(name), true) => name.clone(),
            _ => entry.relative.with_extension("js"),
        };
        if self.stages.get(mode).contains(&ScriptStage::RenameMin) {
            with_suffix(&base, ".min")
        } else {
            base
        }
    }

    fn bundle(
        &self,
        fs: &dyn FileSystem,
        entry: &SourceFile,
        single: bool,
        mode: Mode,
    ) -> Result<Vec<Artifact>, TransformError> {
        let stages = self.stages.get(mode);
        let graph = ModuleGraph::build(fs, &entry.path)?;
        debug!(entry = %entry.relative.display(), modules = graph.len(), "bundled script");

        let mut text = graph.render(stages.contains(&ScriptStage::Banners));
        if stages.contains(&ScriptStage::Minify) {
            text = minify_js(&text);
        }
        Ok(vec![Artifact::File(OutputFile::new(
            self.output_name(entry, single, mode),
            text.into_bytes(),
        ))])
    }
}

impl Transform for Script {
    fn name(&self) -> &str {
        NAME
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        let fs = input.fs;
        let mode = input.mode;
        let single = input.sources.len() == 1;
        per_source(input.sources, move |entry| self.bundle(fs.as_ref(), entry, single, mode))
    }

    fn planned_outputs(&self, sources: &[SourceFile], mode: Mode) -> Vec<PathBuf> {
        let single = sources.len() == 1;
        sources
            .iter()
            .map(|s| self.output_name(s, single, mode))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn run(mode: Mode) -> OutputFile {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/s/js/main.js",
            b"// entry\nvar nav = require('./nav');\n\nnav();\n".to_vec(),
        );
        fs.add_file("/s/js/nav.js", b"/* nav */\nmodule.exports = function () {};\n".to_vec());

        let script = factory(&toml::Table::new()).unwrap();
        let mut out = script.apply(TransformInput {
            sources: vec![SourceFile::new("/s/js/main.js", "main.js")],
            destination: Path::new("/d/js"),
            fs: Arc::new(fs),
            mode,
        });
        match out.next() {
            Some(Ok(Artifact::File(f))) => f,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn development_bundle_keeps_comments_and_banners() {
        let file = run(Mode::Development);
        assert_eq!(file.path, PathBuf::from("main.js"));
        let text = String::from_utf8(file.bytes).unwrap();
        assert!(text.contains("/* ./main.js */"));
        assert!(text.contains("/* ./nav.js */"));
        assert!(text.contains("// entry"));
        assert!(text.contains("require(1)"));
    }

    #[test]
    fn production_bundle_is_minified_and_renamed() {
        let file = run(Mode::Production);
        assert_eq!(file.path, PathBuf::from("main.min.js"));
        let text = String::from_utf8(file.bytes).unwrap();
        assert!(!text.contains("// entry"));
        assert!(!text.contains("/* nav */"));
        assert!(!text.contains("\n\n"));
        assert!(text.contains("require(1)"));
    }

    #[test]
    fn output_override_applies_to_single_entry() {
        let opts: toml::Table = toml::from_str(r#"output = "app.js""#).unwrap();
        let script = factory(&opts).unwrap();
        let one = [SourceFile::new("/s/main.js", "main.js")];
        assert_eq!(script.planned_outputs(&one, Mode::Production), vec![PathBuf::from("app.min.js")]);

        let two = [
            SourceFile::new("/s/a.js", "a.js"),
            SourceFile::new("/s/b.js", "b.js"),
        ];
        assert_eq!(
            script.planned_outputs(&two, Mode::Development),
            vec![PathBuf::from("a.js"), PathBuf::from("b.js")]
        );
    }
}
