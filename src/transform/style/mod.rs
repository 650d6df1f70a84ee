// src/transform/style/mod.rs

//! `style`: stylesheet pipeline.
//!
//! Stages run in a fixed order, filtered by mode when the transform is
//! built:
//!
//! | stage | when |
//! |-------|------|
//! | compile | always |
//! | pack media queries | always |
//! | vendor prefixes | always |
//! | minify | production |
//! | rename to `.min.css` | production |
//! | external source map | development |
//!
//! Partials (file names starting with `_`) are never emitted on their own.

pub mod compile;
pub mod css;
pub mod media;
pub mod prefix;
pub mod sourcemap;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use self::compile::{Compiler, compile};
use self::css::Node;
use self::sourcemap::{SourceMap, mapping_url_comment};
use super::{Artifact, Artifacts, OutputFile, Transform, TransformInput, parse_options, per_source, with_suffix};
use crate::errors::TransformError;
use crate::fileset::SourceFile;
use crate::fs::FileSystem;
use crate::types::{Mode, ModePredicate, PerMode};

pub const NAME: &str = "style";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleStage {
    Compile,
    PackMediaQueries,
    Prefix,
    Minify,
    RenameMin,
    SourceMap,
}

const STAGES: &[(StyleStage, ModePredicate)] = &[
    (StyleStage::Compile, ModePredicate::Always),
    (StyleStage::PackMediaQueries, ModePredicate::Always),
    (StyleStage::Prefix, ModePredicate::Always),
    (StyleStage::Minify, ModePredicate::Production),
    (StyleStage::RenameMin, ModePredicate::Production),
    (StyleStage::SourceMap, ModePredicate::Development),
];

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StyleOptions {
    /// `builtin` or an external command template.
    compiler: String,
    /// Directory (relative to the destination) for development source maps.
    maps_dir: String,
    pack_media_queries: bool,
    prefix: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            compiler: "builtin".into(),
            maps_dir: "maps".into(),
            pack_media_queries: true,
            prefix: true,
        }
    }
}

#[derive(Debug)]
pub struct Style {
    compiler: Compiler,
    maps_dir: PathBuf,
    stages: PerMode<Vec<StyleStage>>,
}

pub fn factory(options: &toml::Table) -> Result<Arc<dyn Transform>, String> {
    let opts: StyleOptions = parse_options(options)?;
    if Path::new(&opts.maps_dir).is_absolute() || opts.maps_dir.contains("..") {
        return Err(format!("maps_dir must be a relative path inside the destination (got {:?})", opts.maps_dir));
    }

    let enabled: Vec<(StyleStage, ModePredicate)> = STAGES
        .iter()
        .copied()
        .filter(|(stage, _)| match stage {
            StyleStage::PackMediaQueries => opts.pack_media_queries,
            StyleStage::Prefix => opts.prefix,
            _ => true,
        })
        .collect();

    Ok(Arc::new(Style {
        compiler: Compiler::from_option(&opts.compiler),
        maps_dir: PathBuf::from(opts.maps_dir),
        stages: PerMode::filter_stages(&enabled),
    }))
}

enum Body {
    Empty,
    Tree(Vec<Node>),
    Text(String),
}

/// Working state of one stylesheet as it moves through the stages.
struct Unit {
    output: PathBuf,
    body: Body,
    sources: Vec<(String, String)>,
    map: Option<OutputFile>,
}

impl Unit {
    fn tree(&mut self, path: &Path) -> Result<Vec<Node>, TransformError> {
        match std::mem::replace(&mut self.body, Body::Empty) {
            Body::Tree(nodes) => Ok(nodes),
            Body::Text(text) => css::parse(&text).map_err(|reason| TransformError::malformed(path, reason)),
            Body::Empty => Err(TransformError::malformed(path, "stylesheet used before compile")),
        }
    }

    fn text(self) -> String {
        match self.body {
            Body::Tree(nodes) => css::render_pretty(&nodes),
            Body::Text(text) => text,
            Body::Empty => String::new(),
        }
    }
}

fn is_partial(src: &SourceFile) -> bool {
    src.relative
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('_'))
}

impl Style {
    fn output_name(&self, relative: &Path, mode: Mode) -> PathBuf {
        let css = relative.with_extension("css");
        if self.stages.get(mode).contains(&StyleStage::RenameMin) {
            with_suffix(&css, ".min")
        } else {
            css
        }
    }

    fn map_path(&self, output: &Path) -> PathBuf {
        let name = output
            .file_name()
            .map(|n| format!("{}.map", n.to_string_lossy()))
            .unwrap_or_else(|| "style.map".to_string());
        let parent = output.parent().unwrap_or(Path::new(""));
        parent.join(&self.maps_dir).join(name)
    }

    fn process(
        &self,
        fs: &dyn FileSystem,
        src: &SourceFile,
        mode: Mode,
    ) -> Result<Vec<Artifact>, TransformError> {
        let mut unit = Unit {
            output: src.relative.with_extension("css"),
            body: Body::Empty,
            sources: Vec::new(),
            map: None,
        };

        for stage in self.stages.get(mode) {
            match stage {
                StyleStage::Compile => {
                    let compiled = compile(&self.compiler, fs, &src.path)?;
                    let nodes = css::parse(&compiled.css)
                        .map_err(|reason| TransformError::malformed(&src.path, reason))?;
                    unit.body = Body::Tree(nodes);
                    unit.sources = compiled.sources;
                }
                StyleStage::PackMediaQueries => {
                    let nodes = unit.tree(&src.path)?;
                    unit.body = Body::Tree(media::pack_media_queries(nodes));
                }
                StyleStage::Prefix => {
                    let nodes = unit.tree(&src.path)?;
                    unit.body = Body::Tree(prefix::add_vendor_prefixes(nodes));
                }
                StyleStage::Minify => {
                    let nodes = unit.tree(&src.path)?;
                    unit.body = Body::Text(css::render_minified(&nodes));
                }
                StyleStage::RenameMin => {
                    unit.output = with_suffix(&unit.output, ".min");
                }
                StyleStage::SourceMap => {
                    let map_rel = self.map_path(&unit.output);
                    let file_name = unit
                        .output
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let map = SourceMap::new(file_name, std::mem::take(&mut unit.sources));
                    let json = map.to_json().map_err(|e| {
                        TransformError::malformed(&src.path, format!("cannot encode source map: {e}"))
                    })?;

                    let nodes = unit.tree(&src.path)?;
                    let url = map_url(&unit.output, &map_rel);
                    let mut text = css::render_pretty(&nodes);
                    text.push_str(&mapping_url_comment(&url));
                    unit.body = Body::Text(text);
                    unit.map = Some(OutputFile::new(map_rel, json));
                }
            }
        }

        let map = unit.map.take();
        let output = unit.output.clone();
        let mut artifacts = vec![Artifact::File(OutputFile::new(output, unit.text().into_bytes()))];
        artifacts.extend(map.map(Artifact::File));
        Ok(artifacts)
    }
}

/// URL of the map relative to the stylesheet that references it.
fn map_url(stylesheet: &Path, map: &Path) -> String {
    let parent = stylesheet.parent().unwrap_or(Path::new(""));
    map.strip_prefix(parent)
        .unwrap_or(map)
        .to_string_lossy()
        .replace('\\', "/")
}

impl Transform for Style {
    fn name(&self) -> &str {
        NAME
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        let fs = input.fs;
        let mode = input.mode;
        let sources: Vec<SourceFile> = input.sources.into_iter().filter(|s| !is_partial(s)).collect();
        per_source(sources, move |src| self.process(fs.as_ref(), src, mode))
    }

    fn planned_outputs(&self, sources: &[SourceFile], mode: Mode) -> Vec<PathBuf> {
        let with_map = self.stages.get(mode).contains(&StyleStage::SourceMap);
        sources
            .iter()
            .filter(|s| !is_partial(s))
            .flat_map(|s| {
                let out = self.output_name(&s.relative, mode);
                let map = with_map.then(|| self.map_path(&out));
                std::iter::once(out).chain(map)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    const MAIN: &str = "@import \"media\";\n\
                        /* layout */\n\
                        $gap: 8px;\n\
                        .grid { display: grid; gap: $gap; user-select: none; }\n";
    const MEDIA: &str = "@media (min-width: 768px) { .grid { gap: 16px; } }\n\
                         .card { margin: 0; }\n";

    fn site() -> Arc<dyn FileSystem> {
        let fs = MockFileSystem::new();
        fs.add_file("/site/src/styles/main.scss", MAIN.as_bytes().to_vec());
        fs.add_file("/site/src/styles/_media.scss", MEDIA.as_bytes().to_vec());
        Arc::new(fs)
    }

    fn run(mode: Mode) -> Vec<OutputFile> {
        let style = factory(&toml::Table::new()).unwrap();
        style
            .apply(TransformInput {
                sources: vec![
                    SourceFile::new("/site/src/styles/main.scss", "main.scss"),
                    SourceFile::new("/site/src/styles/_media.scss", "_media.scss"),
                ],
                destination: Path::new("/site/dist/css"),
                fs: site(),
                mode,
            })
            .map(|a| match a.unwrap() {
                Artifact::File(f) => f,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn development_emits_readable_css_and_map() {
        let files = run(Mode::Development);
        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("main.css"), PathBuf::from("maps/main.css.map")]);

        let css = String::from_utf8(files[0].bytes.clone()).unwrap();
        assert!(css.contains("/* layout */"));
        assert!(css.contains("-webkit-user-select: none;"));
        assert!(css.contains("gap: 8px;"));
        assert!(css.ends_with("/*# sourceMappingURL=maps/main.css.map */\n"));
        // Media query moved after the plain rules.
        assert!(css.find(".card").unwrap() < css.find("@media").unwrap());
        assert!(css.find(".grid {").unwrap() < css.find("@media").unwrap());

        let map: serde_json::Value = serde_json::from_slice(&files[1].bytes).unwrap();
        assert_eq!(map["file"], "main.css");
        assert_eq!(map["sources"][0], "main.scss");
        assert_eq!(map["sources"][1], "_media.scss");
    }

    #[test]
    fn production_is_minified_and_renamed_without_map() {
        let files = run(Mode::Production);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("main.min.css"));

        let css = String::from_utf8(files[0].bytes.clone()).unwrap();
        assert!(!css.contains('\n'));
        assert!(!css.contains("layout"));
        assert!(!css.contains("sourceMappingURL"));
        assert!(css.ends_with("@media (min-width: 768px){.grid{gap:16px}}"));
    }

    #[test]
    fn production_bytes_are_a_subsequence_of_development() {
        let dev = run(Mode::Development).remove(0).bytes;
        let prod = run(Mode::Production).remove(0).bytes;
        let mut dev_iter = dev.iter();
        assert!(prod.iter().all(|b| dev_iter.any(|d| d == b)));
    }

    #[test]
    fn planned_outputs_follow_mode() {
        let style = factory(&toml::Table::new()).unwrap();
        let sources = [
            SourceFile::new("/s/main.scss", "main.scss"),
            SourceFile::new("/s/_x.scss", "_x.scss"),
        ];
        assert_eq!(
            style.planned_outputs(&sources, Mode::Development),
            vec![PathBuf::from("main.css"), PathBuf::from("maps/main.css.map")]
        );
        assert_eq!(
            style.planned_outputs(&sources, Mode::Production),
            vec![PathBuf::from("main.min.css")]
        );
    }

    #[test]
    fn syntax_errors_are_malformed_input() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/main.scss", b"a { color: red;".to_vec());
        let style = factory(&toml::Table::new()).unwrap();
        let items: Vec<_> = style
            .apply(TransformInput {
                sources: vec![SourceFile::new("/s/main.scss", "main.scss")],
                destination: Path::new("/d"),
                fs: Arc::new(fs),
                mode: Mode::Production,
            })
            .collect();
        assert!(matches!(items.as_slice(), [Err(TransformError::MalformedInput { .. })]));
    }
}
