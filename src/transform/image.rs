// src/transform/image.rs

//! `image`: per-format image optimisation.
//!
//! Each extension maps to a codec per mode. Codecs are either `passthrough`,
//! the built-in `svg-minify`, or an external command template whose stdout
//! is the optimised image. Development defaults to passthrough everywhere.
//!
//! ```toml
//! [task.images.options.codecs.png]
//! production = "pngquant --speed 5 --quality 70-80 - < {input}"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::{Artifact, Artifacts, OutputFile, Transform, TransformInput, extension_of, parse_options, per_source, read_source};
use crate::errors::TransformError;
use crate::exec::ToolCommand;
use crate::fileset::SourceFile;
use crate::types::{Mode, PerMode};

pub const NAME: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Codec {
    Passthrough,
    SvgMinify,
    Tool(ToolCommand),
}

impl Codec {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "passthrough" => Codec::Passthrough,
            "svg-minify" => Codec::SvgMinify,
            cmd => Codec::Tool(ToolCommand::new(cmd)),
        }
    }
}

static PASSTHROUGH: Codec = Codec::Passthrough;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CodecSpec {
    development: Option<String>,
    production: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ImageOptions {
    codecs: BTreeMap<String, CodecSpec>,
}

fn default_production_codecs() -> BTreeMap<String, Codec> {
    [
        ("gif", "gifsicle -O3 --lossy=2 {input}"),
        ("png", "pngquant --speed 5 --quality 70-80 - < {input}"),
        ("jpg", "cjpeg -quality 70 -progressive {input}"),
        ("jpeg", "cjpeg -quality 70 -progressive {input}"),
        ("svg", "svg-minify"),
    ]
    .into_iter()
    .map(|(ext, codec)| (ext.to_string(), Codec::parse(codec)))
    .collect()
}

#[derive(Debug)]
pub struct ImageOptimize {
    codecs: PerMode<BTreeMap<String, Codec>>,
}

pub fn factory(options: &toml::Table) -> Result<Arc<dyn Transform>, String> {
    let opts: ImageOptions = parse_options(options)?;

    let mut development: BTreeMap<String, Codec> = BTreeMap::new();
    let mut production = default_production_codecs();
    for (ext, spec) in opts.codecs {
        let ext = ext.trim_start_matches('.').to_lowercase();
        if let Some(dev) = spec.development {
            development.insert(ext.clone(), Codec::parse(&dev));
        }
        if let Some(prod) = spec.production {
            production.insert(ext, Codec::parse(&prod));
        }
    }

    Ok(Arc::new(ImageOptimize {
        codecs: PerMode {
            development,
            production,
        },
    }))
}

impl ImageOptimize {
    fn codec_for(&self, src: &SourceFile, mode: Mode) -> &Codec {
        extension_of(&src.relative)
            .and_then(|ext| self.codecs.get(mode).get(&ext))
            .unwrap_or(&PASSTHROUGH)
    }

    fn optimise(&self, bytes: Vec<u8>, src: &SourceFile, mode: Mode) -> Result<Vec<u8>, TransformError> {
        match self.codec_for(src, mode) {
            Codec::Passthrough => Ok(bytes),
            Codec::SvgMinify => {
                let text = String::from_utf8(bytes)
                    .map_err(|_| TransformError::malformed(&src.path, "SVG is not UTF-8"))?;
                minify_svg(&text)
                    .map(String::into_bytes)
                    .map_err(|reason| TransformError::malformed(&src.path, reason))
            }
            Codec::Tool(tool) => {
                let out = tool.run(&src.path, &[])?;
                if out.is_empty() {
                    return Err(TransformError::CodecFailure {
                        path: src.path.clone(),
                        tool: tool.program().to_string(),
                        reason: "produced no output".to_string(),
                    });
                }
                debug!(
                    file = %src.relative.display(),
                    before = bytes.len(),
                    after = out.len(),
                    "optimised image"
                );
                Ok(out)
            }
        }
    }
}

impl Transform for ImageOptimize {
    fn name(&self) -> &str {
        NAME
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        let fs = input.fs;
        let mode = input.mode;
        per_source(input.sources, move |src| {
            let bytes = read_source(fs.as_ref(), src)?;
            let out = self.optimise(bytes, src, mode)?;
            Ok(vec![Artifact::File(OutputFile::new(src.relative.clone(), out))])
        })
    }

    fn planned_outputs(&self, sources: &[SourceFile], _mode: Mode) -> Vec<PathBuf> {
        sources.iter().map(|s| s.relative.clone()).collect()
    }
}

static XML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));
static EMPTY_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+[A-Za-z_:][\w:.-]*="""#).expect("valid regex"));
static METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<metadata\b.*?</metadata>").expect("valid regex"));

/// Conservative SVG minification.
///
/// Removes comments, `<metadata>`, empty attributes and whitespace between
/// tags. `viewBox` and all visible content are kept.
pub fn minify_svg(text: &str) -> Result<String, String> {
    if !text.contains("<svg") {
        return Err("no <svg> element".to_string());
    }
    let out = XML_COMMENT.replace_all(text, "");
    let out = METADATA.replace_all(&out, "");
    let out = EMPTY_ATTR.replace_all(&out, "");
    let out = BETWEEN_TAGS.replace_all(&out, "><");
    Ok(out.trim().to_string())
}
