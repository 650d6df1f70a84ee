// src/transform/altformat.rs

//! `alt-format`: derive an alternative encoding (WebP by default) of each
//! raster image, alongside the original written by the `image` task.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use super::{Artifact, Artifacts, OutputFile, Transform, TransformInput, parse_options, per_source, with_extension};
use crate::errors::TransformError;
use crate::exec::ToolCommand;
use crate::fileset::SourceFile;
use crate::types::{Mode, PerMode};

pub const NAME: &str = "alt-format";

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AltFormatOptions {
    extension: String,
    /// `{args}` is replaced with the mode's argument string.
    command: String,
    development_args: String,
    production_args: String,
}

impl Default for AltFormatOptions {
    fn default() -> Self {
        Self {
            extension: "webp".into(),
            command: "cwebp -quiet {args} {input} -o -".into(),
            development_args: "-q 75".into(),
            production_args: "-lossless -q 90 -alpha_q 90".into(),
        }
    }
}

#[derive(Debug)]
pub struct AltFormat {
    extension: String,
    tool: ToolCommand,
    args: PerMode<String>,
}

pub fn factory(options: &toml::Table) -> Result<Arc<dyn Transform>, String> {
    let opts: AltFormatOptions = parse_options(options)?;
    let extension = opts.extension.trim_start_matches('.').to_string();
    if extension.is_empty() {
        return Err("extension must not be empty".to_string());
    }
    if opts.command.trim().is_empty() {
        return Err("command must not be empty".to_string());
    }
    Ok(Arc::new(AltFormat {
        extension,
        tool: ToolCommand::new(opts.command),
        args: PerMode {
            development: opts.development_args,
            production: opts.production_args,
        },
    }))
}

impl AltFormat {
    fn encode(&self, src: &SourceFile, mode: Mode) -> Result<Vec<Artifact>, TransformError> {
        let bytes = self.tool.run(&src.path, &[("args", self.args.get(mode).as_str())])?;
        if bytes.is_empty() {
            return Err(TransformError::CodecFailure {
                path: src.path.clone(),
                tool: self.tool.program().to_string(),
                reason: "produced no output".to_string(),
            });
        }
        Ok(vec![Artifact::File(OutputFile::new(
            with_extension(&src.relative, &self.extension),
            bytes,
        ))])
    }
}

impl Transform for AltFormat {
    fn name(&self) -> &str {
        NAME
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        let mode = input.mode;
        per_source(input.sources, move |src| self.encode(src, mode))
    }

    fn planned_outputs(&self, sources: &[SourceFile], _mode: Mode) -> Vec<PathBuf> {
        sources
            .iter()
            .map(|s| with_extension(&s.relative, &self.extension))
            .collect()
    }
}
