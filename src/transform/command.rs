// src/transform/command.rs

//! `command`: run an arbitrary tool per source file and write its stdout.
//!
//! ```toml
//! [task.docs]
//! transform = "command"
//! src = ["docs/**/*.md"]
//! dest = "dist/docs"
//! options = { command = "pandoc -f markdown -t html {input}", extension = "html" }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use super::{Artifact, Artifacts, OutputFile, Transform, TransformInput, parse_options, per_source, with_extension};
use crate::exec::ToolCommand;
use crate::fileset::SourceFile;
use crate::types::{Mode, PerMode};

pub const NAME: &str = "command";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandOptions {
    command: String,
    /// Overrides `command` in production.
    #[serde(default)]
    production_command: Option<String>,
    /// Replace the output extension.
    #[serde(default)]
    extension: Option<String>,
}

#[derive(Debug)]
pub struct Command {
    tools: PerMode<ToolCommand>,
    extension: Option<String>,
}

pub fn factory(options: &toml::Table) -> Result<Arc<dyn Transform>, String> {
    let opts: CommandOptions = parse_options(options)?;
    if opts.command.trim().is_empty() {
        return Err("command must not be empty".to_string());
    }
    let production = opts.production_command.unwrap_or_else(|| opts.command.clone());
    Ok(Arc::new(Command {
        tools: PerMode {
            development: ToolCommand::new(opts.command),
            production: ToolCommand::new(production),
        },
        extension: opts.extension.map(|e| e.trim_start_matches('.').to_string()),
    }))
}

impl Command {
    fn output_path(&self, src: &SourceFile) -> PathBuf {
        match &self.extension {
            Some(ext) => with_extension(&src.relative, ext),
            None => src.relative.clone(),
        }
    }
}

impl Transform for Command {
    fn name(&self) -> &str {
        NAME
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        let tool = self.tools.get(input.mode);
        per_source(input.sources, move |src| {
            let bytes = tool.run(&src.path, &[])?;
            Ok(vec![Artifact::File(OutputFile::new(self.output_path(src), bytes))])
        })
    }

    fn planned_outputs(&self, sources: &[SourceFile], _mode: Mode) -> Vec<PathBuf> {
        sources.iter().map(|s| self.output_path(s)).collect()
    }
}
