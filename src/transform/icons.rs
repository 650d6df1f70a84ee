// src/transform/icons.rs

//! `icons`: resize one master image into the favicon / touch-icon set.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use super::{Artifact, Artifacts, OutputFile, Transform, TransformInput, parse_options};
use crate::errors::TransformError;
use crate::exec::ToolCommand;
use crate::fileset::SourceFile;
use crate::types::Mode;

pub const NAME: &str = "icons";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IconSpec {
    pub name: String,
    pub size: u32,
}

impl IconSpec {
    fn new(name: &str, size: u32) -> Self {
        Self {
            name: name.to_string(),
            size,
        }
    }
}

fn default_icons() -> Vec<IconSpec> {
    vec![
        IconSpec::new("favicon-16x16.png", 16),
        IconSpec::new("favicon-32x32.png", 32),
        IconSpec::new("favicon-48x48.png", 48),
        IconSpec::new("apple-touch-icon-57x57.png", 57),
        IconSpec::new("apple-touch-icon-76x76.png", 76),
        IconSpec::new("apple-touch-icon-120x120.png", 120),
        IconSpec::new("apple-touch-icon-152x152.png", 152),
        IconSpec::new("apple-touch-icon.png", 180),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct IconsOptions {
    /// `{size}` is replaced with each icon's edge length in pixels.
    command: String,
    icons: Vec<IconSpec>,
}

impl Default for IconsOptions {
    fn default() -> Self {
        Self {
            command: "convert {input} -resize {size}x{size} png:-".into(),
            icons: default_icons(),
        }
    }
}

#[derive(Debug)]
pub struct Icons {
    tool: ToolCommand,
    icons: Vec<IconSpec>,
}

pub fn factory(options: &toml::Table) -> Result<Arc<dyn Transform>, String> {
    let opts: IconsOptions = parse_options(options)?;
    if let Some(bad) = opts.icons.iter().find(|i| i.size == 0 || i.name.trim().is_empty()) {
        return Err(format!("invalid icon entry {:?} (size {})", bad.name, bad.size));
    }
    Ok(Arc::new(Icons {
        tool: ToolCommand::new(opts.command),
        icons: opts.icons,
    }))
}

impl Transform for Icons {
    fn name(&self) -> &str {
        NAME
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        let mut sources = input.sources;
        let master = match sources.len() {
            0 => return Box::new(std::iter::empty()),
            1 => sources.remove(0),
            n => {
                return Box::new(std::iter::once(Err(TransformError::malformed(
                    &sources[0].path,
                    format!("icons expects exactly one master image, got {n}"),
                ))));
            }
        };

        Box::new(self.icons.iter().map(move |icon| {
            let size = icon.size.to_string();
            let bytes = self.tool.run(&master.path, &[("size", size.as_str())])?;
            Ok(Artifact::File(OutputFile::new(icon.name.clone(), bytes)))
        }))
    }

    fn planned_outputs(&self, sources: &[SourceFile], _mode: Mode) -> Vec<PathBuf> {
        if sources.is_empty() {
            return Vec::new();
        }
        self.icons.iter().map(|i| PathBuf::from(&i.name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::fs::FileSystem;
    use crate::fs::mock::MockFileSystem;

    fn input(sources: Vec<SourceFile>) -> TransformInput<'static> {
        let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
        TransformInput {
            sources,
            destination: Path::new("/d"),
            fs,
            mode: Mode::Production,
        }
    }

    #[test]
    fn default_set_is_planned_for_one_master() {
        let icons = factory(&toml::Table::new()).unwrap();
        let planned = icons.planned_outputs(&[SourceFile::new("/s/favicon.png", "favicon.png")], Mode::Production);
        assert_eq!(planned.len(), 8);
        assert_eq!(planned[0], PathBuf::from("favicon-16x16.png"));
        assert!(icons.planned_outputs(&[], Mode::Production).is_empty());
    }

    #[test]
    fn several_masters_are_rejected() {
        let icons = factory(&toml::Table::new()).unwrap();
        let items: Vec<_> = icons
            .apply(input(vec![
                SourceFile::new("/s/a.png", "a.png"),
                SourceFile::new("/s/b.png", "b.png"),
            ]))
            .collect();
        assert!(matches!(items.as_slice(), [Err(TransformError::MalformedInput { .. })]));
    }

    #[cfg(unix)]
    #[test]
    fn each_size_is_rendered_by_the_tool() {
        let opts: toml::Table = toml::from_str(
            r#"
            command = "printf {size}"
            icons = [{ name = "a.png", size = 16 }, { name = "b.png", size = 32 }]
            "#,
        )
        .unwrap();
        let icons = factory(&opts).unwrap();
        let out: Vec<_> = icons
            .apply(input(vec![SourceFile::new("/s/favicon.png", "favicon.png")]))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            out,
            vec![
                Artifact::File(OutputFile::new("a.png", b"16".to_vec())),
                Artifact::File(OutputFile::new("b.png", b"32".to_vec())),
            ]
        );
    }
}
