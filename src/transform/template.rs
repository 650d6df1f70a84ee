// src/transform/template.rs

//! `template`: render HTML pages with minijinja.
//!
//! Includes and `{% extends %}` resolve relative to the base directory of
//! the page being rendered, through the task's [`FileSystem`], so partials
//! are never copied to the destination themselves.
//!
//! The render context contains:
//! - `mode` (`"development"` / `"production"`) and `production` (bool)
//! - `livereload`: the reload client `<script>` tag in development, empty
//!   in production
//! - everything under `options.context`
//!
//! In production the `replace` pairs are applied to the rendered text
//! (defaults point `main.css` / `main.js` at their `.min` variants).

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{Environment, ErrorKind, Value};
use serde::Deserialize;

use super::{Artifact, Artifacts, OutputFile, Transform, TransformInput, parse_options, per_source};
use crate::errors::TransformError;
use crate::fileset::SourceFile;
use crate::fs::FileSystem;
use crate::server::LIVERELOAD_SCRIPT_PATH;
use crate::types::Mode;

pub const NAME: &str = "template";

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TemplateOptions {
    context: toml::Table,
    replace: Vec<(String, String)>,
    livereload: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            context: toml::Table::new(),
            replace: vec![
                ("main.css".into(), "main.min.css".into()),
                ("main.js".into(), "main.min.js".into()),
            ],
            livereload: true,
        }
    }
}

#[derive(Debug)]
pub struct Template {
    context: toml::Table,
    replace: Vec<(String, String)>,
    livereload: bool,
}

pub fn factory(options: &toml::Table) -> Result<Arc<dyn Transform>, String> {
    let opts: TemplateOptions = parse_options(options)?;
    if let Some((from, _)) = opts.replace.iter().find(|(from, _)| from.is_empty()) {
        return Err(format!("replace pattern must not be empty (got {from:?})"));
    }
    Ok(Arc::new(Template {
        context: opts.context,
        replace: opts.replace,
        livereload: opts.livereload,
    }))
}

/// `index.html.j2` → `index.html`, `about.jinja` → `about.html`.
fn output_path(relative: &Path) -> PathBuf {
    let is_template_ext = matches!(
        relative.extension().and_then(|e| e.to_str()),
        Some("j2" | "jinja")
    );
    if !is_template_ext {
        return relative.to_path_buf();
    }
    let stripped = relative.with_extension("");
    if stripped.extension().is_some() {
        stripped
    } else {
        stripped.with_extension("html")
    }
}

/// Directory the matched pattern's base maps to on disk.
fn base_dir(src: &SourceFile) -> PathBuf {
    let depth = src.relative.components().count();
    src.path
        .ancestors()
        .nth(depth)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

impl Template {
    fn environment(&self, fs: Arc<dyn FileSystem>, base: PathBuf) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_loader(move |name: &str| {
            let path = base.join(name);
            match fs.read_to_string(&path) {
                Ok(text) => Ok(Some(text)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("cannot read template {}: {e}", path.display()),
                )),
            }
        });
        env
    }

    fn context(&self, mode: Mode) -> BTreeMap<String, Value> {
        let mut ctx: BTreeMap<String, Value> = self
            .context
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_serialize(v)))
            .collect();
        ctx.insert("mode".into(), Value::from(mode.as_str()));
        ctx.insert("production".into(), Value::from(mode.is_production()));

        let script = if self.livereload && !mode.is_production() {
            format!(r#"<script src="{LIVERELOAD_SCRIPT_PATH}" defer></script>"#)
        } else {
            String::new()
        };
        ctx.insert("livereload".into(), Value::from_safe_string(script));
        ctx
    }

    fn render(
        &self,
        fs: &Arc<dyn FileSystem>,
        src: &SourceFile,
        mode: Mode,
    ) -> Result<Vec<Artifact>, TransformError> {
        let env = self.environment(Arc::clone(fs), base_dir(src));
        let name = src.relative.to_string_lossy().replace('\\', "/");

        let rendered = env
            .get_template(&name)
            .and_then(|tmpl| tmpl.render(self.context(mode)))
            .map_err(|e| TransformError::malformed(&src.path, format!("{e:#}")))?;

        let text = if mode.is_production() {
            self.replace
                .iter()
                .fold(rendered, |acc, (from, to)| acc.replace(from.as_str(), to))
        } else {
            rendered
        };

        Ok(vec![Artifact::File(OutputFile::new(
            output_path(&src.relative),
            text.into_bytes(),
        ))])
    }
}

impl Transform for Template {
    fn name(&self) -> &str {
        NAME
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        let fs = input.fs;
        let mode = input.mode;
        per_source(input.sources, move |src| self.render(&fs, src, mode))
    }

    fn planned_outputs(&self, sources: &[SourceFile], _mode: Mode) -> Vec<PathBuf> {
        sources.iter().map(|s| output_path(&s.relative)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn site() -> Arc<dyn FileSystem> {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/site/src/html/index.html",
            br#"{% include "partials/head.html" %}<body>{{ title }}</body>{{ livereload }}"#.to_vec(),
        );
        fs.add_file(
            "/site/src/html/partials/head.html",
            br#"<link href="css/main.css"><script src="js/main.js"></script>"#.to_vec(),
        );
        Arc::new(fs)
    }

    fn render(mode: Mode) -> Result<String, TransformError> {
        let mut context = toml::Table::new();
        context.insert("title".into(), toml::Value::String("Hello".into()));
        let mut options = toml::Table::new();
        options.insert("context".into(), toml::Value::Table(context));
        let tmpl = factory(&options).map_err(|e| TransformError::malformed("/", e))?;

        let mut out = tmpl.apply(TransformInput {
            sources: vec![SourceFile::new("/site/src/html/index.html", "index.html")],
            destination: Path::new("/site/dist"),
            fs: site(),
            mode,
        });
        match out.next() {
            Some(Ok(Artifact::File(file))) => {
                assert_eq!(file.path, PathBuf::from("index.html"));
                Ok(String::from_utf8(file.bytes).unwrap())
            }
            Some(Err(e)) => Err(e),
            other => panic!("unexpected artifact: {other:?}"),
        }
    }

    #[test]
    fn development_injects_livereload_and_keeps_names() {
        let html = render(Mode::Development).unwrap();
        assert!(html.contains("<body>Hello</body>"));
        assert!(html.contains("css/main.css"));
        assert!(html.contains(LIVERELOAD_SCRIPT_PATH));
    }

    #[test]
    fn production_points_at_minified_assets() {
        let html = render(Mode::Production).unwrap();
        assert!(html.contains("css/main.min.css"));
        assert!(html.contains("js/main.min.js"));
        assert!(!html.contains(LIVERELOAD_SCRIPT_PATH));
    }

    #[test]
    fn missing_include_is_malformed_input() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/src/html/index.html", br#"{% include "nope.html" %}"#.to_vec());
        let tmpl = factory(&toml::Table::new()).unwrap();
        let items: Vec<_> = tmpl
            .apply(TransformInput {
                sources: vec![SourceFile::new("/site/src/html/index.html", "index.html")],
                destination: Path::new("/site/dist"),
                fs: Arc::new(fs),
                mode: Mode::Development,
            })
            .collect();
        assert!(matches!(
            items.as_slice(),
            [Err(TransformError::MalformedInput { .. })]
        ));
    }

    #[test]
    fn template_extension_is_stripped() {
        assert_eq!(output_path(Path::new("index.html.j2")), PathBuf::from("index.html"));
        assert_eq!(output_path(Path::new("about.jinja")), PathBuf::from("about.html"));
        assert_eq!(output_path(Path::new("a/b.html")), PathBuf::from("a/b.html"));
    }
}
