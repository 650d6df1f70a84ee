// src/transform/style/compile.rs

//! Stylesheet compilation stage.
//!
//! The built-in compiler handles the SCSS subset static sites typically use
//! for one entry stylesheet: `@import` of partials (`_name.scss`), flat
//! `$variables` and `//` line comments. Anything beyond that goes through an
//! external compiler command, e.g. `sass --no-source-map {input}`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::TransformError;
use crate::exec::ToolCommand;
use crate::fs::FileSystem;

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:"([^"]+)"|'([^']+)')\s*;[ \t]*\r?\n?"#).expect("valid regex")
});
static VARIABLE_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\$([A-Za-z_][\w-]*)\s*:\s*([^;]+?)\s*(!default)?\s*;[ \t]*\r?\n?")
        .expect("valid regex")
});
static VARIABLE_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][\w-]*)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compiler {
    Builtin,
    External(ToolCommand),
}

impl Compiler {
    pub fn from_option(value: &str) -> Self {
        match value.trim() {
            "" | "builtin" => Compiler::Builtin,
            cmd => Compiler::External(ToolCommand::new(cmd)),
        }
    }
}

/// Compiled CSS text plus every input that contributed to it.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub css: String,
    /// `(name relative to the entry's directory, original text)`.
    pub sources: Vec<(String, String)>,
}

pub fn compile(
    compiler: &Compiler,
    fs: &dyn FileSystem,
    entry: &Path,
) -> Result<Compiled, TransformError> {
    match compiler {
        Compiler::Builtin => {
            let base = entry.parent().unwrap_or(Path::new("")).to_path_buf();
            let mut state = ImportState {
                fs,
                base,
                stack: Vec::new(),
                sources: Vec::new(),
            };
            let inlined = state.inline(entry)?;
            let css = substitute_variables(entry, &inlined)?;
            Ok(Compiled {
                css,
                sources: state.sources,
            })
        }
        Compiler::External(tool) => {
            let bytes = tool.run(entry, &[])?;
            let css = String::from_utf8(bytes).map_err(|_| TransformError::CodecFailure {
                path: entry.to_path_buf(),
                tool: tool.program().to_string(),
                reason: "output is not UTF-8".to_string(),
            })?;
            let original = fs
                .read_to_string(entry)
                .map_err(|e| TransformError::read(entry, e))?;
            let name = file_name(entry);
            Ok(Compiled {
                css,
                sources: vec![(name, original)],
            })
        }
    }
}

struct ImportState<'a> {
    fs: &'a dyn FileSystem,
    base: PathBuf,
    stack: Vec<PathBuf>,
    sources: Vec<(String, String)>,
}

impl ImportState<'_> {
    fn inline(&mut self, path: &Path) -> Result<String, TransformError> {
        if self.stack.iter().any(|p| p == path) {
            return Err(TransformError::malformed(path, "circular @import"));
        }
        let text = self
            .fs
            .read_to_string(path)
            .map_err(|e| TransformError::read(path, e))?;

        let name = path
            .strip_prefix(&self.base)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| file_name(path));
        if !self.sources.iter().any(|(n, _)| *n == name) {
            self.sources.push((name, text.clone()));
        }

        let text = strip_line_comments(&text);
        let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();

        self.stack.push(path.to_path_buf());
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in IMPORT.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(target) = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            if is_plain_css_import(target) {
                out.push_str(whole.as_str());
                continue;
            }
            let resolved = self.resolve(&dir, target).ok_or_else(|| {
                TransformError::malformed(path, format!("cannot resolve @import \"{target}\""))
            })?;
            let inlined = self.inline(&resolved)?;
            out.push_str(inlined.trim_end());
            out.push('\n');
        }
        out.push_str(&text[last..]);
        self.stack.pop();
        Ok(out)
    }

    /// Sass lookup order: exact, `.scss`, `_name.scss`, `.css`, `_name.css`.
    fn resolve(&self, dir: &Path, target: &str) -> Option<PathBuf> {
        let rel = Path::new(target);
        let parent = dir.join(rel.parent().unwrap_or(Path::new("")));
        let stem = rel.file_name()?.to_string_lossy().into_owned();

        let candidates = [
            parent.join(&stem),
            parent.join(format!("{stem}.scss")),
            parent.join(format!("_{stem}.scss")),
            parent.join(format!("{stem}.css")),
            parent.join(format!("_{stem}.css")),
        ];
        candidates.into_iter().find(|c| self.fs.is_file(c))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_plain_css_import(target: &str) -> bool {
    target.starts_with("http://")
        || target.starts_with("https://")
        || target.starts_with("//")
        || target.starts_with("url(")
}

/// Drop `//` comments that are outside strings and parentheses.
pub fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let chars: Vec<char> = line.chars().collect();
        let mut quote: Option<char> = None;
        let mut depth = 0usize;
        let mut in_block_comment = false;
        let mut cut = None;

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            if in_block_comment {
                if c == '*' && next == Some('/') {
                    in_block_comment = false;
                    i += 1;
                }
            } else if let Some(q) = quote {
                if c == '\\' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            } else {
                match (c, next) {
                    ('/', Some('*')) => {
                        in_block_comment = true;
                        i += 1;
                    }
                    ('/', Some('/')) if depth == 0 => {
                        cut = Some(i);
                        break;
                    }
                    ('"' | '\'', _) => quote = Some(c),
                    ('(', _) => depth += 1,
                    (')', _) => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            i += 1;
        }

        match cut {
            Some(idx) => {
                let kept: String = chars[..idx].iter().collect();
                out.push_str(kept.trim_end());
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => out.push_str(line),
        }
    }
    out
}

/// Resolve flat `$name: value;` variables. A later plain definition
/// replaces an earlier one; `!default` only sets a name not yet defined.
fn substitute_variables(entry: &Path, text: &str) -> Result<String, TransformError> {
    let mut vars: BTreeMap<String, String> = BTreeMap::new();
    for caps in VARIABLE_DEF.captures_iter(text) {
        let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let is_default = caps.get(3).is_some();
        if is_default && vars.contains_key(name.as_str()) {
            continue;
        }
        vars.insert(name.as_str().to_string(), value.as_str().to_string());
    }
    let body = VARIABLE_DEF.replace_all(text, "");

    // Values may refer to earlier variables.
    let resolved: BTreeMap<String, String> = vars
        .iter()
        .map(|(name, value)| {
            let mut v = value.clone();
            for _ in 0..8 {
                if !VARIABLE_USE.is_match(&v) {
                    break;
                }
                v = VARIABLE_USE
                    .replace_all(&v, |c: &regex::Captures<'_>| {
                        vars.get(&c[1]).cloned().unwrap_or_else(|| c[0].to_string())
                    })
                    .into_owned();
            }
            (name.clone(), v)
        })
        .collect();

    map_code(&body, |code| {
        if let Some(missing) = VARIABLE_USE
            .captures_iter(code)
            .map(|c| c[1].to_string())
            .find(|name| !resolved.contains_key(name))
        {
            return Err(TransformError::malformed(
                entry,
                format!("undefined variable ${missing}"),
            ));
        }
        Ok(VARIABLE_USE
            .replace_all(code, |c: &regex::Captures<'_>| {
                resolved.get(&c[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    })
}

/// Rewrite the parts of `text` outside `/* */` comments and quoted strings;
/// those are copied through unchanged.
fn map_code<E>(
    text: &str,
    mut rewrite: impl FnMut(&str) -> Result<String, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(text.len());
    let mut code_start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let literal_end = match c {
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut end = text.len();
                while let Some((j, c)) = chars.next() {
                    if c == '*' && matches!(chars.peek(), Some((_, '/'))) {
                        end = j + 2;
                        chars.next();
                        break;
                    }
                }
                end
            }
            '"' | '\'' => {
                let mut end = text.len();
                while let Some((j, d)) = chars.next() {
                    if d == '\\' {
                        chars.next();
                    } else if d == c {
                        end = j + 1;
                        break;
                    }
                }
                end
            }
            _ => continue,
        };
        out.push_str(&rewrite(&text[code_start..i])?);
        out.push_str(&text[i..literal_end]);
        code_start = literal_end;
    }
    out.push_str(&rewrite(&text[code_start..])?);
    Ok(out)
}
