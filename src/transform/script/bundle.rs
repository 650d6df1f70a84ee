// src/transform/script/bundle.rs

//! CommonJS bundler.
//!
//! Starting from an entry file, `require("...")` calls are followed to build
//! a module graph. Relative specifiers resolve against the requiring module;
//! bare ones (`require("jquery")`) through the nearest `node_modules`
//! directory and the package's `main`. Each module gets a numeric id (the
//! entry is 0, the rest in depth-first discovery order) and is wrapped in a
//! function; `require` calls are rewritten to ids. A specifier that resolves
//! to no file fails the bundle.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use regex::{Captures, Regex};
use tracing::warn;

use crate::errors::TransformError;
use crate::fs::FileSystem;

static REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\(\s*(?:"([^"]+)"|'([^']+)')\s*\)"#).expect("valid regex")
});

#[derive(Debug, Clone)]
pub struct Module {
    pub path: PathBuf,
    /// Path relative to the entry's directory, for banners.
    pub display: String,
    pub source: String,
}

/// Modules reachable from one entry, in id order.
#[derive(Debug)]
pub struct ModuleGraph {
    graph: DiGraph<Module, ()>,
    order: Vec<NodeIndex>,
    /// `(module index, specifier)` → target index.
    edges: HashMap<(NodeIndex, String), NodeIndex>,
}

impl ModuleGraph {
    pub fn build(fs: &dyn FileSystem, entry: &Path) -> Result<Self, TransformError> {
        let base = entry.parent().unwrap_or(Path::new("")).to_path_buf();
        let mut graph: DiGraph<Module, ()> = DiGraph::new();
        let mut by_path: HashMap<PathBuf, NodeIndex> = HashMap::new();
        let mut edges = HashMap::new();

        let entry_idx = graph.add_node(load(fs, entry, &base)?);
        by_path.insert(entry.to_path_buf(), entry_idx);

        let mut pending = vec![entry_idx];
        while let Some(idx) = pending.pop() {
            let module_path = graph[idx].path.clone();
            let dir = module_path.parent().unwrap_or(Path::new("")).to_path_buf();
            let specifiers: Vec<String> = REQUIRE
                .captures_iter(&graph[idx].source)
                .filter_map(|c| c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_string()))
                .collect();

            for spec in specifiers {
                let target = resolve(fs, &dir, &spec).ok_or_else(|| {
                    TransformError::malformed(&module_path, format!("cannot resolve require(\"{spec}\")"))
                })?;
                let target_idx = match by_path.get(&target) {
                    Some(existing) => *existing,
                    None => {
                        let new_idx = graph.add_node(load(fs, &target, &base)?);
                        by_path.insert(target, new_idx);
                        pending.push(new_idx);
                        new_idx
                    }
                };
                graph.update_edge(idx, target_idx, ());
                edges.insert((idx, spec), target_idx);
            }
        }

        if is_cyclic_directed(&graph) {
            warn!(entry = %entry.display(), "circular require detected; modules see partial exports");
        }

        let mut order = Vec::with_capacity(graph.node_count());
        let mut dfs = Dfs::new(&graph, entry_idx);
        while let Some(idx) = dfs.next(&graph) {
            order.push(idx);
        }

        Ok(Self { graph, order, edges })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.order.iter().map(|idx| &self.graph[*idx])
    }

    /// Emit the bundle. `banners` adds a path comment before each module.
    pub fn render(&self, banners: bool) -> String {
        let ids: HashMap<NodeIndex, usize> =
            self.order.iter().enumerate().map(|(id, idx)| (*idx, id)).collect();

        let mut out = String::from(PRELUDE);
        for (id, idx) in self.order.iter().enumerate() {
            let module = &self.graph[*idx];
            let body = REQUIRE.replace_all(&module.source, |c: &Captures<'_>| {
                let spec = c.get(1).or_else(|| c.get(2)).map_or("", |m| m.as_str());
                match self.edges.get(&(*idx, spec.to_string())).and_then(|t| ids.get(t)) {
                    Some(target) => format!("require({target})"),
                    None => c[0].to_string(),
                }
            });

            if banners {
                out.push_str(&format!("/* {} */\n", module.display));
            }
            out.push_str(&format!("{id}: function (module, exports, require) {{\n"));
            out.push_str(body.trim_end());
            out.push_str("\n},\n");
        }
        out.push_str("});\n");
        out
    }
}

const PRELUDE: &str = "(function (modules) {
  var cache = {};
  function load(id) {
    if (cache[id]) return cache[id].exports;
    var module = (cache[id] = { exports: {} });
    modules[id].call(module.exports, module, module.exports, load);
    return module.exports;
  }
  load(0);
})({
";

fn load(fs: &dyn FileSystem, path: &Path, base: &Path) -> Result<Module, TransformError> {
    let source = fs
        .read_to_string(path)
        .map_err(|e| TransformError::read(path, e))?;
    let display = match path.strip_prefix(base) {
        Ok(rel) => format!("./{}", slashed(rel)),
        Err(_) => package_display(path).unwrap_or_else(|| slashed(path)),
    };
    Ok(Module {
        path: path.to_path_buf(),
        display,
        source,
    })
}

fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// `node_modules/jquery/dist/jquery.js` for a module outside the entry's tree.
fn package_display(path: &Path) -> Option<String> {
    let comps: Vec<_> = path.components().collect();
    let at = comps.iter().rposition(|c| c.as_os_str() == "node_modules")?;
    let rel: PathBuf = comps[at..].iter().collect();
    Some(slashed(&rel))
}

fn resolve(fs: &dyn FileSystem, dir: &Path, spec: &str) -> Option<PathBuf> {
    if spec.starts_with("./") || spec.starts_with("../") || spec.starts_with('/') {
        resolve_file(fs, &normalize(&dir.join(spec)))
    } else {
        resolve_package(fs, dir, spec)
    }
}

/// Node lookup order for a file specifier: as-is, `.js`, `/index.js`.
fn resolve_file(fs: &dyn FileSystem, joined: &Path) -> Option<PathBuf> {
    let candidates = [
        joined.to_path_buf(),
        PathBuf::from(format!("{}.js", joined.display())),
        joined.join("index.js"),
    ];
    candidates.into_iter().find(|c| fs.is_file(c))
}

/// `name` or `name/sub/path` in the nearest `node_modules` above `dir`.
fn resolve_package(fs: &dyn FileSystem, dir: &Path, spec: &str) -> Option<PathBuf> {
    let (name, subpath) = split_package(spec);
    for ancestor in dir.ancestors() {
        let package = ancestor.join("node_modules").join(name);
        if !fs.is_dir(&package) {
            continue;
        }
        if let Some(sub) = subpath {
            return resolve_file(fs, &normalize(&package.join(sub)));
        }
        let main = package_main(fs, &package).unwrap_or_else(|| "index.js".to_string());
        return resolve_file(fs, &normalize(&package.join(main)))
            .or_else(|| resolve_file(fs, &package.join("index.js")));
    }
    None
}

/// Scoped packages keep two segments: `@scope/name/sub` → (`@scope/name`, `sub`).
fn split_package(spec: &str) -> (&str, Option<&str>) {
    let name_segments = if spec.starts_with('@') { 2 } else { 1 };
    let mut end = 0;
    for (seen, (idx, _)) in spec.match_indices('/').enumerate() {
        if seen + 1 == name_segments {
            end = idx;
            break;
        }
    }
    if end == 0 {
        (spec, None)
    } else {
        (&spec[..end], Some(&spec[end + 1..]))
    }
}

fn package_main(fs: &dyn FileSystem, package: &Path) -> Option<String> {
    let manifest = fs.read_to_string(&package.join("package.json")).ok()?;
    let value: serde_json::Value = serde_json::from_str(&manifest).ok()?;
    value
        .get("main")
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn project() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/s/js/main.js",
            b"var nav = require('./nav');\nvar util = require(\"./lib/util\");\nnav.init(util);\n".to_vec(),
        );
        fs.add_file("/s/js/nav.js", b"var util = require('./lib/util.js');\nexports.init = function () {};\n".to_vec());
        fs.add_file("/s/js/lib/util/index.js", b"module.exports = {};\n".to_vec());
        fs.add_file("/s/js/lib/util.js", b"module.exports = { n: 1 };\n".to_vec());
        fs
    }

    #[test]
    fn discovers_modules_once_in_dfs_order() {
        let fs = project();
        let graph = ModuleGraph::build(&fs, Path::new("/s/js/main.js")).unwrap();
        let names: Vec<_> = graph.modules().map(|m| m.display.as_str()).collect();
        assert_eq!(names[0], "./main.js");
        assert_eq!(graph.len(), 3);
        assert!(names.contains(&"./nav.js"));
        assert!(names.contains(&"./lib/util.js"));
    }

    #[test]
    fn requires_are_rewritten_to_ids() {
        let fs = project();
        let graph = ModuleGraph::build(&fs, Path::new("/s/js/main.js")).unwrap();
        let bundle = graph.render(true);
        assert!(bundle.starts_with("(function (modules) {"));
        assert!(bundle.contains("/* ./main.js */\n0: function (module, exports, require) {"));
        assert!(!bundle.contains("require('./nav')"));
        assert!(!bundle.contains("require(\"./lib/util\")"));
        assert!(bundle.contains("require(1)") || bundle.contains("require(2)"));
        assert!(bundle.ends_with("});\n"));
    }

    #[test]
    fn packages_resolve_through_node_modules_main() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/js/main.js", b"var $ = require('jquery');\n$('.nav');\n".to_vec());
        fs.add_file(
            "/s/node_modules/jquery/package.json",
            br#"{ "name": "jquery", "main": "dist/jquery" }"#.to_vec(),
        );
        fs.add_file("/s/node_modules/jquery/dist/jquery.js", b"module.exports = function () {};\n".to_vec());

        let graph = ModuleGraph::build(&fs, Path::new("/s/js/main.js")).unwrap();
        let names: Vec<_> = graph.modules().map(|m| m.display.as_str()).collect();
        assert_eq!(names, vec!["./main.js", "node_modules/jquery/dist/jquery.js"]);

        let bundle = graph.render(true);
        assert!(bundle.contains("var $ = require(1);"));
        assert!(!bundle.contains("require('jquery')"));
    }

    #[test]
    fn package_without_manifest_falls_back_to_index() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/a.js", b"require('tiny'); require('@scope/kit/extra');".to_vec());
        fs.add_file("/s/node_modules/tiny/index.js", b"module.exports = 1;".to_vec());
        fs.add_file("/s/node_modules/@scope/kit/extra.js", b"module.exports = 2;".to_vec());
        let graph = ModuleGraph::build(&fs, Path::new("/s/a.js")).unwrap();
        assert_eq!(graph.len(), 3);
        let bundle = graph.render(false);
        assert!(bundle.contains("require(1)") && bundle.contains("require(2)"));
        assert!(!bundle.contains("require('tiny')"));
    }

    #[test]
    fn unresolved_package_is_malformed() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/a.js", b"var fs = require('fs');".to_vec());
        let err = ModuleGraph::build(&fs, Path::new("/s/a.js")).unwrap_err();
        assert!(matches!(err, TransformError::MalformedInput { reason, .. } if reason.contains("require(\"fs\")")));
    }

    #[test]
    fn unresolved_relative_require_is_malformed() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/a.js", b"require('./missing');".to_vec());
        let err = ModuleGraph::build(&fs, Path::new("/s/a.js")).unwrap_err();
        assert!(err.to_string().contains("./missing"));
    }

    #[test]
    fn cycles_are_bundled() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/a.js", b"require('./b');".to_vec());
        fs.add_file("/s/b.js", b"require('./a');".to_vec());
        let graph = ModuleGraph::build(&fs, Path::new("/s/a.js")).unwrap();
        assert_eq!(graph.len(), 2);
        let bundle = graph.render(false);
        assert!(bundle.contains("0: function (module, exports, require) {\nrequire(1);"));
        assert!(bundle.contains("1: function (module, exports, require) {\nrequire(0);"));
    }
}
