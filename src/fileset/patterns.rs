// src/fileset/patterns.rs

//! Glob helpers shared by file-set resolution and the watcher.

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::errors::FileSetError;

/// Strip a leading `./` (gulp-style patterns) and normalise separators.
pub fn normalize_pattern(pat: &str) -> String {
    let pat = pat.trim().replace('\\', "/");
    pat.trim_start_matches("./").to_string()
}

/// Whether a pattern contains glob syntax.
pub fn has_glob_meta(pat: &str) -> bool {
    pat.contains(['*', '?', '[', '{'])
}

/// Literal directory prefix of a pattern.
///
/// `src/img/**/*.png` → `src/img`; a literal file `src/a.css` → `src`.
pub fn glob_base(pat: &str) -> String {
    let parts: Vec<&str> = pat.split('/').collect();
    let literal = parts.iter().take_while(|p| !has_glob_meta(p)).count();
    // The last component is the file name (or a glob) and never part of the base.
    let keep = literal.min(parts.len().saturating_sub(1));
    parts[..keep].join("/")
}

/// Compile one pattern; `*` does not cross `/`, `**` does.
pub fn compile_glob(pat: &str) -> Result<GlobMatcher, FileSetError> {
    GlobBuilder::new(pat)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| FileSetError::InvalidPattern {
            pattern: pat.to_string(),
            reason: e.to_string(),
        })
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet, FileSetError> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .map_err(|e| FileSetError::InvalidPattern {
                pattern: pat.clone(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| FileSetError::InvalidPattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_stops_at_first_glob_component() {
        assert_eq!(glob_base("src/img/**/*.png"), "src/img");
        assert_eq!(glob_base("src/styles/main.scss"), "src/styles");
        assert_eq!(glob_base("*.png"), "");
        assert_eq!(glob_base("a.png"), "");
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let m = compile_glob("src/img/svg/*.svg").unwrap();
        assert!(m.is_match("src/img/svg/logo.svg"));
        assert!(!m.is_match("src/img/svg/sub/logo.svg"));

        let deep = compile_glob("src/**/*.js").unwrap();
        assert!(deep.is_match("src/js/vendor/a.js"));
        assert!(deep.is_match("src/a.js"));
    }

    #[test]
    fn dot_prefix_is_stripped() {
        assert_eq!(normalize_pattern("./src/js/main.js"), "src/js/main.js");
    }
}
