// src/transform/style/sourcemap.rs

use serde::Serialize;

/// Source map (revision 3) listing the stylesheet's inputs.
///
/// Mappings are left empty: browsers still show the original sources in
/// their inspectors, which is what development builds need.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub source_root: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn new(file: impl Into<String>, sources: Vec<(String, String)>) -> Self {
        let (sources, sources_content) = sources.into_iter().unzip();
        Self {
            version: 3,
            file: file.into(),
            source_root: String::new(),
            sources,
            sources_content,
            names: Vec::new(),
            mappings: String::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Trailer that points a stylesheet at its map.
pub fn mapping_url_comment(map_path: &str) -> String {
    format!("/*# sourceMappingURL={map_path} */\n")
}
