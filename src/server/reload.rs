// src/server/reload.rs

use std::path::{Path, PathBuf};

use axum::response::sse::Event;
use serde::Serialize;

/// What connected browsers should do after a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadSignal {
    /// Full page reload.
    ReloadAll,
    /// Swap these stylesheets in place (paths relative to the site root).
    InjectStyle(Vec<String>),
}

#[derive(Serialize)]
struct StylePayload<'a> {
    paths: &'a [String],
}

impl ReloadSignal {
    /// Pick the signal for a rebuild that wrote `outputs` (relative to the
    /// destination root). Stylesheet-only rebuilds (plus their maps) are
    /// injected; anything else reloads the page. Nothing written, nothing
    /// to do.
    pub fn for_outputs(outputs: &[PathBuf]) -> Option<Self> {
        if outputs.is_empty() {
            return None;
        }
        let styles_only = outputs.iter().all(|p| has_ext(p, "css") || has_ext(p, "map"));
        if !styles_only {
            return Some(ReloadSignal::ReloadAll);
        }
        let css: Vec<String> = outputs
            .iter()
            .filter(|p| has_ext(p, "css"))
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        if css.is_empty() {
            None
        } else {
            Some(ReloadSignal::InjectStyle(css))
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ReloadSignal::ReloadAll => "reload",
            ReloadSignal::InjectStyle(_) => "css",
        }
    }

    pub fn to_event(&self) -> Event {
        let data = match self {
            ReloadSignal::ReloadAll => "{}".to_string(),
            ReloadSignal::InjectStyle(paths) => {
                serde_json::to_string(&StylePayload { paths }).unwrap_or_else(|_| "{\"paths\":[]}".to_string())
            }
        };
        Event::default().event(self.event_name()).data(data)
    }
}

fn has_ext(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
