use std::fmt;

use serde::Deserialize;

/// Canonical task name type used throughout the pipeline.
pub type TaskName = String;

/// Build mode, fixed for the lifetime of one process invocation.
///
/// - `Development`: readable output, source maps, no `.min` suffixes and
///   passthrough image codecs.
/// - `Production`: minified output with `.min` suffixes and the aggressive
///   codec settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn from_production_flag(production: bool) -> Self {
        if production {
            Mode::Production
        } else {
            Mode::Development
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Mode::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate attached to a declarative stage list.
///
/// Stage lists are filtered once per mode when a transform is constructed,
/// so `apply` never branches on the mode to decide *which* stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModePredicate {
    Always,
    Development,
    Production,
}

impl ModePredicate {
    pub fn admits(self, mode: Mode) -> bool {
        match self {
            ModePredicate::Always => true,
            ModePredicate::Development => mode == Mode::Development,
            ModePredicate::Production => mode == Mode::Production,
        }
    }
}

/// Stage lists pre-filtered for both modes.
#[derive(Debug, Clone)]
pub struct PerMode<T> {
    pub development: T,
    pub production: T,
}

impl<T> PerMode<T> {
    pub fn get(&self, mode: Mode) -> &T {
        match mode {
            Mode::Development => &self.development,
            Mode::Production => &self.production,
        }
    }
}

impl<S: Clone> PerMode<Vec<S>> {
    /// Filter a declarative `(stage, predicate)` list for each mode.
    pub fn filter_stages(stages: &[(S, ModePredicate)]) -> Self {
        let pick = |mode: Mode| {
            stages
                .iter()
                .filter(|(_, when)| when.admits(mode))
                .map(|(stage, _)| stage.clone())
                .collect::<Vec<_>>()
        };
        Self {
            development: pick(Mode::Development),
            production: pick(Mode::Production),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_filter_stage_lists_per_mode() {
        let stages = [
            ("compile", ModePredicate::Always),
            ("minify", ModePredicate::Production),
            ("map", ModePredicate::Development),
        ];
        let per_mode = PerMode::filter_stages(&stages);
        assert_eq!(per_mode.get(Mode::Development), &vec!["compile", "map"]);
        assert_eq!(per_mode.get(Mode::Production), &vec!["compile", "minify"]);
    }
}
