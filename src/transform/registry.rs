// src/transform/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::Transform;
use super::{altformat, clean, command, copy, icons, image, script, style, template};

/// Builds a transform from a task's `options` table.
///
/// Returns a human-readable reason on invalid options; the caller attaches
/// the task name.
pub type TransformFactory = fn(&toml::Table) -> Result<Arc<dyn Transform>, String>;

/// Name → factory lookup used when building task graphs.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    factories: BTreeMap<String, TransformFactory>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl TransformRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in transform.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(clean::NAME, clean::factory);
        reg.register(copy::NAME, copy::factory);
        reg.register(template::NAME, template::factory);
        reg.register(style::NAME, style::factory);
        reg.register(image::NAME, image::factory);
        reg.register(altformat::NAME, altformat::factory);
        reg.register(icons::NAME, icons::factory);
        reg.register(script::NAME, script::factory);
        reg.register(command::NAME, command::factory);
        reg
    }

    /// Register (or replace) a factory.
    pub fn register(&mut self, name: impl Into<String>, factory: TransformFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate `name` with `options`.
    ///
    /// `None` if nothing is registered under `name`.
    pub fn create(
        &self,
        name: &str,
        options: &toml::Table,
    ) -> Option<Result<Arc<dyn Transform>, String>> {
        self.factories.get(name).map(|factory| factory(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let reg = TransformRegistry::with_builtins();
        for name in [
            "clean",
            "copy",
            "template",
            "style",
            "image",
            "alt-format",
            "icons",
            "script",
            "command",
        ] {
            assert!(reg.contains(name), "missing built-in {name}");
        }
        assert!(reg.create("sprite", &toml::Table::new()).is_none());
    }

    #[test]
    fn bad_options_are_rejected_by_the_factory() {
        let reg = TransformRegistry::with_builtins();
        let mut options = toml::Table::new();
        options.insert("no_such_option".into(), toml::Value::Boolean(true));
        let res = reg.create("copy", &options).unwrap();
        assert!(res.is_err());
    }
}
