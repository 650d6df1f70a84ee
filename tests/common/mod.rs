#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use sitepipe::config::{BuildConfig, ConfigFile};

pub use sitepipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
pub use sitepipe_test_utils::fake_executor::FakeRebuildExecutor;
pub use sitepipe_test_utils::recording::RecordingTransform;
pub use sitepipe_test_utils::{init_tracing, with_timeout};

/// Write `contents` at `rel` under `root`, creating parent directories.
pub fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

pub fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel))
        .unwrap_or_else(|e| panic!("reading {rel}: {e}"))
}

/// Build settings for a project rooted at `root` with a short debounce.
pub fn build_config(cfg: &ConfigFile, root: &Path) -> BuildConfig {
    let mut build = BuildConfig::from_config(cfg, root);
    build.debounce = Duration::from_millis(20);
    build
}
