// src/logging.rs

//! `tracing` subscriber for the binary.
//!
//! The filter comes from, in order: `--log-level`, the `SITEPIPE_LOG`
//! environment variable (full `EnvFilter` directive syntax, e.g.
//! `sitepipe=debug,tower_http=trace`), or `info`. Output goes to stderr;
//! stdout is reserved for `--dry-run`.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "SITEPIPE_LOG";

/// HTTP and watcher internals are noisy below `warn`.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "notify=warn", "tower_http=warn"];

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("logging already initialised: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let base = match (cli_level, env.map(str::trim).filter(|s| !s.is_empty())) {
        (Some(level), _) => level.directive().to_string(),
        (None, Some(directives)) => directives.to_string(),
        (None, None) => LogLevel::Info.directive().to_string(),
    };

    let mut filter =
        EnvFilter::try_new(&base).map_err(|e| anyhow!("invalid {LOG_ENV} value {base:?}: {e}"))?;
    // Explicit directives for a dependency win over the defaults below.
    for quiet in QUIET_DEPENDENCIES {
        let target = quiet.split('=').next().unwrap_or_default();
        if !base.contains(target) {
            filter = filter.add_directive(quiet.parse()?);
        }
    }
    Ok(filter)
}
