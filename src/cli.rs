// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::Mode;

/// Command-line arguments for `sitepipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitepipe",
    version,
    about = "Build static-site assets, then serve and rebuild them on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Task graph to run.
    #[arg(value_enum, default_value = "develop")]
    pub graph: GraphSelector,

    /// Build in production mode (minified, suffixed, compressed).
    #[arg(long)]
    pub production: bool,

    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Sitepipe.toml")]
    pub config: String,

    /// Override the dev server port from `[server]`.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task graph, but don't build anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn mode(&self) -> Mode {
        Mode::from_production_flag(self.production)
    }
}

/// Which of the two standard graphs to run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum GraphSelector {
    /// Build, then serve the destination and rebuild on change.
    #[value(alias = "default", alias = "build")]
    Develop,
    /// Build once and exit.
    #[value(alias = "prod")]
    Release,
}

impl GraphSelector {
    pub fn graph_name(self) -> &'static str {
        match self {
            GraphSelector::Develop => "develop",
            GraphSelector::Release => "release",
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
