// src/config/mod.rs

//! Configuration loading and validation for sitepipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and derive the immutable [`BuildConfig`]
//!   (`loader.rs`).
//! - Validate paths and graph references (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{BuildConfig, config_root_dir, load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, GraphConfig, RawConfigFile, ServerSection, TaskConfig};
