// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling each task's `watch` globs into a [`TaskWatchProfile`].
//! - Wiring up a cross-platform filesystem watcher (`notify`) that turns
//!   changes into [`crate::engine::WatchEvent::Changed`].
//! - Content hashing for `use_hash` tasks.
//!
//! It knows nothing about debouncing or rebuilding; that lives in
//! [`crate::engine`].

pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use hash::{HashStore, MemoryHashStore, compute_sources_hash};
pub use patterns::{TaskWatchProfile, build_watch_profiles};
pub use watcher::{WatcherHandle, spawn_watcher};
