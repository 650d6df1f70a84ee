// src/exec/mod.rs

//! Running work outside the pure core.
//!
//! - [`tool`]: external codec / compiler invocations.
//! - [`backend`]: how the watch runtime starts task rebuilds.

pub mod backend;
pub mod tool;

pub use backend::{RealRebuildExecutor, RebuildExecutor};
pub use tool::ToolCommand;
