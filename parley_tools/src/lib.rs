#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

pub mod bash;
pub mod command_runner;
pub mod current_time;
pub mod read_file;

pub use bash::BashTool;
pub use current_time::CurrentTimeTool;
pub use read_file::ReadFileTool;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parley_core::ToolRegistry;

/// Registry with every built-in tool, rooted at `working_dir`.
#[must_use]
pub fn default_tools(working_dir: &Path) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(ReadFileTool::new(working_dir)))
        .with_tool(Arc::new(BashTool::new(working_dir)))
        .with_tool(Arc::new(CurrentTimeTool))
}

/// Absolute paths are kept; relative ones are joined onto `working_dir`.
#[must_use]
pub fn resolve_tool_path(working_dir: &Path, path: &str) -> PathBuf {
    let candidate = PathBuf::from(path);
    if candidate.is_absolute() {
        candidate
    } else {
        working_dir.join(candidate)
    }
}
