//! Report output
//!
//! Charts (SVG), summary tables (CSV) and JSON exports written to the
//! configured output directory.

pub mod chart;
pub mod json;
pub mod table;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Create the output directory if needed and return the path of `file_name` in it
pub fn prepare_output(dir: &Path, file_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    Ok(dir.join(file_name))
}
