//! JSON output
//!
//! Exports summaries and reports in JSON format for further analysis

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Write any serializable report as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<()> {
    info!("Generating JSON output: {}", output_path.display());

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, value).context("Failed to serialize report to JSON")?;

    info!("JSON output written to {}", output_path.display());

    Ok(())
}
