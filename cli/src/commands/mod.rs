//! Subcommands and the setup they share

pub mod dashboard;
pub mod history;
pub mod metric;
pub mod stats;
pub mod types;

use crate::output;
use anyhow::{bail, Context as _, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use vitalscope_aggregator::output::{json, prepare_output};
use vitalscope_aggregator::{IngestOptions, IngestStats, Ingestor, RecordSink, Settings};
use vitalscope_shared::utils::group_thousands;

/// Flags accepted by every subcommand
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Health export XML file (defaults to input.default_file from the settings)
    pub input: Option<PathBuf>,

    /// Settings file (defaults to ./vitalscope.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for charts and tables
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Also write the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Resolved settings, input and output locations for one run
pub struct RunContext {
    pub settings: Settings,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub json: bool,
}

impl RunContext {
    pub fn load(args: &CommonArgs) -> Result<Self> {
        let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;

        let input = args
            .input
            .clone()
            .unwrap_or_else(|| settings.input.default_file.clone());
        if !input.is_file() {
            bail!(
                "Input file not found: {}\n\nUsage: vitalscope <COMMAND> [INPUT]\n  Pass the path of a health export (export.xml), or set input.default_file in {}",
                input.display(),
                vitalscope_aggregator::config::DEFAULT_CONFIG_FILE
            );
        }

        let output_dir = args
            .output_dir
            .clone()
            .unwrap_or_else(|| settings.report.output_dir.clone());

        debug!("Input: {}, output: {}", input.display(), output_dir.display());
        Ok(Self {
            settings,
            input,
            output_dir,
            json: args.json,
        })
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            progress_every: self.settings.ingest.progress_every,
            sleep_ceiling_hours: self.settings.ingest.sleep_ceiling_hours,
            ..Default::default()
        }
    }

    /// Stream the export into `sink`, showing a spinner on stderr
    pub fn ingest<S: RecordSink + ?Sized>(
        &self,
        options: IngestOptions,
        sink: &mut S,
    ) -> Result<IngestStats> {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Parsing {}", self.input.display()));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let result = {
            let mut ingestor = Ingestor::new(options).on_progress(|n| {
                spinner.set_message(format!("Processed {} records", group_thousands(n)))
            });
            ingestor.ingest_path(&self.input, sink)
        };
        spinner.finish_and_clear();

        let stats = result.with_context(|| format!("Failed to read {}", self.input.display()))?;
        output::ingest_summary(&stats);
        Ok(stats)
    }

    pub fn output_path(&self, file_name: &str) -> Result<PathBuf> {
        prepare_output(&self.output_dir, file_name)
    }

    /// Write `report` as JSON when requested
    pub fn maybe_write_json<T: Serialize>(&self, report: &T, file_name: &str) -> Result<()> {
        if !self.json {
            return Ok(());
        }
        let path = self.output_path(file_name)?;
        json::write_json(report, &path)?;
        written(&path);
        Ok(())
    }
}

pub fn written(path: &Path) {
    output::success(&format!("Saved {}", path.display()));
}
