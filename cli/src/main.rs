//! CLI for Vitalscope
//!
//! Reads a health export once per run and reports on it:
//! - history: monthly history of the whole export
//! - stats: key statistics, optionally sampled
//! - dashboard: daily view of a recent window
//! - metric: single-metric analysis
//! - types: record type census

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "vitalscope")]
#[command(about = "Vitalscope - health export analytics", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monthly history of the whole export with charts and insights
    History(commands::history::HistoryArgs),

    /// Key statistics for the whole export
    Stats(commands::stats::StatsArgs),

    /// Daily dashboard over a recent window
    Dashboard(commands::dashboard::DashboardArgs),

    /// Daily analysis of a single metric
    Metric(commands::metric::MetricArgs),

    /// Count the record types present in an export
    Types(commands::types::TypesArgs),
}

impl Commands {
    fn common(&self) -> &commands::CommonArgs {
        match self {
            Self::History(args) => &args.common,
            Self::Stats(args) => &args.common,
            Self::Dashboard(args) => &args.common,
            Self::Metric(args) => &args.common,
            Self::Types(args) => &args.common,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.command.common().verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::History(args) => commands::history::run(args),
        Commands::Stats(args) => commands::stats::run(args),
        Commands::Dashboard(args) => commands::dashboard::run(args),
        Commands::Metric(args) => commands::metric::run(args),
        Commands::Types(args) => commands::types::run(args),
    }
}

fn init_tracing(verbose: bool) {
    subscriber(verbose).init();
}

/// Plain-text logs on stderr, filtered by `RUST_LOG` or the verbosity flag
fn subscriber(verbose: bool) -> impl tracing::Subscriber + Send + Sync {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subscriber_installs_with_text_output() {
        let _guard = tracing::subscriber::set_default(subscriber(false));
        assert!(tracing::enabled!(tracing::Level::ERROR));
    }
}
