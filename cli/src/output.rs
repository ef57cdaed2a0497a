//! Output formatting utilities for CLI commands

use colored::Colorize;
use vitalscope_aggregator::insights::{Insight, Severity};
use vitalscope_aggregator::IngestStats;
use vitalscope_shared::utils::group_thousands;

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a section header
pub fn header(title: &str) {
    println!("\n{}", format!("=== {} ===", title).bold());
}

/// Format an optional value; missing values read "no data"
pub fn value(v: Option<f64>, precision: usize, unit: &str) -> String {
    match v {
        Some(v) if unit.is_empty() => format!("{:.*}", precision, v),
        Some(v) => format!("{:.*} {}", precision, v, unit),
        None => "no data".to_string(),
    }
}

/// Format a signed change with an optional percentage
pub fn change(delta: f64, delta_pct: Option<f64>, unit: &str) -> String {
    match delta_pct {
        Some(pct) => format!("{:+.1} {} ({:+.1}%)", delta, unit, pct),
        None => format!("{:+.1} {}", delta, unit),
    }
}

/// Print a fired insight with a severity marker
pub fn insight(insight: &Insight) {
    match insight.severity {
        Severity::Good => success(&insight.message),
        Severity::Info => info(&insight.message),
        Severity::Warning => warning(&insight.message),
        Severity::Critical => println!("{} {}", "‼".red().bold(), insight.message),
    }
}

/// Print ingestion counters
pub fn ingest_summary(stats: &IngestStats) {
    info(&format!(
        "Processed {} records ({} used)",
        group_thousands(stats.processed),
        group_thousands(stats.accepted)
    ));
    let skipped = stats.skipped_total();
    if skipped > 0 {
        let reasons: Vec<String> = stats
            .skipped
            .iter()
            .map(|(reason, n)| format!("{} {}", group_thousands(*n), reason))
            .collect();
        warning(&format!(
            "Skipped {} malformed records: {}",
            group_thousands(skipped),
            reasons.join(", ")
        ));
    }
}
