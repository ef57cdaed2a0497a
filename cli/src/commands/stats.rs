//! Stats command implementation

use super::{CommonArgs, RunContext};
use crate::output;
use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use vitalscope_aggregator::insights::{HealthSnapshot, Insight, RuleSet};
use vitalscope_aggregator::stats::{KeyStatistics, KeyStatsReport};
use vitalscope_aggregator::IngestOptions;
use vitalscope_shared::types::record::{AccumulationRule, MetricKind};
use vitalscope_shared::utils::group_thousands;

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Keep every Nth record and scale counts to estimate the full export
    #[arg(short, long, default_value = "1")]
    pub sample_every: u64,
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    statistics: &'a KeyStatsReport,
    insights: &'a [Insight],
}

pub fn run(args: StatsArgs) -> Result<()> {
    if args.sample_every == 0 {
        bail!("--sample-every must be at least 1");
    }
    let ctx = RunContext::load(&args.common)?;
    let thresholds = &ctx.settings.thresholds;

    let options = IngestOptions {
        sample_every: args.sample_every,
        ..ctx.ingest_options()
    };
    let mut stats = KeyStatistics::new(thresholds);
    ctx.ingest(options, &mut stats)?;
    let report = stats.scaled(args.sample_every);

    if args.sample_every > 1 {
        output::info(&format!(
            "Sampled 1 in {} records; counts and totals are estimates",
            args.sample_every
        ));
    }

    output::header("KEY HEALTH STATISTICS");
    match (report.first_date, report.last_date, report.span_days) {
        (Some(first), Some(last), Some(days)) => {
            println!("  Data range: {} to {} ({} days)", first, last, group_thousands(days as u64))
        }
        _ => {
            output::warning("No health records found in the export.");
            return Ok(());
        }
    }

    println!(
        "\n  {:<24} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "METRIC", "RECORDS", "MEAN", "MIN", "MAX", "PER DAY"
    );
    for kind in MetricKind::ALL {
        let Some(m) = report.metric(kind) else {
            continue;
        };
        let per_day = match kind.rule() {
            AccumulationRule::Sampled { .. } => "-".to_string(),
            _ => output::value(m.daily_average, 1, ""),
        };
        println!(
            "  {:<24} {:>10} {:>10} {:>10} {:>10} {:>12}",
            format!("{} ({})", kind.label(), kind.unit()),
            group_thousands(m.estimated_count),
            output::value(m.mean, 1, ""),
            output::value(m.min, 1, ""),
            output::value(m.max, 1, ""),
            per_day
        );
    }

    output::header("OXYGEN SATURATION");
    let o2 = &report.oxygen;
    if o2.readings == 0 {
        println!("  no data");
    } else {
        println!(
            "  Readings below {:.0}%: {} ({})",
            thresholds.oxygen_low,
            group_thousands(o2.below_low),
            output::value(o2.below_low_pct, 1, "%")
        );
        if o2.below_critical > 0 {
            output::warning(&format!(
                "{} readings below {:.0}%",
                group_thousands(o2.below_critical),
                thresholds.oxygen_critical
            ));
        }
    }

    output::header("BLOOD PRESSURE");
    let bp = &report.blood_pressure;
    if bp.systolic_readings == 0 && bp.diastolic_readings == 0 {
        println!("  no data");
    } else {
        println!(
            "  Systolic >= {:.0}: {} of {} ({})",
            thresholds.systolic_high,
            group_thousands(bp.systolic_high),
            group_thousands(bp.systolic_readings),
            output::value(bp.systolic_high_pct, 1, "%")
        );
        println!(
            "  Diastolic >= {:.0}: {} of {} ({})",
            thresholds.diastolic_high,
            group_thousands(bp.diastolic_high),
            group_thousands(bp.diastolic_readings),
            output::value(bp.diastolic_high_pct, 1, "%")
        );
    }

    output::header("RECORDS PER YEAR");
    for (year, counts) in &report.per_year {
        let total: u64 = counts.values().sum();
        let parts: Vec<String> = counts
            .iter()
            .map(|(kind, n)| format!("{} {}", kind.slug(), group_thousands(*n)))
            .collect();
        println!("  {}: {:>10}  {}", year, group_thousands(total), parts.join(", "));
    }

    output::header("INSIGHTS");
    let insights = RuleSet::from_thresholds(thresholds).evaluate(&HealthSnapshot::from_key_stats(&report));
    if insights.is_empty() {
        output::info("No threshold observations");
    }
    for insight in &insights {
        output::insight(insight);
    }

    ctx.maybe_write_json(
        &StatsOutput {
            statistics: &report,
            insights: &insights,
        },
        "key_statistics.json",
    )?;

    Ok(())
}
