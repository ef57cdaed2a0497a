//! History command implementation

use super::{written, CommonArgs, RunContext};
use crate::output;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use vitalscope_aggregator::insights::{history_insights, HistoryInsights};
use vitalscope_aggregator::output::chart::{self, Panel};
use vitalscope_aggregator::output::table;
use vitalscope_aggregator::{yearly_rollup, DailySeries, PeriodAggregator, YearlyAverage};
use vitalscope_shared::types::record::MetricKind;
use vitalscope_shared::types::summary::{Granularity, SummaryRow};
use vitalscope_shared::types::trend::TrendDirection;
use vitalscope_shared::utils::{group_thousands, time};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Serialize)]
struct HistoryReport<'a> {
    months: &'a [SummaryRow],
    yearly: &'a [YearlyAverage],
    insights: &'a HistoryInsights,
}

pub fn run(args: HistoryArgs) -> Result<()> {
    let ctx = RunContext::load(&args.common)?;
    let thresholds = &ctx.settings.thresholds;

    let mut monthly = PeriodAggregator::new(Granularity::Month);
    ctx.ingest(ctx.ingest_options(), &mut monthly)?;
    let rows = monthly.finish();

    if rows.is_empty() {
        output::warning("No health records found in the export.");
        return Ok(());
    }

    output::header("HEALTH HISTORY");
    println!("  {}", coverage_line(&rows));

    let insights = history_insights(&rows, thresholds);
    print_long_term(&insights);
    print_milestones(&insights);
    print_concerns(&insights);

    let yearly = yearly_rollup(&rows);
    print_yearly(&yearly);

    output::header("RECOMMENDATIONS");
    if insights.recommendations.is_empty() {
        output::success("No concerns in the most recent months");
    }
    for insight in &insights.recommendations {
        output::insight(insight);
    }

    let csv = ctx.output_path("monthly_health_summary.csv")?;
    table::write_summary_csv(&rows, &csv)?;
    written(&csv);

    let svg = ctx.output_path("health_history.svg")?;
    chart::render_panels("Complete Health History", &history_panels(&rows, thresholds), &svg)?;
    written(&svg);

    ctx.maybe_write_json(
        &HistoryReport {
            months: &rows,
            yearly: &yearly,
            insights: &insights,
        },
        "health_history.json",
    )?;

    Ok(())
}

fn print_long_term(insights: &HistoryInsights) {
    output::header("LONG-TERM TRENDS (first 12 vs last 12 months)");
    if insights.long_term.is_empty() {
        output::info("Not enough history for a long-term comparison (needs more than 12 months)");
        return;
    }
    for trend in &insights.long_term {
        let arrow = match trend.direction {
            TrendDirection::Rising => "↑",
            TrendDirection::Falling => "↓",
            TrendDirection::Stable => "→",
        };
        println!(
            "  {:<24} {:>10.1} → {:<10.1} {} {}",
            trend.kind.label(),
            trend.comparison.baseline,
            trend.comparison.comparison,
            arrow,
            output::change(trend.comparison.delta, trend.comparison.delta_pct, trend.kind.unit())
        );
    }
}

fn print_milestones(insights: &HistoryInsights) {
    output::header("MILESTONES");
    let m = &insights.milestones;
    let rows = [
        ("Lowest resting HR", m.lowest_resting_hr, "BPM"),
        ("Highest HRV", m.highest_hrv, "ms"),
        ("Most active month", m.most_active, "steps/day"),
    ];
    for (label, milestone, unit) in rows {
        match milestone {
            Some(m) => println!("  {:<20} {} ({:.1} {})", label, m.period, m.value, unit),
            None => println!("  {:<20} no data", label),
        }
    }
}

fn print_concerns(insights: &HistoryInsights) {
    output::header("AREAS OF CONCERN");
    let c = &insights.concerns;
    if c.low_oxygen.is_empty() && c.short_sleep.is_empty() {
        output::success("No months with critically low oxygen or very short sleep");
        return;
    }
    if !c.low_oxygen.is_empty() {
        output::warning(&format!("{} months with oxygen readings below the critical level", c.low_oxygen.len()));
        for m in &c.low_oxygen {
            println!("    {}: min {:.1}%", m.period, m.value);
        }
    }
    if !c.short_sleep.is_empty() {
        output::warning(&format!("{} months averaging very short sleep", c.short_sleep.len()));
        for m in &c.short_sleep {
            println!("    {}: {:.1} hours/night", m.period, m.value);
        }
    }
}

fn print_yearly(yearly: &[YearlyAverage]) {
    output::header("YEARLY AVERAGES");
    println!(
        "  {:>6} {:>8} {:>8} {:>8} {:>10} {:>8}",
        "YEAR", "RHR", "HRV", "O2 %", "STEPS/DAY", "SLEEP"
    );
    for year in yearly {
        let cell = |kind: MetricKind, precision: usize| {
            year.get(kind)
                .map(|v| format!("{:.*}", precision, v))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "  {:>6} {:>8} {:>8} {:>8} {:>10} {:>8}",
            year.year,
            cell(MetricKind::RestingHeartRate, 1),
            cell(MetricKind::HeartRateVariability, 1),
            cell(MetricKind::OxygenSaturation, 1),
            cell(MetricKind::Steps, 0),
            cell(MetricKind::Sleep, 1),
        );
    }
}

/// Calendar span of the history and how many of its months carry data
fn coverage_line(rows: &[SummaryRow]) -> String {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return "Period: none".to_string();
    };
    let total_records: u64 = rows.iter().map(|r| r.record_count).sum();
    format!(
        "Period: {} to {} ({} months, {} with data, {} records)",
        first.period,
        last.period,
        time::months_spanned(first.period.start(), last.period.start()),
        rows.len(),
        group_thousands(total_records)
    )
}

fn history_panels(rows: &[SummaryRow], t: &vitalscope_aggregator::Thresholds) -> Vec<Panel> {
    let mean = |kind| DailySeries::from_rows_with(rows, |r| r.mean(kind));
    let min = |kind| DailySeries::from_rows_with(rows, |r| r.min(kind));
    let per_day = |kind| DailySeries::from_rows_with(rows, |r| r.daily_average(kind));

    vec![
        Panel::new("Resting Heart Rate", "BPM")
            .line("Monthly mean", &mean(MetricKind::RestingHeartRate), chart::RED)
            .reference(t.resting_hr_excellent, "Excellent", chart::GREEN)
            .reference(t.resting_hr_elevated, "Elevated", chart::ORANGE),
        Panel::new("Heart Rate Variability", "ms")
            .line("Monthly mean", &mean(MetricKind::HeartRateVariability), chart::PURPLE)
            .reference(t.hrv_normal_min, "Healthy", chart::GREEN),
        Panel::new("Oxygen Saturation", "%")
            .line("Monthly mean", &mean(MetricKind::OxygenSaturation), chart::BLUE)
            .dots("Monthly min", &min(MetricKind::OxygenSaturation), chart::ORANGE)
            .reference(t.oxygen_low, "Normal", chart::GREEN)
            .reference(t.oxygen_critical, "Critical", chart::RED),
        Panel::new("Daily Steps", "steps")
            .bars("Average per day", &per_day(MetricKind::Steps), chart::GREEN)
            .reference(t.steps_target, "Target", chart::BLUE),
        Panel::new("Sleep", "hours")
            .line("Average per night", &per_day(MetricKind::Sleep), chart::PURPLE)
            .reference(t.sleep_minimum, "Minimum", chart::ORANGE)
            .reference(t.sleep_recommended, "Recommended", chart::GREEN),
        Panel::new("Active Energy", "kcal")
            .bars("Average per day", &per_day(MetricKind::ActiveEnergy), chart::ORANGE)
            .reference(t.calories_target, "Target", chart::BLUE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use vitalscope_shared::types::summary::PeriodKey;

    fn month_row(year: i32, month: u32, records: u64) -> SummaryRow {
        let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
        let mut row = SummaryRow::new(PeriodKey::containing(start, Granularity::Month));
        row.record_count = records;
        row
    }

    #[test]
    fn test_coverage_line_counts_calendar_months() {
        let mut rows: Vec<SummaryRow> = (1..=5).map(|m| month_row(2019, m, 100)).collect();
        rows.push(month_row(2024, 6, 2_500));

        assert_eq!(
            coverage_line(&rows),
            "Period: 2019-01 to 2024-06 (66 months, 6 with data, 3,000 records)"
        );
    }
}
