//! Metric command implementation

use super::{written, CommonArgs, RunContext};
use crate::output;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use vitalscope_aggregator::blood_pressure::{
    BloodPressurePairer, BloodPressureReport, BpCategory, BpReading,
};
use vitalscope_aggregator::output::chart::{self, Panel, RGBColor};
use vitalscope_aggregator::output::table;
use vitalscope_aggregator::{DailySeries, IngestOptions, PeriodAggregator, Thresholds};
use vitalscope_shared::types::record::{AccumulationRule, MetricKind};
use vitalscope_shared::types::summary::Granularity;
use vitalscope_shared::types::trend::{TrendComparison, TrendDirection};
use vitalscope_shared::utils::{group_thousands, parse_lookback, time};

#[derive(Args, Debug)]
pub struct MetricArgs {
    /// Metric to analyze (resting-hr, heart-rate, hrv, oxygen, sleep, energy,
    /// steps, systolic, diastolic, blood-pressure)
    pub metric: String,

    #[command(flatten)]
    pub common: CommonArgs,

    /// Only use records from this window ending today (e.g. 90d, 6m, 1y)
    #[arg(short, long)]
    pub lookback: Option<String>,
}

/// What the command analyzes
enum Target {
    Single(MetricKind),
    BloodPressure,
}

fn parse_target(s: &str) -> Result<Target> {
    match s.to_lowercase().as_str() {
        "blood-pressure" | "bp" => Ok(Target::BloodPressure),
        _ => Ok(Target::Single(s.parse()?)),
    }
}

#[derive(Serialize)]
struct MetricReport<'a> {
    metric: MetricKind,
    since: Option<NaiveDate>,
    summary: &'a SeriesSummary,
    daily: &'a DailySeries,
    observations: &'a [String],
}

#[derive(Debug, Serialize)]
struct SeriesSummary {
    days: usize,
    first_date: Option<NaiveDate>,
    last_date: Option<NaiveDate>,
    mean: Option<f64>,
    std_dev: Option<f64>,
    lowest: Option<(NaiveDate, f64)>,
    highest: Option<(NaiveDate, f64)>,
    trend: Option<TrendComparison>,
    direction: Option<TrendDirection>,
    recent_window_days: u32,
    recent: Option<TrendComparison>,
}

pub fn run(args: MetricArgs) -> Result<()> {
    let target = parse_target(&args.metric)?;
    let ctx = RunContext::load(&args.common)?;

    let since = match &args.lookback {
        Some(s) => {
            let days = parse_lookback(s)?;
            Some(time::window_start(time::today(), days)?)
        }
        None => None,
    };
    let options = IngestOptions {
        since,
        ..ctx.ingest_options()
    };

    match target {
        Target::Single(kind) => analyze_metric(&ctx, options, kind),
        Target::BloodPressure => analyze_blood_pressure(&ctx, options),
    }
}

fn analyze_metric(ctx: &RunContext, options: IngestOptions, kind: MetricKind) -> Result<()> {
    let report_settings = &ctx.settings.report;
    let thresholds = &ctx.settings.thresholds;
    let since = options.since;

    let mut daily = PeriodAggregator::new(Granularity::Day);
    ctx.ingest(options, &mut daily)?;
    let rows = daily.finish();

    let series = DailySeries::from_rows(&rows, kind);
    if series.is_empty() {
        output::warning(&format!("No {} records found.", kind.label()));
        return Ok(());
    }
    let sampled = matches!(kind.rule(), AccumulationRule::Sampled { .. });
    let unit = kind.unit();

    let summary = summarize(&series, report_settings.recent_window_days, thresholds.trend_band_pct);

    output::header(&format!("{} ANALYSIS", kind.label().to_uppercase()));
    if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
        println!("  Period: {} to {} ({} days with data)", first, last, group_thousands(summary.days as u64));
    }
    let per = if sampled { "daily mean" } else { "daily total" };
    println!("  Average {}: {}", per, output::value(summary.mean, 1, unit));
    println!("  Standard deviation: {}", output::value(summary.std_dev, 1, unit));
    if let Some((date, v)) = summary.lowest {
        println!("  Lowest: {:.1} {} on {}", v, unit, date);
    }
    if let Some((date, v)) = summary.highest {
        println!("  Highest: {:.1} {} on {}", v, unit, date);
    }

    let short = series.rolling_mean(report_settings.rolling_short_days);
    let long = series.rolling_mean(report_settings.rolling_long_days);
    println!(
        "  Latest {}-day average: {}",
        report_settings.rolling_short_days,
        output::value(short.points().last().map(|(_, v)| *v), 1, unit)
    );
    println!(
        "  Latest {}-day average: {}",
        report_settings.rolling_long_days,
        output::value(long.points().last().map(|(_, v)| *v), 1, unit)
    );

    output::header("TREND");
    match (summary.trend, summary.direction) {
        (Some(t), Some(direction)) => println!(
            "  First half vs second half: {:.1} → {:.1} {} ({})",
            t.baseline,
            t.comparison,
            output::change(t.delta, t.delta_pct, unit),
            direction.label()
        ),
        _ => output::info("Not enough days for a trend"),
    }
    if let Some(r) = summary.recent {
        println!(
            "  Last {} days vs overall: {:.1} vs {:.1} {}",
            summary.recent_window_days,
            r.comparison,
            r.baseline,
            output::change(r.delta, r.delta_pct, unit)
        );
    }

    let observations = observations(kind, &series, thresholds);
    output::header("OBSERVATIONS");
    if observations.is_empty() {
        output::info("No threshold observations");
    }
    for line in &observations {
        println!("  • {}", line);
    }

    let min = DailySeries::from_rows_with(&rows, |r| r.min(kind));
    let max = DailySeries::from_rows_with(&rows, |r| r.max(kind));
    let short_label = format!("{}-day average", report_settings.rolling_short_days);
    let long_label = format!("{}-day average", report_settings.rolling_long_days);

    let mut trend_panel = Panel::new(kind.label(), unit);
    trend_panel = if sampled {
        trend_panel.dots("Daily mean", &series, chart::GREY)
    } else {
        trend_panel.bars("Daily total", &series, chart::GREY)
    };
    trend_panel = trend_panel
        .line(&short_label, &short, chart::BLUE)
        .line(&long_label, &long, chart::RED);
    for (value, label, color) in reference_lines(kind, thresholds) {
        trend_panel = trend_panel.reference(value, label, color);
    }
    let mut panels = vec![trend_panel];
    if sampled {
        panels.push(
            Panel::new("Daily range", unit)
                .dots("Min", &min, chart::BLUE)
                .dots("Max", &max, chart::ORANGE)
                .line("Mean", &series, chart::GREY),
        );
    }

    let svg = ctx.output_path(&format!("{}_analysis.svg", kind.slug()))?;
    chart::render_panels(&format!("{} Analysis", kind.label()), &panels, &svg)?;
    written(&svg);

    let csv = ctx.output_path(&format!("{}_daily.csv", kind.slug()))?;
    let mut columns: Vec<(&str, &DailySeries)> = vec![(if sampled { "mean" } else { "total" }, &series)];
    if sampled {
        columns.push(("min", &min));
        columns.push(("max", &max));
    }
    columns.push(("rolling_short", &short));
    columns.push(("rolling_long", &long));
    table::write_series_csv(&columns, &csv)?;
    written(&csv);

    ctx.maybe_write_json(
        &MetricReport {
            metric: kind,
            since,
            summary: &summary,
            daily: &series,
            observations: &observations,
        },
        &format!("{}_analysis.json", kind.slug()),
    )?;

    Ok(())
}

fn summarize(series: &DailySeries, recent_window_days: u32, band_pct: f64) -> SeriesSummary {
    let (first, second) = series.halves();
    let trend = TrendComparison::of_means(&first.values(), &second.values());
    let recent = series
        .mean()
        .zip(series.last_days(recent_window_days).mean())
        .map(|(overall, recent)| TrendComparison::new(overall, recent));

    SeriesSummary {
        days: series.len(),
        first_date: series.first_date(),
        last_date: series.last_date(),
        mean: series.mean(),
        std_dev: series.std_dev(),
        lowest: series.argmin(),
        highest: series.argmax(),
        direction: trend.map(|t| t.direction(band_pct)),
        trend,
        recent_window_days,
        recent,
    }
}

fn reference_lines(kind: MetricKind, t: &Thresholds) -> Vec<(f64, &'static str, RGBColor)> {
    match kind {
        MetricKind::RestingHeartRate | MetricKind::HeartRate => vec![
            (t.resting_hr_excellent, "Excellent", chart::GREEN),
            (t.resting_hr_elevated, "Elevated", chart::ORANGE),
        ],
        MetricKind::HeartRateVariability => vec![
            (t.hrv_normal_min, "Healthy", chart::GREEN),
            (t.hrv_low, "Low", chart::ORANGE),
        ],
        MetricKind::OxygenSaturation => vec![
            (t.oxygen_low, "Normal", chart::GREEN),
            (t.oxygen_critical, "Critical", chart::RED),
        ],
        MetricKind::Sleep => vec![
            (t.sleep_recommended, "Recommended", chart::GREEN),
            (t.sleep_minimum, "Minimum", chart::ORANGE),
        ],
        MetricKind::Steps => vec![
            (t.steps_target, "Target", chart::GREEN),
            (t.steps_low, "Low", chart::ORANGE),
        ],
        MetricKind::ActiveEnergy => vec![(t.calories_target, "Target", chart::GREEN)],
        MetricKind::BloodPressureSystolic => vec![
            (t.systolic_normal_max, "Normal", chart::GREEN),
            (t.systolic_high, "High", chart::RED),
        ],
        MetricKind::BloodPressureDiastolic => vec![
            (t.diastolic_normal_max, "Normal", chart::GREEN),
            (t.diastolic_high, "High", chart::RED),
        ],
    }
}

/// Threshold observations over a daily series
fn observations(kind: MetricKind, series: &DailySeries, t: &Thresholds) -> Vec<String> {
    let days = series.len();
    let share = |n: usize| n as f64 / days as f64 * 100.0;
    let count_line = |n: usize, what: String| format!("{} of {} days {} ({:.1}%)", n, days, what, share(n));
    let mut out = Vec::new();

    match kind {
        MetricKind::OxygenSaturation => {
            let low = series.count_where(|v| v < t.oxygen_low);
            let critical = series.count_where(|v| v < t.oxygen_critical);
            out.push(count_line(low, format!("averaged below {:.0}%", t.oxygen_low)));
            if critical > 0 {
                out.push(count_line(critical, format!("averaged below {:.0}%", t.oxygen_critical)));
            }
        }
        MetricKind::RestingHeartRate | MetricKind::HeartRate => {
            if let Some(mean) = series.mean() {
                let assessment = if mean < t.resting_hr_excellent {
                    "excellent"
                } else if mean <= t.resting_hr_normal_max {
                    "normal"
                } else if mean <= t.resting_hr_elevated {
                    "above normal"
                } else {
                    "elevated"
                };
                out.push(format!("Average of {:.1} BPM is {}", mean, assessment));
            }
            if let Some(sd) = series.std_dev() {
                if sd > t.resting_hr_variability {
                    out.push(format!("High day-to-day variability (standard deviation {:.1} BPM)", sd));
                }
            }
            let fast = series.count_where(|v| v > t.resting_hr_tachycardia);
            if fast > 0 {
                out.push(count_line(fast, format!("above {:.0} BPM", t.resting_hr_tachycardia)));
            }
            let slow = series.count_where(|v| v < t.resting_hr_excellent);
            out.push(count_line(slow, format!("below {:.0} BPM", t.resting_hr_excellent)));
        }
        MetricKind::HeartRateVariability => {
            let low = series.count_where(|v| v < t.hrv_low);
            out.push(count_line(low, format!("below {:.0} ms", t.hrv_low)));
        }
        MetricKind::Sleep => {
            let enough = series.count_where(|v| v >= t.sleep_recommended);
            let short = series.count_where(|v| v < t.sleep_minimum);
            out.push(count_line(enough, format!("with at least {:.0} hours", t.sleep_recommended)));
            out.push(count_line(short, format!("with less than {:.0} hours", t.sleep_minimum)));
        }
        MetricKind::Steps => {
            let target = series.count_where(|v| v >= t.steps_target);
            let low = series.count_where(|v| v < t.steps_low);
            out.push(count_line(target, format!("reached {} steps", group_thousands(t.steps_target as u64))));
            out.push(count_line(low, format!("under {} steps", group_thousands(t.steps_low as u64))));
        }
        MetricKind::ActiveEnergy => {
            let target = series.count_where(|v| v >= t.calories_target);
            out.push(count_line(target, format!("burned at least {:.0} kcal", t.calories_target)));
        }
        MetricKind::BloodPressureSystolic => {
            let high = series.count_where(|v| v >= t.systolic_high);
            out.push(count_line(high, format!("averaged {:.0} mmHg or more", t.systolic_high)));
        }
        MetricKind::BloodPressureDiastolic => {
            let high = series.count_where(|v| v >= t.diastolic_high);
            out.push(count_line(high, format!("averaged {:.0} mmHg or more", t.diastolic_high)));
        }
    }
    out
}

fn analyze_blood_pressure(ctx: &RunContext, options: IngestOptions) -> Result<()> {
    let mut pairer = BloodPressurePairer::new(&ctx.settings.thresholds);
    ctx.ingest(options, &mut pairer)?;
    let report = pairer.finish();

    if report.is_empty() {
        output::warning(&format!(
            "No paired blood pressure readings found ({} unmatched values).",
            report.unmatched
        ));
        return Ok(());
    }

    print_blood_pressure(&report);

    let systolic = bp_series(&report, |r| r.systolic);
    let diastolic = bp_series(&report, |r| r.diastolic);
    let pulse = bp_series(&report, |r| r.pulse_pressure);
    let t = &ctx.settings.thresholds;
    let panels = [
        Panel::new("Blood Pressure", "mmHg")
            .dots("Systolic", &systolic, chart::RED)
            .dots("Diastolic", &diastolic, chart::BLUE)
            .reference(t.systolic_high, "Systolic high", chart::RED)
            .reference(t.diastolic_high, "Diastolic high", chart::BLUE),
        Panel::new("Pulse Pressure", "mmHg").dots("Systolic - diastolic", &pulse, chart::PURPLE),
    ];

    let svg = ctx.output_path("blood-pressure_analysis.svg")?;
    chart::render_panels("Blood Pressure Analysis", &panels, &svg)?;
    written(&svg);

    ctx.maybe_write_json(&report, "blood-pressure_analysis.json")?;
    Ok(())
}

fn print_blood_pressure(report: &BloodPressureReport) {
    output::header("BLOOD PRESSURE ANALYSIS");
    println!("  Paired readings: {}", group_thousands(report.readings.len() as u64));
    println!(
        "  Average: {}/{} mmHg",
        output::value(report.mean_systolic(), 0, ""),
        output::value(report.mean_diastolic(), 0, "")
    );
    println!("  Average pulse pressure: {}", output::value(report.mean_pulse_pressure(), 1, "mmHg"));
    if report.unmatched > 0 {
        output::warning(&format!("{} values had no matching partner", report.unmatched));
    }

    output::header("CATEGORY DISTRIBUTION");
    for category in BpCategory::ALL {
        let n = report.distribution.get(&category).copied().unwrap_or(0);
        println!(
            "  {:<14} {:>8} {:>10}",
            category.label(),
            group_thousands(n),
            output::value(report.share(category), 1, "%")
        );
    }
    let high = report.share(BpCategory::Stage2).unwrap_or(0.0) + report.share(BpCategory::Crisis).unwrap_or(0.0);
    if high > 0.0 {
        output::warning(&format!("{:.1}% of readings at stage 2 or above", high));
    }
}

fn bp_series(report: &BloodPressureReport, value: impl Fn(&BpReading) -> f64) -> DailySeries {
    DailySeries::from_points(
        report
            .readings
            .iter()
            .map(|r| (r.at.date_naive(), value(r)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_parse_target() {
        assert!(matches!(parse_target("bp").unwrap(), Target::BloodPressure));
        assert!(matches!(parse_target("Blood-Pressure").unwrap(), Target::BloodPressure));
        assert!(matches!(
            parse_target("oxygen").unwrap(),
            Target::Single(MetricKind::OxygenSaturation)
        ));
        assert!(parse_target("weight").is_err());
    }

    #[test]
    fn test_oxygen_observations() {
        let series = DailySeries::from_points(vec![(day(1), 97.0), (day(2), 94.0), (day(3), 89.0), (day(4), 96.0)]);
        let lines = observations(MetricKind::OxygenSaturation, &series, &Thresholds::default());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2 of 4 days"));
        assert!(lines[1].starts_with("1 of 4 days"));
    }

    #[test]
    fn test_summary_trend() {
        let series = DailySeries::from_points(vec![(day(1), 60.0), (day(2), 60.0), (day(3), 70.0), (day(4), 70.0)]);
        let summary = summarize(&series, 30, 5.0);
        assert_eq!(summary.days, 4);
        assert_eq!(summary.mean, Some(65.0));
        assert_eq!(summary.direction, Some(TrendDirection::Rising));
        assert_eq!(summary.lowest, Some((day(1), 60.0)));
        assert_eq!(summary.highest.map(|(_, v)| v), Some(70.0));
    }
}
