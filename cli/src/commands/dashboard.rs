//! Dashboard command implementation

use super::{written, CommonArgs, RunContext};
use crate::output;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use vitalscope_aggregator::insights::{recent_insights, RecentInsights};
use vitalscope_aggregator::output::chart::{self, Panel};
use vitalscope_aggregator::{DailySeries, IngestOptions, PeriodAggregator, Thresholds};
use vitalscope_shared::types::record::MetricKind;
use vitalscope_shared::types::summary::Granularity;
use vitalscope_shared::utils::{parse_lookback, time};

#[derive(Args, Debug)]
pub struct DashboardArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Window ending today (e.g. 90d, 12w, 6m); defaults to report.lookback_days
    #[arg(short, long)]
    pub lookback: Option<String>,
}

#[derive(Serialize)]
struct DashboardReport<'a> {
    lookback_days: u32,
    series: &'a BTreeMap<MetricKind, DailySeries>,
    recent: &'a RecentInsights,
}

pub fn run(args: DashboardArgs) -> Result<()> {
    let ctx = RunContext::load(&args.common)?;
    let report_settings = &ctx.settings.report;
    let thresholds = &ctx.settings.thresholds;

    let lookback = match &args.lookback {
        Some(s) => parse_lookback(s)?,
        None => report_settings.lookback_days,
    };
    let since = time::window_start(time::today(), lookback)?;

    let options = IngestOptions {
        since: Some(since),
        ..ctx.ingest_options()
    };
    let mut daily = PeriodAggregator::new(Granularity::Day);
    ctx.ingest(options, &mut daily)?;
    let rows = daily.finish();

    let series: BTreeMap<MetricKind, DailySeries> = MetricKind::ALL
        .iter()
        .map(|kind| (*kind, DailySeries::from_rows(&rows, *kind)))
        .filter(|(_, s)| !s.is_empty())
        .collect();

    if series.is_empty() {
        output::warning(&format!("No health records in the last {} days (since {}).", lookback, since));
        return Ok(());
    }

    let window = report_settings.recent_window_days;
    output::header(&format!("LAST {} DAYS SUMMARY", window));
    for (kind, daily) in &series {
        let recent = daily.last_days(window);
        println!(
            "  {:<24} {:>12}  (min {}, max {}, {} days)",
            kind.label(),
            output::value(recent.mean(), 1, kind.unit()),
            output::value(recent.min(), 1, ""),
            output::value(recent.max(), 1, ""),
            recent.len()
        );
    }

    let recent = recent_insights(&series, window, thresholds);

    output::header("CHANGE VS FULL WINDOW");
    for c in &recent.comparisons {
        println!(
            "  {:<24} {:>10.1} → {:<10.1} {} ({})",
            c.kind.label(),
            c.comparison.baseline,
            c.comparison.comparison,
            output::change(c.comparison.delta, c.comparison.delta_pct, c.kind.unit()),
            c.direction.label()
        );
    }

    output::header("INSIGHTS");
    if let Some(cardio) = recent.cardio {
        output::info(&format!("Cardiovascular trend: {}", cardio.label()));
    }
    if let Some(days) = recent.active_days {
        output::info(&format!(
            "{} of the last {} days reached {:.0} kcal of active energy",
            days, window, thresholds.calories_target
        ));
    }
    if let Some(days) = recent.low_oxygen_days {
        output::info(&format!(
            "{} days with average oxygen below {:.0}%",
            days, thresholds.oxygen_low
        ));
    }
    for insight in &recent.insights {
        output::insight(insight);
    }

    let rolling = report_settings.rolling_short_days;
    let svg = ctx.output_path("health_dashboard.svg")?;
    chart::render_panels(
        &format!("Health Dashboard - last {} days", lookback),
        &dashboard_panels(&series, rolling, thresholds),
        &svg,
    )?;
    written(&svg);

    ctx.maybe_write_json(
        &DashboardReport {
            lookback_days: lookback,
            series: &series,
            recent: &recent,
        },
        "health_dashboard.json",
    )?;

    Ok(())
}

fn dashboard_panels(
    series: &BTreeMap<MetricKind, DailySeries>,
    rolling_days: u32,
    t: &Thresholds,
) -> Vec<Panel> {
    let empty = DailySeries::default();
    let get = |kind: MetricKind| series.get(&kind).unwrap_or(&empty);
    let rolling_label = format!("{}-day average", rolling_days);

    let heart = if series.contains_key(&MetricKind::RestingHeartRate) {
        MetricKind::RestingHeartRate
    } else {
        MetricKind::HeartRate
    };

    vec![
        Panel::new(heart.label(), "BPM")
            .dots("Daily", get(heart), chart::RED)
            .line(&rolling_label, &get(heart).rolling_mean(rolling_days), chart::RED),
        Panel::new("Heart Rate Variability", "ms")
            .dots("Daily", get(MetricKind::HeartRateVariability), chart::PURPLE)
            .line(
                &rolling_label,
                &get(MetricKind::HeartRateVariability).rolling_mean(rolling_days),
                chart::PURPLE,
            ),
        Panel::new("Oxygen Saturation", "%")
            .dots("Daily", get(MetricKind::OxygenSaturation), chart::BLUE)
            .line(
                &rolling_label,
                &get(MetricKind::OxygenSaturation).rolling_mean(rolling_days),
                chart::BLUE,
            )
            .reference(t.oxygen_low, "Normal", chart::GREEN)
            .reference(t.oxygen_critical, "Critical", chart::RED),
        Panel::new("Sleep", "hours")
            .bars("Nightly", get(MetricKind::Sleep), chart::PURPLE)
            .reference(t.sleep_minimum, "Minimum", chart::ORANGE)
            .reference(t.sleep_recommended, "Recommended", chart::GREEN),
        Panel::new("Steps", "steps")
            .bars("Daily", get(MetricKind::Steps), chart::GREEN)
            .line(&rolling_label, &get(MetricKind::Steps).rolling_mean(rolling_days), chart::BLUE)
            .reference(t.steps_target, "Target", chart::BLUE),
        Panel::new("Active Energy", "kcal")
            .bars("Daily", get(MetricKind::ActiveEnergy), chart::ORANGE)
            .reference(t.calories_target, "Target", chart::BLUE),
    ]
}
