//! Threshold rules and narrative insights.
//!
//! Rules compare a health metric against a threshold and fire an insight when
//! the condition holds. A metric with no data never fires: the snapshot
//! stores only values that were actually observed.

use crate::config::Thresholds;
use crate::series::DailySeries;
use crate::stats::KeyStatsReport;
use serde::Serialize;
use std::collections::BTreeMap;
use vitalscope_shared::types::record::MetricKind;
use vitalscope_shared::types::summary::{PeriodKey, SummaryRow};
use vitalscope_shared::types::trend::{linear_slope, TrendComparison, TrendDirection};
use vitalscope_shared::utils::time::month_index;

/// Share of high blood pressure readings that raises a warning
const HIGH_BP_SHARE_PCT: f64 = 10.0;

/// Calendar months compared at each end of the history
const HISTORY_WINDOW_MONTHS: i32 = 12;

/// Calendar months used for recommendations
const RECOMMENDATION_MONTHS: i32 = 6;

/// A value an insight rule can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightMetric {
    RestingHeartRate,
    RestingHrChange,
    HeartRateVariability,
    HrvChange,
    OxygenSaturation,
    OxygenLowSharePct,
    OxygenLowDays,
    SleepHours,
    DailySteps,
    DailyCalories,
    HighBpSharePct,
}

impl InsightMetric {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RestingHeartRate => "Resting heart rate",
            Self::RestingHrChange => "Resting heart rate change",
            Self::HeartRateVariability => "HRV",
            Self::HrvChange => "HRV change",
            Self::OxygenSaturation => "Oxygen saturation",
            Self::OxygenLowSharePct => "Low oxygen readings",
            Self::OxygenLowDays => "Low oxygen days",
            Self::SleepHours => "Sleep",
            Self::DailySteps => "Daily steps",
            Self::DailyCalories => "Daily active energy",
            Self::HighBpSharePct => "High blood pressure readings",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::RestingHeartRate | Self::RestingHrChange => "BPM",
            Self::HeartRateVariability | Self::HrvChange => "ms",
            Self::OxygenSaturation | Self::OxygenLowSharePct | Self::HighBpSharePct => "%",
            Self::OxygenLowDays => "days",
            Self::SleepHours => "hours",
            Self::DailySteps => "steps",
            Self::DailyCalories => "kcal",
        }
    }
}

/// Comparison operator for threshold evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// Severity of an insight, from encouraging to urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Good,
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightRule {
    pub name: String,
    pub metric: InsightMetric,
    pub operator: Operator,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
}

impl InsightRule {
    pub fn new(
        name: &str,
        metric: InsightMetric,
        operator: Operator,
        threshold: f64,
        severity: Severity,
        message: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            metric,
            operator,
            threshold,
            severity,
            message: message.to_string(),
        }
    }
}

/// A fired rule.
#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub rule_name: String,
    pub severity: Severity,
    pub metric: InsightMetric,
    pub value: f64,
    pub threshold: f64,
    pub operator: Operator,
    pub message: String,
}

/// Observed metric values; absent metrics have no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSnapshot {
    values: BTreeMap<InsightMetric, f64>,
}

impl HealthSnapshot {
    /// Record a value if there is one
    pub fn set(&mut self, metric: InsightMetric, value: Option<f64>) -> &mut Self {
        if let Some(value) = value.filter(|v| v.is_finite()) {
            self.values.insert(metric, value);
        }
        self
    }

    pub fn get(&self, metric: InsightMetric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot of whole-export key statistics
    pub fn from_key_stats(report: &KeyStatsReport) -> Self {
        let mut snapshot = Self::default();
        snapshot
            .set(InsightMetric::RestingHeartRate, report.mean(MetricKind::RestingHeartRate))
            .set(
                InsightMetric::HeartRateVariability,
                report.mean(MetricKind::HeartRateVariability),
            )
            .set(InsightMetric::OxygenSaturation, report.mean(MetricKind::OxygenSaturation))
            .set(InsightMetric::OxygenLowSharePct, report.oxygen.below_low_pct)
            .set(InsightMetric::SleepHours, report.daily_average(MetricKind::Sleep))
            .set(InsightMetric::DailySteps, report.daily_average(MetricKind::Steps))
            .set(InsightMetric::DailyCalories, report.daily_average(MetricKind::ActiveEnergy))
            .set(
                InsightMetric::HighBpSharePct,
                report.blood_pressure.systolic_high_pct,
            );
        snapshot
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<InsightRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<InsightRule>) -> Self {
        Self { rules }
    }

    /// Default rules built from the configured thresholds
    pub fn from_thresholds(t: &Thresholds) -> Self {
        use InsightMetric::*;
        use Operator::*;
        use Severity::*;

        Self::new(vec![
            InsightRule::new(
                "Excellent resting heart rate",
                RestingHeartRate,
                Lt,
                t.resting_hr_excellent,
                Good,
                "Resting heart rate indicates good cardiovascular fitness",
            ),
            InsightRule::new(
                "Elevated resting heart rate",
                RestingHeartRate,
                Gt,
                t.resting_hr_elevated,
                Warning,
                "Resting heart rate is elevated; consider more cardio and recovery",
            ),
            InsightRule::new(
                "Tachycardia",
                RestingHeartRate,
                Gt,
                t.resting_hr_tachycardia,
                Critical,
                "Resting heart rate is above 100 BPM; consult a healthcare provider",
            ),
            InsightRule::new(
                "Rising resting heart rate",
                RestingHrChange,
                Gt,
                t.resting_hr_rise_alert,
                Warning,
                "Resting heart rate has increased; consider more cardio and recovery",
            ),
            InsightRule::new(
                "Good HRV",
                HeartRateVariability,
                Gt,
                t.hrv_normal_min,
                Good,
                "Heart rate variability is in a healthy range",
            ),
            InsightRule::new(
                "Low HRV",
                HeartRateVariability,
                Lt,
                t.hrv_low,
                Warning,
                "Heart rate variability is low; focus on stress management and recovery",
            ),
            InsightRule::new(
                "Falling HRV",
                HrvChange,
                Lt,
                -t.hrv_drop_alert,
                Warning,
                "Heart rate variability has decreased; focus on stress management and recovery",
            ),
            InsightRule::new(
                "Low average oxygen",
                OxygenSaturation,
                Lt,
                t.oxygen_low,
                Warning,
                "Average oxygen saturation is low; monitor breathing and consider a sleep study",
            ),
            InsightRule::new(
                "Frequent low oxygen readings",
                OxygenLowSharePct,
                Gt,
                t.oxygen_low_share_pct,
                Warning,
                "Many oxygen readings fall below the normal range",
            ),
            InsightRule::new(
                "Low oxygen days",
                OxygenLowDays,
                Gt,
                t.oxygen_low_days as f64,
                Warning,
                "Several days averaged below the normal oxygen range",
            ),
            InsightRule::new(
                "Adequate sleep",
                SleepHours,
                Gte,
                t.sleep_minimum,
                Good,
                "Sleep duration meets recommendations",
            ),
            InsightRule::new(
                "Short sleep",
                SleepHours,
                Lt,
                t.sleep_minimum,
                Warning,
                "Average sleep is below the recommended minimum; aim for 7 to 9 hours",
            ),
            InsightRule::new(
                "Poor sleep",
                SleepHours,
                Lt,
                t.sleep_poor,
                Critical,
                "Average sleep is well below recommendations",
            ),
            InsightRule::new(
                "Very active",
                DailySteps,
                Gte,
                t.steps_target,
                Good,
                "Daily step count meets the activity target",
            ),
            InsightRule::new(
                "Low activity",
                DailySteps,
                Lt,
                t.steps_low,
                Warning,
                "Daily step count is low; try to increase daily movement",
            ),
            InsightRule::new(
                "Active energy target",
                DailyCalories,
                Gte,
                t.calories_target,
                Good,
                "Daily active energy meets the target",
            ),
            InsightRule::new(
                "Frequent high blood pressure",
                HighBpSharePct,
                Gt,
                HIGH_BP_SHARE_PCT,
                Warning,
                "A notable share of blood pressure readings are high",
            ),
        ])
    }

    pub fn rules(&self) -> &[InsightRule] {
        &self.rules
    }

    /// Evaluate every rule whose metric has data
    pub fn evaluate(&self, snapshot: &HealthSnapshot) -> Vec<Insight> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let value = snapshot.get(rule.metric)?;
                if !rule.operator.evaluate(value, rule.threshold) {
                    return None;
                }
                Some(Insight {
                    rule_name: rule.name.clone(),
                    severity: rule.severity,
                    metric: rule.metric,
                    value,
                    threshold: rule.threshold,
                    operator: rule.operator,
                    message: format!(
                        "{} ({}: {:.1} {})",
                        rule.message,
                        rule.metric.label(),
                        value,
                        rule.metric.unit()
                    ),
                })
            })
            .collect()
    }
}

/// Change in one metric between two windows
#[derive(Debug, Clone, Serialize)]
pub struct MetricTrend {
    pub kind: MetricKind,
    pub comparison: TrendComparison,
    pub direction: TrendDirection,
}

/// Period holding an extreme value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Milestone {
    pub period: PeriodKey,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Milestones {
    pub lowest_resting_hr: Option<Milestone>,
    pub highest_hrv: Option<Milestone>,
    pub most_active: Option<Milestone>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Concerns {
    /// Periods whose lowest oxygen reading is below the critical level
    pub low_oxygen: Vec<Milestone>,
    /// Periods whose average nightly sleep is below the poor level
    pub short_sleep: Vec<Milestone>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryInsights {
    /// First twelve vs last twelve calendar months; empty unless the history spans more than twelve
    pub long_term: Vec<MetricTrend>,
    pub milestones: Milestones,
    pub concerns: Concerns,
    /// Warnings from the six calendar months ending at the last period
    pub recommendations: Vec<Insight>,
}

const HISTORY_METRICS: [MetricKind; 5] = [
    MetricKind::RestingHeartRate,
    MetricKind::HeartRateVariability,
    MetricKind::OxygenSaturation,
    MetricKind::Steps,
    MetricKind::Sleep,
];

/// Rows whose period starts in a calendar month accepted by `keep`
fn months_from(rows: &[SummaryRow], keep: impl Fn(i32) -> bool) -> Vec<SummaryRow> {
    rows.iter()
        .filter(|row| keep(month_index(row.period.start())))
        .cloned()
        .collect()
}

fn headlines(rows: &[SummaryRow], kind: MetricKind) -> Vec<f64> {
    rows.iter().filter_map(|row| row.headline(kind)).collect()
}

fn extreme(
    rows: &[SummaryRow],
    value: impl Fn(&SummaryRow) -> Option<f64>,
    better: impl Fn(f64, f64) -> bool,
) -> Option<Milestone> {
    rows.iter()
        .filter_map(|row| {
            Some(Milestone {
                period: row.period,
                value: value(row)?,
            })
        })
        .reduce(|best, m| if better(m.value, best.value) { m } else { best })
}

/// Insights over monthly rows of the full history
pub fn history_insights(rows: &[SummaryRow], thresholds: &Thresholds) -> HistoryInsights {
    let mut insights = HistoryInsights::default();

    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return insights;
    };
    let first_month = month_index(first.period.start());
    let last_month = month_index(last.period.start());

    if last_month - first_month >= HISTORY_WINDOW_MONTHS {
        let early = months_from(rows, |m| m < first_month + HISTORY_WINDOW_MONTHS);
        let late = months_from(rows, |m| m > last_month - HISTORY_WINDOW_MONTHS);
        for kind in HISTORY_METRICS {
            if let Some(comparison) =
                TrendComparison::of_means(&headlines(&early, kind), &headlines(&late, kind))
            {
                insights.long_term.push(MetricTrend {
                    kind,
                    comparison,
                    direction: comparison.direction(thresholds.trend_band_pct),
                });
            }
        }
    }

    insights.milestones = Milestones {
        lowest_resting_hr: extreme(rows, |r| r.mean(MetricKind::RestingHeartRate), |a, b| a < b),
        highest_hrv: extreme(rows, |r| r.mean(MetricKind::HeartRateVariability), |a, b| a > b),
        most_active: extreme(rows, |r| r.daily_average(MetricKind::Steps), |a, b| a > b),
    };

    for row in rows {
        if let Some(min) = row.min(MetricKind::OxygenSaturation) {
            if min < thresholds.oxygen_critical {
                insights.concerns.low_oxygen.push(Milestone {
                    period: row.period,
                    value: min,
                });
            }
        }
        if let Some(hours) = row.daily_average(MetricKind::Sleep) {
            if hours < thresholds.sleep_poor {
                insights.concerns.short_sleep.push(Milestone {
                    period: row.period,
                    value: hours,
                });
            }
        }
    }

    let recent = months_from(rows, |m| m > last_month - RECOMMENDATION_MONTHS);
    let snapshot = recent_snapshot(&recent);
    insights.recommendations = RuleSet::from_thresholds(thresholds)
        .evaluate(&snapshot)
        .into_iter()
        .filter(|insight| insight.severity >= Severity::Warning)
        .collect();

    insights
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn change(values: &[f64]) -> Option<f64> {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() > 1 => Some(last - first),
        _ => None,
    }
}

fn recent_snapshot(rows: &[SummaryRow]) -> HealthSnapshot {
    let rhr = headlines(rows, MetricKind::RestingHeartRate);
    let hrv = headlines(rows, MetricKind::HeartRateVariability);

    let mut snapshot = HealthSnapshot::default();
    snapshot
        .set(InsightMetric::RestingHeartRate, mean(&rhr))
        .set(InsightMetric::RestingHrChange, change(&rhr))
        .set(InsightMetric::HeartRateVariability, mean(&hrv))
        .set(InsightMetric::HrvChange, change(&hrv))
        .set(
            InsightMetric::OxygenSaturation,
            mean(&headlines(rows, MetricKind::OxygenSaturation)),
        )
        .set(InsightMetric::SleepHours, mean(&headlines(rows, MetricKind::Sleep)))
        .set(InsightMetric::DailySteps, mean(&headlines(rows, MetricKind::Steps)));
    snapshot
}

/// Overall vs recent mean of one daily series
#[derive(Debug, Clone, Serialize)]
pub struct RecentComparison {
    pub kind: MetricKind,
    pub comparison: TrendComparison,
    pub direction: TrendDirection,
}

/// Joint direction of heart rate and HRV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardioTrend {
    /// Heart rate falling while HRV rises
    Improving,
    /// Heart rate rising while HRV falls
    Declining,
    Mixed,
}

impl CardioTrend {
    pub fn from_slopes(heart_rate: f64, hrv: f64) -> Self {
        if heart_rate < 0.0 && hrv > 0.0 {
            Self::Improving
        } else if heart_rate > 0.0 && hrv < 0.0 {
            Self::Declining
        } else {
            Self::Mixed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Improving => "improving (heart rate down, HRV up)",
            Self::Declining => "declining (heart rate up, HRV down)",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecentInsights {
    pub window_days: u32,
    pub comparisons: Vec<RecentComparison>,
    pub cardio: Option<CardioTrend>,
    /// Days in the window with mean oxygen below the low threshold
    pub low_oxygen_days: Option<usize>,
    /// Days in the window meeting the active energy target
    pub active_days: Option<usize>,
    pub insights: Vec<Insight>,
}

/// Insights over daily series: the last `window_days` against the whole series
pub fn recent_insights(
    series: &BTreeMap<MetricKind, DailySeries>,
    window_days: u32,
    thresholds: &Thresholds,
) -> RecentInsights {
    let recent = |kind: MetricKind| series.get(&kind).map(|s| s.last_days(window_days));

    let comparisons = series
        .iter()
        .filter_map(|(kind, daily)| {
            let window = daily.last_days(window_days);
            let comparison = TrendComparison::new(daily.mean()?, window.mean()?);
            Some(RecentComparison {
                kind: *kind,
                direction: comparison.direction(thresholds.trend_band_pct),
                comparison,
            })
        })
        .collect();

    let hr = recent(MetricKind::RestingHeartRate)
        .filter(|s| !s.is_empty())
        .or_else(|| recent(MetricKind::HeartRate));
    let hrv = recent(MetricKind::HeartRateVariability);
    let cardio = match (hr, hrv) {
        (Some(hr), Some(hrv)) => linear_slope(&hr.values())
            .zip(linear_slope(&hrv.values()))
            .map(|(hr, hrv)| CardioTrend::from_slopes(hr, hrv)),
        _ => None,
    };

    let oxygen = recent(MetricKind::OxygenSaturation).filter(|s| !s.is_empty());
    let energy = recent(MetricKind::ActiveEnergy).filter(|s| !s.is_empty());
    let low_oxygen_days = oxygen
        .as_ref()
        .map(|s| s.count_where(|v| v < thresholds.oxygen_low));
    let active_days = energy
        .as_ref()
        .map(|s| s.count_where(|v| v >= thresholds.calories_target));

    let mean_of = |kind| recent(kind).and_then(|s| s.mean());
    let mut snapshot = HealthSnapshot::default();
    snapshot
        .set(InsightMetric::RestingHeartRate, mean_of(MetricKind::RestingHeartRate))
        .set(InsightMetric::HeartRateVariability, mean_of(MetricKind::HeartRateVariability))
        .set(InsightMetric::OxygenSaturation, mean_of(MetricKind::OxygenSaturation))
        .set(InsightMetric::OxygenLowDays, low_oxygen_days.map(|n| n as f64))
        .set(InsightMetric::SleepHours, mean_of(MetricKind::Sleep))
        .set(InsightMetric::DailySteps, mean_of(MetricKind::Steps))
        .set(InsightMetric::DailyCalories, mean_of(MetricKind::ActiveEnergy));

    RecentInsights {
        window_days,
        comparisons,
        cardio,
        low_oxygen_days,
        active_days,
        insights: RuleSet::from_thresholds(thresholds).evaluate(&snapshot),
    }
}
