//! Summary data structures
//!
//! These types represent aggregated health data for calendar periods, suitable
//! for reporting, charting, and export.

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use super::record::MetricKind;
use crate::utils::time::{days_in_month, days_in_year};

/// Calendar resolution of a period bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Month,
    Year,
}

/// Calendar period a record is attributed to, identified by its first day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey {
    start: NaiveDate,
    granularity: Granularity,
}

impl PeriodKey {
    /// Period of the given granularity that contains `date`
    pub fn containing(date: NaiveDate, granularity: Granularity) -> Self {
        let start = match granularity {
            Granularity::Day => Some(date),
            Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        };
        Self {
            start: start.unwrap_or(date),
            granularity,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }

    /// Number of calendar days the period spans
    pub fn days(&self) -> u32 {
        match self.granularity {
            Granularity::Day => 1,
            Granularity::Month => days_in_month(self.start.year(), self.start.month()),
            Granularity::Year => days_in_year(self.start.year()),
        }
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.granularity {
            Granularity::Day => write!(f, "{}", self.start.format("%Y-%m-%d")),
            Granularity::Month => write!(f, "{}", self.start.format("%Y-%m")),
            Granularity::Year => write!(f, "{}", self.start.year()),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Running moments of a sampled metric. Raw values are not retained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleStats {
    pub count: u64,
    pub sum: f64,
    pub sum_sq: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for SampleStats {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl SampleStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &SampleStats) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Sample standard deviation (n - 1); needs at least two samples
    pub fn std_dev(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as f64;
        let variance = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);
        Some(variance.max(0.0).sqrt())
    }
}

/// Running total of an additive or interval metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TotalStats {
    pub count: u64,
    pub sum: f64,
}

impl TotalStats {
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    pub fn merge(&mut self, other: &TotalStats) {
        self.count += other.count;
        self.sum += other.sum;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Sum of contributions, or `None` when nothing contributed
    pub fn total(&self) -> Option<f64> {
        (self.count > 0).then_some(self.sum)
    }
}

/// Finalized aggregate for one metric in one period
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum MetricSummary {
    Sampled {
        mean: f64,
        min: f64,
        max: f64,
        std_dev: Option<f64>,
        count: u64,
    },
    Additive {
        total: f64,
        daily_average: f64,
        count: u64,
    },
    Interval {
        total_hours: f64,
        daily_average_hours: f64,
        count: u64,
    },
}

impl MetricSummary {
    /// Summarize sampled moments; `None` when no samples were seen
    pub fn from_samples(stats: &SampleStats) -> Option<Self> {
        Some(Self::Sampled {
            mean: stats.mean()?,
            min: stats.min()?,
            max: stats.max()?,
            std_dev: stats.std_dev(),
            count: stats.count,
        })
    }

    /// Summarize an additive total spread over `days`
    pub fn from_total(stats: &TotalStats, days: u32) -> Option<Self> {
        let total = stats.total()?;
        Some(Self::Additive {
            total,
            daily_average: total / days.max(1) as f64,
            count: stats.count,
        })
    }

    /// Summarize interval hours spread over `days`
    pub fn from_intervals(stats: &TotalStats, days: u32) -> Option<Self> {
        let total_hours = stats.total()?;
        Some(Self::Interval {
            total_hours,
            daily_average_hours: total_hours / days.max(1) as f64,
            count: stats.count,
        })
    }

    pub fn count(&self) -> u64 {
        match self {
            Self::Sampled { count, .. }
            | Self::Additive { count, .. }
            | Self::Interval { count, .. } => *count,
        }
    }

    /// Headline value: mean for samples, per-period total otherwise
    pub fn value(&self) -> f64 {
        match self {
            Self::Sampled { mean, .. } => *mean,
            Self::Additive { total, .. } => *total,
            Self::Interval { total_hours, .. } => *total_hours,
        }
    }
}

/// One finalized row per period bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub period: PeriodKey,
    pub days_in_period: u32,
    /// Records aggregated into the row. Types without a metric kind are not
    /// counted here; the type census reports those.
    pub record_count: u64,
    pub metrics: BTreeMap<MetricKind, MetricSummary>,
}

impl SummaryRow {
    pub fn new(period: PeriodKey) -> Self {
        Self {
            period,
            days_in_period: period.days(),
            record_count: 0,
            metrics: BTreeMap::new(),
        }
    }

    pub fn get(&self, kind: MetricKind) -> Option<&MetricSummary> {
        self.metrics.get(&kind)
    }

    pub fn mean(&self, kind: MetricKind) -> Option<f64> {
        match self.metrics.get(&kind)? {
            MetricSummary::Sampled { mean, .. } => Some(*mean),
            _ => None,
        }
    }

    pub fn min(&self, kind: MetricKind) -> Option<f64> {
        match self.metrics.get(&kind)? {
            MetricSummary::Sampled { min, .. } => Some(*min),
            _ => None,
        }
    }

    pub fn max(&self, kind: MetricKind) -> Option<f64> {
        match self.metrics.get(&kind)? {
            MetricSummary::Sampled { max, .. } => Some(*max),
            _ => None,
        }
    }

    /// Period total for additive and interval metrics
    pub fn total(&self, kind: MetricKind) -> Option<f64> {
        match self.metrics.get(&kind)? {
            MetricSummary::Additive { total, .. } => Some(*total),
            MetricSummary::Interval { total_hours, .. } => Some(*total_hours),
            MetricSummary::Sampled { .. } => None,
        }
    }

    /// Period total divided by the days in the period
    pub fn daily_average(&self, kind: MetricKind) -> Option<f64> {
        match self.metrics.get(&kind)? {
            MetricSummary::Additive { daily_average, .. } => Some(*daily_average),
            MetricSummary::Interval {
                daily_average_hours,
                ..
            } => Some(*daily_average_hours),
            MetricSummary::Sampled { .. } => None,
        }
    }

    /// Number of contributing records for the metric (0 when absent)
    pub fn count(&self, kind: MetricKind) -> u64 {
        self.metrics.get(&kind).map_or(0, MetricSummary::count)
    }

    /// Mean for sampled metrics, daily average otherwise
    pub fn headline(&self, kind: MetricKind) -> Option<f64> {
        self.mean(kind).or_else(|| self.daily_average(kind))
    }
}
