//! Daily value series
//!
//! A date-sorted series of one value per day with calendar-aware windowing.
//! Days with no data are absent rather than zero, so windows are measured in
//! calendar days: a gap shrinks the window instead of pulling in older rows.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use vitalscope_shared::types::record::{AccumulationRule, MetricKind};
use vitalscope_shared::types::summary::SummaryRow;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailySeries {
    points: Vec<(NaiveDate, f64)>,
}

impl DailySeries {
    /// Build from points in any order; later duplicates of a date are kept
    pub fn from_points(mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.sort_by_key(|(date, _)| *date);
        Self { points }
    }

    /// Headline series of a metric from daily rows: the mean for sampled
    /// metrics, the day's total for additive and interval metrics
    pub fn from_rows(rows: &[SummaryRow], kind: MetricKind) -> Self {
        match kind.rule() {
            AccumulationRule::Sampled { .. } => Self::from_rows_with(rows, |row| row.mean(kind)),
            AccumulationRule::Additive | AccumulationRule::Interval => {
                Self::from_rows_with(rows, |row| row.total(kind))
            }
        }
    }

    /// Series of any per-row value; rows yielding `None` are skipped
    pub fn from_rows_with(rows: &[SummaryRow], value: impl Fn(&SummaryRow) -> Option<f64>) -> Self {
        Self::from_points(
            rows.iter()
                .filter_map(|row| Some((row.period.start(), value(row)?)))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(d, _)| *d)
    }

    /// Trailing mean over `window_days` calendar days ending at each point.
    /// Every point has at least itself in its window.
    pub fn rolling_mean(&self, window_days: u32) -> DailySeries {
        let window = Duration::days(i64::from(window_days.max(1)));
        let mut out = Vec::with_capacity(self.points.len());
        let mut lo = 0;
        let mut sum = 0.0;

        for (hi, (date, value)) in self.points.iter().enumerate() {
            sum += value;
            while *date - self.points[lo].0 >= window {
                sum -= self.points[lo].1;
                lo += 1;
            }
            out.push((*date, sum / (hi - lo + 1) as f64));
        }
        DailySeries { points: out }
    }

    /// Points within `days` calendar days of the last point (inclusive)
    pub fn last_days(&self, days: u32) -> DailySeries {
        let Some(last) = self.last_date() else {
            return DailySeries::default();
        };
        let cutoff = last - Duration::days(i64::from(days.max(1)) - 1);
        self.since(cutoff)
    }

    /// Points on or after `date`
    pub fn since(&self, date: NaiveDate) -> DailySeries {
        let start = self.points.partition_point(|(d, _)| *d < date);
        DailySeries {
            points: self.points[start..].to_vec(),
        }
    }

    /// Points strictly before `date`
    pub fn before(&self, date: NaiveDate) -> DailySeries {
        let end = self.points.partition_point(|(d, _)| *d < date);
        DailySeries {
            points: self.points[..end].to_vec(),
        }
    }

    /// First and second half of the points
    pub fn halves(&self) -> (DailySeries, DailySeries) {
        let mid = self.points.len() / 2;
        (
            DailySeries {
                points: self.points[..mid].to_vec(),
            },
            DailySeries {
                points: self.points[mid..].to_vec(),
            },
        )
    }

    pub fn mean(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().map(|(_, v)| v).sum::<f64>() / self.points.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.argmin().map(|(_, v)| v)
    }

    pub fn max(&self) -> Option<f64> {
        self.argmax().map(|(_, v)| v)
    }

    /// Sample standard deviation; needs at least two points
    pub fn std_dev(&self) -> Option<f64> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let ss: f64 = self.points.iter().map(|(_, v)| (v - mean).powi(2)).sum();
        Some((ss / (n - 1) as f64).sqrt())
    }

    pub fn count_where(&self, pred: impl Fn(f64) -> bool) -> usize {
        self.points.iter().filter(|(_, v)| pred(*v)).count()
    }

    /// Earliest point holding the minimum
    pub fn argmin(&self) -> Option<(NaiveDate, f64)> {
        self.points
            .iter()
            .copied()
            .reduce(|best, p| if p.1.total_cmp(&best.1).is_lt() { p } else { best })
    }

    /// Earliest point holding the maximum
    pub fn argmax(&self) -> Option<(NaiveDate, f64)> {
        self.points
            .iter()
            .copied()
            .reduce(|best, p| if p.1.total_cmp(&best.1).is_gt() { p } else { best })
    }
}
