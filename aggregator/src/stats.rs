//! Whole-export key statistics
//!
//! A single sink that keeps overall accumulators, the observed date range,
//! per-year record counts and reading-level threshold counters. When the
//! ingestor samples every Nth record, `scaled` turns the sampled counts into
//! estimates for the full export.

use crate::config::Thresholds;
use crate::ingest::RecordSink;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use vitalscope_shared::types::record::{AccumulationRule, HealthRecord, MetricKind};
use vitalscope_shared::types::summary::SampleStats;

#[derive(Debug, Clone)]
pub struct KeyStatistics {
    metrics: BTreeMap<MetricKind, SampleStats>,
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
    per_year: BTreeMap<i32, BTreeMap<MetricKind, u64>>,
    counters: ReadingCounters,
    limits: ReadingLimits,
}

/// Threshold crossings counted per reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReadingCounters {
    pub oxygen_below_low: u64,
    pub oxygen_below_critical: u64,
    pub systolic_high: u64,
    pub diastolic_high: u64,
}

#[derive(Debug, Clone, Copy)]
struct ReadingLimits {
    oxygen_low: f64,
    oxygen_critical: f64,
    systolic_high: f64,
    diastolic_high: f64,
}

impl KeyStatistics {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            metrics: BTreeMap::new(),
            first: None,
            last: None,
            per_year: BTreeMap::new(),
            counters: ReadingCounters::default(),
            limits: ReadingLimits {
                oxygen_low: thresholds.oxygen_low,
                oxygen_critical: thresholds.oxygen_critical,
                systolic_high: thresholds.systolic_high,
                diastolic_high: thresholds.diastolic_high,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Build the report, multiplying counts and totals by `sample_every`
    pub fn scaled(&self, sample_every: u64) -> KeyStatsReport {
        let factor = sample_every.max(1);
        let span_days = match (self.first, self.last) {
            (Some(first), Some(last)) => Some((last - first).num_days() + 1),
            _ => None,
        };

        let metrics = self
            .metrics
            .iter()
            .map(|(kind, stats)| {
                let estimated_total = match kind.rule() {
                    AccumulationRule::Sampled { .. } => None,
                    AccumulationRule::Additive | AccumulationRule::Interval => {
                        Some(stats.sum * factor as f64)
                    }
                };
                let overview = MetricOverview {
                    estimated_count: stats.count * factor,
                    mean: stats.mean(),
                    min: stats.min(),
                    max: stats.max(),
                    estimated_total,
                    daily_average: estimated_total
                        .zip(span_days)
                        .map(|(total, days)| total / days as f64),
                };
                (*kind, overview)
            })
            .collect();

        let per_year = self
            .per_year
            .iter()
            .map(|(year, counts)| {
                let scaled = counts.iter().map(|(k, n)| (*k, n * factor)).collect();
                (*year, scaled)
            })
            .collect();

        let oxygen_readings = self.count(MetricKind::OxygenSaturation);
        let systolic_readings = self.count(MetricKind::BloodPressureSystolic);
        let diastolic_readings = self.count(MetricKind::BloodPressureDiastolic);

        KeyStatsReport {
            sample_every: factor,
            first_date: self.first,
            last_date: self.last,
            span_days,
            metrics,
            per_year,
            oxygen: OxygenOverview {
                readings: oxygen_readings * factor,
                below_low: self.counters.oxygen_below_low * factor,
                below_low_pct: percent(self.counters.oxygen_below_low, oxygen_readings),
                below_critical: self.counters.oxygen_below_critical * factor,
            },
            blood_pressure: PressureOverview {
                systolic_readings: systolic_readings * factor,
                diastolic_readings: diastolic_readings * factor,
                systolic_high: self.counters.systolic_high * factor,
                diastolic_high: self.counters.diastolic_high * factor,
                systolic_high_pct: percent(self.counters.systolic_high, systolic_readings),
                diastolic_high_pct: percent(self.counters.diastolic_high, diastolic_readings),
            },
        }
    }

    fn count(&self, kind: MetricKind) -> u64 {
        self.metrics.get(&kind).map_or(0, |s| s.count)
    }
}

impl RecordSink for KeyStatistics {
    fn accept(&mut self, record: &HealthRecord) {
        let value = record.amount();
        let date = record.start.date_naive();

        self.metrics.entry(record.kind).or_default().push(value);
        self.first = Some(self.first.map_or(date, |d| d.min(date)));
        self.last = Some(self.last.map_or(date, |d| d.max(date)));
        *self
            .per_year
            .entry(date.year())
            .or_default()
            .entry(record.kind)
            .or_insert(0) += 1;

        match record.kind {
            MetricKind::OxygenSaturation => {
                if value < self.limits.oxygen_low {
                    self.counters.oxygen_below_low += 1;
                }
                if value < self.limits.oxygen_critical {
                    self.counters.oxygen_below_critical += 1;
                }
            }
            MetricKind::BloodPressureSystolic if value >= self.limits.systolic_high => {
                self.counters.systolic_high += 1;
            }
            MetricKind::BloodPressureDiastolic if value >= self.limits.diastolic_high => {
                self.counters.diastolic_high += 1;
            }
            _ => {}
        }
    }
}

fn percent(part: u64, whole: u64) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64 * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricOverview {
    pub estimated_count: u64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Additive and interval metrics only
    pub estimated_total: Option<f64>,
    /// Estimated total over the observed span
    pub daily_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OxygenOverview {
    pub readings: u64,
    pub below_low: u64,
    pub below_low_pct: Option<f64>,
    pub below_critical: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PressureOverview {
    pub systolic_readings: u64,
    pub diastolic_readings: u64,
    pub systolic_high: u64,
    pub diastolic_high: u64,
    pub systolic_high_pct: Option<f64>,
    pub diastolic_high_pct: Option<f64>,
}

/// Finalized key statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyStatsReport {
    pub sample_every: u64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub span_days: Option<i64>,
    pub metrics: BTreeMap<MetricKind, MetricOverview>,
    pub per_year: BTreeMap<i32, BTreeMap<MetricKind, u64>>,
    pub oxygen: OxygenOverview,
    pub blood_pressure: PressureOverview,
}

impl KeyStatsReport {
    pub fn metric(&self, kind: MetricKind) -> Option<&MetricOverview> {
        self.metrics.get(&kind)
    }

    pub fn mean(&self, kind: MetricKind) -> Option<f64> {
        self.metrics.get(&kind)?.mean
    }

    pub fn daily_average(&self, kind: MetricKind) -> Option<f64> {
        self.metrics.get(&kind)?.daily_average
    }
}
