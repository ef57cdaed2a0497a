//! Period aggregation of ingested records
//!
//! Folds records into calendar buckets keyed by the record's own start date.
//! Buckets hold running accumulators only, so memory grows with the number of
//! periods times the number of metrics, never with the number of records.

use crate::ingest::RecordSink;
use serde::Serialize;
use std::collections::BTreeMap;
use vitalscope_shared::types::record::{AccumulationRule, HealthRecord, MetricKind};
use vitalscope_shared::types::summary::{
    Granularity, MetricSummary, PeriodKey, SampleStats, SummaryRow, TotalStats,
};

/// Per-metric accumulator, chosen by the metric's rule
#[derive(Debug, Clone, PartialEq)]
enum Accumulator {
    Samples(SampleStats),
    Total(TotalStats),
    Hours(TotalStats),
}

impl Accumulator {
    fn for_rule(rule: AccumulationRule) -> Self {
        match rule {
            AccumulationRule::Sampled { .. } => Self::Samples(SampleStats::default()),
            AccumulationRule::Additive => Self::Total(TotalStats::default()),
            AccumulationRule::Interval => Self::Hours(TotalStats::default()),
        }
    }

    fn add(&mut self, value: f64) {
        match self {
            Self::Samples(stats) => stats.push(value),
            Self::Total(stats) | Self::Hours(stats) => stats.add(value),
        }
    }

    fn summarize(&self, days: u32) -> Option<MetricSummary> {
        match self {
            Self::Samples(stats) => MetricSummary::from_samples(stats),
            Self::Total(stats) => MetricSummary::from_total(stats, days),
            Self::Hours(stats) => MetricSummary::from_intervals(stats, days),
        }
    }
}

/// Mutable accumulator for one period
#[derive(Debug, Clone, Default)]
struct Bucket {
    /// Accepted records only; unrecognized types never reach the bucket
    record_count: u64,
    metrics: BTreeMap<MetricKind, Accumulator>,
}

impl Bucket {
    fn add(&mut self, record: &HealthRecord) {
        self.record_count += 1;
        self.metrics
            .entry(record.kind)
            .or_insert_with(|| Accumulator::for_rule(record.kind.rule()))
            .add(record.amount());
    }

    fn into_row(self, period: PeriodKey) -> SummaryRow {
        let mut row = SummaryRow::new(period);
        row.record_count = self.record_count;
        for (kind, acc) in &self.metrics {
            if let Some(summary) = acc.summarize(row.days_in_period) {
                row.metrics.insert(*kind, summary);
            }
        }
        row
    }
}

/// Groups records into period buckets of one granularity
#[derive(Debug, Clone)]
pub struct PeriodAggregator {
    granularity: Granularity,
    buckets: BTreeMap<PeriodKey, Bucket>,
}

impl PeriodAggregator {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            buckets: BTreeMap::new(),
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Number of periods seen so far
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Finalize every bucket into a summary row, ascending by period
    pub fn finish(self) -> Vec<SummaryRow> {
        self.buckets
            .into_iter()
            .map(|(period, bucket)| bucket.into_row(period))
            .collect()
    }
}

impl RecordSink for PeriodAggregator {
    fn accept(&mut self, record: &HealthRecord) {
        let key = PeriodKey::containing(record.start.date_naive(), self.granularity);
        self.buckets.entry(key).or_default().add(record);
    }
}

/// Yearly mean of per-period headline values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyAverage {
    pub year: i32,
    /// Periods that contributed to the year
    pub periods: usize,
    pub metrics: BTreeMap<MetricKind, f64>,
}

impl YearlyAverage {
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        self.metrics.get(&kind).copied()
    }
}

/// Average each metric's headline value across the rows of every year.
/// Rows without data for a metric do not count towards its average.
pub fn yearly_rollup(rows: &[SummaryRow]) -> Vec<YearlyAverage> {
    let mut years: BTreeMap<i32, (usize, BTreeMap<MetricKind, SampleStats>)> = BTreeMap::new();

    for row in rows {
        let (periods, metrics) = years.entry(row.period.year()).or_default();
        *periods += 1;
        for kind in row.metrics.keys() {
            if let Some(value) = row.headline(*kind) {
                metrics.entry(*kind).or_default().push(value);
            }
        }
    }

    years
        .into_iter()
        .map(|(year, (periods, metrics))| YearlyAverage {
            year,
            periods,
            metrics: metrics
                .into_iter()
                .filter_map(|(kind, stats)| Some((kind, stats.mean()?)))
                .collect(),
        })
        .collect()
}
