//! Vitalscope aggregation library
//!
//! Streams a health export once, folding records into bounded accumulators,
//! and derives summaries, insights and report output from them.

pub mod aggregate;
pub mod blood_pressure;
pub mod census;
pub mod config;
pub mod error;
pub mod ingest;
pub mod insights;
pub mod output;
pub mod series;
pub mod stats;

pub use aggregate::{yearly_rollup, PeriodAggregator, YearlyAverage};
pub use config::{Settings, SettingsError, Thresholds};
pub use error::{IngestError, SkipReason};
pub use ingest::{IngestOptions, IngestStats, Ingestor, RecordSink};
pub use series::DailySeries;
