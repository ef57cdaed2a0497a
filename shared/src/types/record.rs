//! Health record definitions
//!
//! These types represent single observations read from a health export, and the
//! dispatch table that maps export type identifiers to accumulation rules.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Timestamp carrying the offset it was recorded with
pub type Timestamp = DateTime<FixedOffset>;

/// How records of a metric are folded into a period bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccumulationRule {
    /// Each value is a sample; periods report mean/min/max.
    /// `scale` is applied at ingestion (oxygen fractions become percentages).
    Sampled { scale: f64 },
    /// Values are summed per period (energy, steps)
    Additive,
    /// Duration of a start/end interval is summed per period (sleep)
    Interval,
}

/// Kinds of record the aggregator understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    RestingHeartRate,
    HeartRate,
    HeartRateVariability,
    OxygenSaturation,
    Sleep,
    ActiveEnergy,
    Steps,
    BloodPressureSystolic,
    BloodPressureDiastolic,
}

/// Export type identifier for each metric kind. Lookup goes through this table only.
const IDENTIFIERS: [(&str, MetricKind); 9] = [
    ("HKQuantityTypeIdentifierRestingHeartRate", MetricKind::RestingHeartRate),
    ("HKQuantityTypeIdentifierHeartRate", MetricKind::HeartRate),
    ("HKQuantityTypeIdentifierHeartRateVariabilitySDNN", MetricKind::HeartRateVariability),
    ("HKQuantityTypeIdentifierOxygenSaturation", MetricKind::OxygenSaturation),
    ("HKCategoryTypeIdentifierSleepAnalysis", MetricKind::Sleep),
    ("HKQuantityTypeIdentifierActiveEnergyBurned", MetricKind::ActiveEnergy),
    ("HKQuantityTypeIdentifierStepCount", MetricKind::Steps),
    ("HKQuantityTypeIdentifierBloodPressureSystolic", MetricKind::BloodPressureSystolic),
    ("HKQuantityTypeIdentifierBloodPressureDiastolic", MetricKind::BloodPressureDiastolic),
];

impl MetricKind {
    /// All kinds, in report order
    pub const ALL: [MetricKind; 9] = [
        MetricKind::RestingHeartRate,
        MetricKind::HeartRate,
        MetricKind::HeartRateVariability,
        MetricKind::OxygenSaturation,
        MetricKind::Sleep,
        MetricKind::ActiveEnergy,
        MetricKind::Steps,
        MetricKind::BloodPressureSystolic,
        MetricKind::BloodPressureDiastolic,
    ];

    /// Resolve an export type identifier
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        IDENTIFIERS
            .iter()
            .find(|(id, _)| *id == identifier)
            .map(|&(_, kind)| kind)
    }

    /// Export type identifier for this kind
    pub fn identifier(&self) -> &'static str {
        IDENTIFIERS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(id, _)| *id)
            .unwrap_or_default()
    }

    pub fn rule(&self) -> AccumulationRule {
        match self {
            Self::OxygenSaturation => AccumulationRule::Sampled { scale: 100.0 },
            Self::RestingHeartRate
            | Self::HeartRate
            | Self::HeartRateVariability
            | Self::BloodPressureSystolic
            | Self::BloodPressureDiastolic => AccumulationRule::Sampled { scale: 1.0 },
            Self::ActiveEnergy | Self::Steps => AccumulationRule::Additive,
            Self::Sleep => AccumulationRule::Interval,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::RestingHeartRate => "Resting Heart Rate",
            Self::HeartRate => "Heart Rate",
            Self::HeartRateVariability => "Heart Rate Variability",
            Self::OxygenSaturation => "Oxygen Saturation",
            Self::Sleep => "Sleep Duration",
            Self::ActiveEnergy => "Active Energy",
            Self::Steps => "Steps",
            Self::BloodPressureSystolic => "Systolic Pressure",
            Self::BloodPressureDiastolic => "Diastolic Pressure",
        }
    }

    /// Unit of the aggregated value (after scaling)
    pub fn unit(&self) -> &'static str {
        match self {
            Self::RestingHeartRate | Self::HeartRate => "BPM",
            Self::HeartRateVariability => "ms",
            Self::OxygenSaturation => "%",
            Self::Sleep => "hours",
            Self::ActiveEnergy => "kcal",
            Self::Steps => "steps",
            Self::BloodPressureSystolic | Self::BloodPressureDiastolic => "mmHg",
        }
    }

    /// Short name used on the command line and in file names
    pub fn slug(&self) -> &'static str {
        match self {
            Self::RestingHeartRate => "resting-hr",
            Self::HeartRate => "heart-rate",
            Self::HeartRateVariability => "hrv",
            Self::OxygenSaturation => "oxygen",
            Self::Sleep => "sleep",
            Self::ActiveEnergy => "energy",
            Self::Steps => "steps",
            Self::BloodPressureSystolic => "systolic",
            Self::BloodPressureDiastolic => "diastolic",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.to_lowercase();
        let kind = match needle.as_str() {
            "resting-hr" | "resting_heart_rate" | "rhr" => Self::RestingHeartRate,
            "heart-rate" | "hr" => Self::HeartRate,
            "hrv" => Self::HeartRateVariability,
            "oxygen" | "spo2" | "o2" => Self::OxygenSaturation,
            "sleep" => Self::Sleep,
            "energy" | "calories" | "active-energy" => Self::ActiveEnergy,
            "steps" => Self::Steps,
            "systolic" => Self::BloodPressureSystolic,
            "diastolic" => Self::BloodPressureDiastolic,
            _ => match Self::from_identifier(s) {
                Some(kind) => kind,
                None => anyhow::bail!("Unknown metric: {}", s),
            },
        };
        Ok(kind)
    }
}

/// Value carried by a record once ingested
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordValue {
    /// Numeric sample or additive amount, already scaled
    Quantity(f64),
    /// Length of an interval record
    Duration { hours: f64 },
}

impl RecordValue {
    /// Numeric contribution of the record (hours for intervals)
    pub fn amount(&self) -> f64 {
        match self {
            Self::Quantity(v) => *v,
            Self::Duration { hours } => *hours,
        }
    }
}

/// A single observation from the export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub kind: MetricKind,

    /// Start of the observation; decides the period the record lands in
    pub start: Timestamp,

    /// End of the observation (interval records only)
    pub end: Option<Timestamp>,

    pub value: RecordValue,
}

impl HealthRecord {
    /// Create a sampled or additive record
    pub fn quantity(kind: MetricKind, start: Timestamp, value: f64) -> Self {
        Self {
            kind,
            start,
            end: None,
            value: RecordValue::Quantity(value),
        }
    }

    /// Create an interval record, deriving the duration from its own start and end
    pub fn interval(kind: MetricKind, start: Timestamp, end: Timestamp) -> Self {
        let hours = (end - start).num_seconds() as f64 / 3600.0;
        Self {
            kind,
            start,
            end: Some(end),
            value: RecordValue::Duration { hours },
        }
    }

    pub fn amount(&self) -> f64 {
        self.value.amount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::parse_timestamp;

    #[test]
    fn test_identifier_round_trip_for_every_kind() {
        for kind in MetricKind::ALL {
            assert_eq!(MetricKind::from_identifier(kind.identifier()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_identifier() {
        assert_eq!(MetricKind::from_identifier("HKQuantityTypeIdentifierBodyMass"), None);
        assert_eq!(MetricKind::from_identifier(""), None);
    }

    #[test]
    fn test_rules() {
        assert_eq!(
            MetricKind::OxygenSaturation.rule(),
            AccumulationRule::Sampled { scale: 100.0 }
        );
        assert_eq!(MetricKind::Steps.rule(), AccumulationRule::Additive);
        assert_eq!(MetricKind::Sleep.rule(), AccumulationRule::Interval);
        assert_eq!(
            MetricKind::HeartRateVariability.rule(),
            AccumulationRule::Sampled { scale: 1.0 }
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("oxygen".parse::<MetricKind>().unwrap(), MetricKind::OxygenSaturation);
        assert_eq!("HRV".parse::<MetricKind>().unwrap(), MetricKind::HeartRateVariability);
        assert_eq!(
            "HKQuantityTypeIdentifierStepCount".parse::<MetricKind>().unwrap(),
            MetricKind::Steps
        );
        assert!("weight".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_interval_duration() {
        let start = parse_timestamp("2024-01-01 23:00:00 +0800").unwrap();
        let end = parse_timestamp("2024-01-02 06:30:00 +0800").unwrap();
        let record = HealthRecord::interval(MetricKind::Sleep, start, end);
        assert!((record.amount() - 7.5).abs() < 1e-9);
        assert_eq!(record.end, Some(end));
    }
}
