//! Blood pressure pairing and classification
//!
//! Systolic and diastolic values arrive as separate records. Readings taken at
//! the same instant are paired; an unmatched half waits until its partner
//! arrives, so pending state is bounded by the number of unmatched readings.

use crate::config::Thresholds;
use crate::ingest::RecordSink;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use vitalscope_shared::types::record::{HealthRecord, MetricKind, Timestamp};

/// Blood pressure category of a paired reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BpCategory {
    Normal,
    Elevated,
    Stage1,
    Stage2,
    Crisis,
}

impl BpCategory {
    pub const ALL: [BpCategory; 5] = [
        BpCategory::Normal,
        BpCategory::Elevated,
        BpCategory::Stage1,
        BpCategory::Stage2,
        BpCategory::Crisis,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Elevated => "Elevated",
            Self::Stage1 => "High Stage 1",
            Self::Stage2 => "High Stage 2",
            Self::Crisis => "Crisis",
        }
    }
}

/// Classify a reading; the worse of the systolic and diastolic categories wins
pub fn classify(systolic: f64, diastolic: f64, thresholds: &Thresholds) -> BpCategory {
    if systolic >= thresholds.systolic_crisis || diastolic >= thresholds.diastolic_crisis {
        BpCategory::Crisis
    } else if systolic >= thresholds.systolic_high || diastolic >= thresholds.diastolic_high {
        BpCategory::Stage2
    } else if systolic >= thresholds.systolic_elevated
        || diastolic >= thresholds.diastolic_normal_max
    {
        BpCategory::Stage1
    } else if systolic >= thresholds.systolic_normal_max {
        BpCategory::Elevated
    } else {
        BpCategory::Normal
    }
}

/// A paired reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BpReading {
    pub at: Timestamp,
    pub systolic: f64,
    pub diastolic: f64,
    pub pulse_pressure: f64,
    pub category: BpCategory,
}

#[derive(Debug, Default)]
struct Pending {
    systolic: VecDeque<f64>,
    diastolic: VecDeque<f64>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.systolic.is_empty() && self.diastolic.is_empty()
    }
}

pub struct BloodPressurePairer {
    thresholds: Thresholds,
    pending: HashMap<Timestamp, Pending>,
    readings: Vec<BpReading>,
}

impl BloodPressurePairer {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            thresholds: thresholds.clone(),
            pending: HashMap::new(),
            readings: Vec::new(),
        }
    }

    fn pair(&mut self, at: Timestamp, systolic: f64, diastolic: f64) {
        self.readings.push(BpReading {
            at,
            systolic,
            diastolic,
            pulse_pressure: systolic - diastolic,
            category: classify(systolic, diastolic, &self.thresholds),
        });
    }

    /// Sorted readings plus the category distribution
    pub fn finish(mut self) -> BloodPressureReport {
        let unmatched = self
            .pending
            .values()
            .map(|p| (p.systolic.len() + p.diastolic.len()) as u64)
            .sum();

        self.readings.sort_by_key(|r| r.at);

        let mut distribution: BTreeMap<BpCategory, u64> = BTreeMap::new();
        for reading in &self.readings {
            *distribution.entry(reading.category).or_insert(0) += 1;
        }

        BloodPressureReport {
            readings: self.readings,
            distribution,
            unmatched,
        }
    }
}

impl RecordSink for BloodPressurePairer {
    fn accept(&mut self, record: &HealthRecord) {
        let value = record.amount();
        let at = record.start;
        let pending = self.pending.entry(at).or_default();

        let paired = match record.kind {
            MetricKind::BloodPressureSystolic => match pending.diastolic.pop_front() {
                Some(diastolic) => Some((value, diastolic)),
                None => {
                    pending.systolic.push_back(value);
                    None
                }
            },
            MetricKind::BloodPressureDiastolic => match pending.systolic.pop_front() {
                Some(systolic) => Some((systolic, value)),
                None => {
                    pending.diastolic.push_back(value);
                    None
                }
            },
            _ => None,
        };

        if pending.is_empty() {
            self.pending.remove(&at);
        }
        if let Some((systolic, diastolic)) = paired {
            self.pair(at, systolic, diastolic);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BloodPressureReport {
    pub readings: Vec<BpReading>,
    pub distribution: BTreeMap<BpCategory, u64>,
    /// Halves that never found a partner
    pub unmatched: u64,
}

impl BloodPressureReport {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    fn average(&self, f: impl Fn(&BpReading) -> f64) -> Option<f64> {
        if self.readings.is_empty() {
            return None;
        }
        Some(self.readings.iter().map(f).sum::<f64>() / self.readings.len() as f64)
    }

    pub fn mean_systolic(&self) -> Option<f64> {
        self.average(|r| r.systolic)
    }

    pub fn mean_diastolic(&self) -> Option<f64> {
        self.average(|r| r.diastolic)
    }

    pub fn mean_pulse_pressure(&self) -> Option<f64> {
        self.average(|r| r.pulse_pressure)
    }

    /// Share of readings in a category, in percent
    pub fn share(&self, category: BpCategory) -> Option<f64> {
        if self.readings.is_empty() {
            return None;
        }
        let n = self.distribution.get(&category).copied().unwrap_or(0);
        Some(n as f64 / self.readings.len() as f64 * 100.0)
    }
}
