//! Record type census

use crate::ingest::RecordSink;
use serde::Serialize;
use std::collections::HashMap;
use vitalscope_shared::types::record::{HealthRecord, MetricKind};

/// Counts every record type identifier seen, recognized or not
#[derive(Debug, Clone, Default)]
pub struct TypeCensus {
    counts: HashMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub identifier: String,
    pub count: u64,
    /// Metric the type is aggregated as, if any
    pub kind: Option<MetricKind>,
}

impl TypeCensus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Types by count, most common first; ties by identifier
    pub fn ranked(&self) -> Vec<TypeCount> {
        let mut ranked: Vec<TypeCount> = self
            .counts
            .iter()
            .map(|(identifier, &count)| TypeCount {
                identifier: identifier.clone(),
                count,
                kind: MetricKind::from_identifier(identifier),
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.identifier.cmp(&b.identifier)));
        ranked
    }
}

impl RecordSink for TypeCensus {
    fn accept(&mut self, _record: &HealthRecord) {}

    fn observe_type(&mut self, identifier: &str) {
        match self.counts.get_mut(identifier) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(identifier.to_string(), 1);
            }
        }
    }
}
