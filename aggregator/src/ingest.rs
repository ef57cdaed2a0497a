//! Streaming ingestion of health exports
//!
//! Reads `Record` elements from an XML export in a single forward pass and hands
//! each accepted record to a [`RecordSink`]. The document tree is never built:
//! one event buffer is reused for every XML event and cleared as soon as the
//! event has been handled, so memory is bounded by what the sinks keep.

use crate::error::{IngestError, SkipReason};
use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};
use vitalscope_shared::types::record::{AccumulationRule, HealthRecord, MetricKind};
use vitalscope_shared::utils::group_thousands;
use vitalscope_shared::utils::time::parse_timestamp;

const RECORD_TAG: &[u8] = b"Record";

/// Read buffer for the export file
const READ_CAPACITY: usize = 64 * 1024;

/// Consumer of ingested records.
///
/// Sinks must fold each record into bounded state; the record is dropped by the
/// ingestor right after `accept` returns.
pub trait RecordSink {
    fn accept(&mut self, record: &HealthRecord);

    /// Called with the raw type identifier of every sampled-in `Record`,
    /// recognized or not.
    fn observe_type(&mut self, _identifier: &str) {}
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn accept(&mut self, record: &HealthRecord) {
        (**self).accept(record)
    }

    fn observe_type(&mut self, identifier: &str) {
        (**self).observe_type(identifier)
    }
}

/// Fan a single pass out to two sinks
impl<A: RecordSink, B: RecordSink> RecordSink for (A, B) {
    fn accept(&mut self, record: &HealthRecord) {
        self.0.accept(record);
        self.1.accept(record);
    }

    fn observe_type(&mut self, identifier: &str) {
        self.0.observe_type(identifier);
        self.1.observe_type(identifier);
    }
}

/// Ingestion options
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Emit a progress notification every N `Record` elements (0 disables)
    pub progress_every: u64,

    /// Keep every Nth `Record` element (1 keeps all)
    pub sample_every: u64,

    /// Drop records that start before this date
    pub since: Option<NaiveDate>,

    /// Interval records must be shorter than this many hours
    pub sleep_ceiling_hours: f64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            progress_every: 50_000,
            sample_every: 1,
            since: None,
            sleep_ceiling_hours: 24.0,
        }
    }
}

/// Counters for a completed ingestion pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    /// `Record` elements seen
    pub processed: u64,

    /// Records handed to the sink
    pub accepted: u64,

    /// Well-formed records whose type is not aggregated
    pub unrecognized: u64,

    /// Records before the lookback cutoff
    pub filtered: u64,

    /// Records skipped by sampling
    pub sampled_out: u64,

    /// Dropped records by reason
    pub skipped: BTreeMap<SkipReason, u64>,
}

impl IngestStats {
    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }

    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }
}

/// Attribute values of one `Record` element, borrowed from the event buffer
#[derive(Debug, Default)]
struct RawRecord<'a> {
    record_type: Option<Cow<'a, str>>,
    start: Option<Cow<'a, str>>,
    end: Option<Cow<'a, str>>,
    value: Option<Cow<'a, str>>,
}

impl<'a> RawRecord<'a> {
    fn from_element(element: &'a BytesStart<'a>) -> Result<Self, SkipReason> {
        let mut raw = RawRecord::default();
        for attr in element.attributes() {
            let attr = attr.map_err(|_| SkipReason::MalformedAttribute)?;
            let slot = match attr.key.as_ref() {
                b"type" => &mut raw.record_type,
                b"startDate" => &mut raw.start,
                b"endDate" => &mut raw.end,
                b"value" => &mut raw.value,
                _ => continue,
            };
            *slot = Some(
                attr.unescape_value()
                    .map_err(|_| SkipReason::MalformedAttribute)?,
            );
        }
        Ok(raw)
    }
}

/// Turn raw attributes into a record. `Ok(None)` means the type is not aggregated.
fn classify(raw: &RawRecord<'_>, options: &IngestOptions) -> Result<Option<HealthRecord>, SkipReason> {
    let identifier = raw.record_type.as_deref().ok_or(SkipReason::MissingType)?;
    let Some(kind) = MetricKind::from_identifier(identifier) else {
        return Ok(None);
    };

    let start = raw.start.as_deref().ok_or(SkipReason::MissingStartDate)?;
    let value = raw.value.as_deref().ok_or(SkipReason::MissingValue)?;
    let start = parse_timestamp(start).map_err(|_| SkipReason::InvalidTimestamp)?;

    let record = match kind.rule() {
        AccumulationRule::Sampled { scale } => {
            HealthRecord::quantity(kind, start, parse_value(value)? * scale)
        }
        AccumulationRule::Additive => HealthRecord::quantity(kind, start, parse_value(value)?),
        AccumulationRule::Interval => {
            // The value of an interval record is a category; only its span matters
            let end = raw.end.as_deref().ok_or(SkipReason::MissingEndDate)?;
            let end = parse_timestamp(end).map_err(|_| SkipReason::InvalidTimestamp)?;
            let record = HealthRecord::interval(kind, start, end);
            let hours = record.amount();
            if !(hours > 0.0 && hours < options.sleep_ceiling_hours) {
                return Err(SkipReason::DurationOutOfRange);
            }
            record
        }
    };
    Ok(Some(record))
}

fn parse_value(s: &str) -> Result<f64, SkipReason> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(SkipReason::InvalidValue)
}

/// Single-pass export reader
pub struct Ingestor<'a> {
    options: IngestOptions,
    progress: Option<Box<dyn FnMut(u64) + 'a>>,
}

impl<'a> Ingestor<'a> {
    pub fn new(options: IngestOptions) -> Self {
        Self {
            options,
            progress: None,
        }
    }

    /// Register a callback invoked with the processed count at every progress step
    pub fn on_progress(mut self, callback: impl FnMut(u64) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Ingest an export file
    pub fn ingest_path<S: RecordSink + ?Sized>(
        &mut self,
        path: &Path,
        sink: &mut S,
    ) -> Result<IngestStats, IngestError> {
        info!("Starting to parse {}", path.display());
        let file = File::open(path).map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.ingest_reader(BufReader::with_capacity(READ_CAPACITY, file), sink)
    }

    /// Ingest from any buffered reader
    pub fn ingest_reader<R: BufRead, S: RecordSink + ?Sized>(
        &mut self,
        source: R,
        sink: &mut S,
    ) -> Result<IngestStats, IngestError> {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);
        reader.check_end_names(true);

        let mut buf = Vec::with_capacity(4096);
        let mut stats = IngestStats::default();
        let mut depth: usize = 0;
        let mut seen_root = false;

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    return Err(IngestError::Malformed {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })
                }
            };

            match event {
                Event::Start(element) => {
                    if depth == 0 {
                        open_root(&mut seen_root, reader.buffer_position())?;
                    }
                    depth += 1;
                    if element.name().as_ref() == RECORD_TAG {
                        self.handle_record(&element, sink, &mut stats);
                    }
                }
                Event::Empty(element) => {
                    if depth == 0 {
                        open_root(&mut seen_root, reader.buffer_position())?;
                    } else if element.name().as_ref() == RECORD_TAG {
                        self.handle_record(&element, sink, &mut stats);
                    }
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Text(_) | Event::CData(_) if depth == 0 => {
                    return Err(IngestError::Malformed {
                        position: reader.buffer_position(),
                        message: "content outside the root element".to_string(),
                    });
                }
                Event::Eof => break,
                _ => {}
            }

            buf.clear();
        }

        if depth != 0 {
            return Err(IngestError::Malformed {
                position: reader.buffer_position(),
                message: format!("unexpected end of document with {} unclosed element(s)", depth),
            });
        }
        if !seen_root {
            return Err(IngestError::Malformed {
                position: reader.buffer_position(),
                message: "no root element".to_string(),
            });
        }

        info!(
            "Total records processed: {} ({} accepted, {} skipped)",
            group_thousands(stats.processed),
            group_thousands(stats.accepted),
            group_thousands(stats.skipped_total())
        );
        Ok(stats)
    }

    fn handle_record<S: RecordSink + ?Sized>(
        &mut self,
        element: &BytesStart<'_>,
        sink: &mut S,
        stats: &mut IngestStats,
    ) {
        stats.processed += 1;
        let n = stats.processed;

        if self.options.progress_every > 0 && n % self.options.progress_every == 0 {
            info!("  Processed {} records...", group_thousands(n));
            if let Some(callback) = self.progress.as_mut() {
                callback(n);
            }
        }

        if self.options.sample_every > 1 && n % self.options.sample_every != 0 {
            stats.sampled_out += 1;
            return;
        }

        let raw = match RawRecord::from_element(element) {
            Ok(raw) => raw,
            Err(reason) => {
                debug!("Skipping record #{}: {}", n, reason);
                stats.skip(reason);
                return;
            }
        };
        if let Some(identifier) = raw.record_type.as_deref() {
            sink.observe_type(identifier);
        }

        match classify(&raw, &self.options) {
            Ok(Some(record)) => {
                if self
                    .options
                    .since
                    .is_some_and(|since| record.start.date_naive() < since)
                {
                    stats.filtered += 1;
                    return;
                }
                sink.accept(&record);
                stats.accepted += 1;
            }
            Ok(None) => stats.unrecognized += 1,
            Err(reason) => {
                debug!("Skipping record #{}: {}", n, reason);
                stats.skip(reason);
            }
        }
    }
}

fn open_root(seen_root: &mut bool, position: usize) -> Result<(), IngestError> {
    if *seen_root {
        return Err(IngestError::Malformed {
            position,
            message: "multiple root elements".to_string(),
        });
    }
    *seen_root = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalscope_shared::types::record::RecordValue;

    #[derive(Default)]
    struct Collect {
        records: Vec<HealthRecord>,
        types: Vec<String>,
    }

    impl RecordSink for Collect {
        fn accept(&mut self, record: &HealthRecord) {
            self.records.push(record.clone());
        }

        fn observe_type(&mut self, identifier: &str) {
            self.types.push(identifier.to_string());
        }
    }

    fn export(records: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<HealthData locale=\"en_US\">\n{}\n</HealthData>\n",
            records
        )
    }

    fn run(xml: &str, options: IngestOptions) -> (Result<IngestStats, IngestError>, Collect) {
        let mut sink = Collect::default();
        let result = Ingestor::new(options).ingest_reader(xml.as_bytes(), &mut sink);
        (result, sink)
    }

    #[test]
    fn test_oxygen_is_rescaled_to_percent() {
        let xml = export(
            r#"<Record type="HKQuantityTypeIdentifierOxygenSaturation" startDate="2024-01-01 08:00:00 +0000" value="0.97"/>"#,
        );
        let (result, sink) = run(&xml, IngestOptions::default());
        let stats = result.unwrap();
        assert_eq!(stats.accepted, 1);
        assert!((sink.records[0].amount() - 97.0).abs() < 1e-9);
    }

    #[test]
    fn test_sleep_interval_duration() {
        let xml = export(
            r#"<Record type="HKCategoryTypeIdentifierSleepAnalysis" startDate="2024-01-01 23:00:00 +0800" endDate="2024-01-02 06:30:00 +0800" value="HKCategoryValueSleepAnalysisAsleep"/>"#,
        );
        let (result, sink) = run(&xml, IngestOptions::default());
        assert_eq!(result.unwrap().accepted, 1);
        let record = &sink.records[0];
        assert_eq!(record.value, RecordValue::Duration { hours: 7.5 });
        assert_eq!(
            record.start.date_naive(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_sleep_over_ceiling_is_rejected() {
        let xml = export(concat!(
            r#"<Record type="HKCategoryTypeIdentifierSleepAnalysis" startDate="2024-01-01 20:00:00 +0000" endDate="2024-01-02 21:00:00 +0000" value="InBed"/>"#,
            r#"<Record type="HKCategoryTypeIdentifierSleepAnalysis" startDate="2024-01-01 20:00:00 +0000" endDate="2024-01-01 20:00:00 +0000" value="InBed"/>"#,
            r#"<Record type="HKCategoryTypeIdentifierSleepAnalysis" startDate="2024-01-01 20:00:00 +0000" value="InBed"/>"#,
        ));
        let (result, sink) = run(&xml, IngestOptions::default());
        let stats = result.unwrap();
        assert!(sink.records.is_empty());
        assert_eq!(stats.skipped[&SkipReason::DurationOutOfRange], 2);
        assert_eq!(stats.skipped[&SkipReason::MissingEndDate], 1);
    }

    #[test]
    fn test_bad_records_are_skipped_and_counted() {
        let xml = export(concat!(
            r#"<Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 08:00:00 +0000"/>"#,
            r#"<Record type="HKQuantityTypeIdentifierStepCount" startDate="not a date" value="10"/>"#,
            r#"<Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 08:00:00 +0000" value="ten"/>"#,
            r#"<Record type="HKQuantityTypeIdentifierStepCount" value="10"/>"#,
            r#"<Record startDate="2024-01-01 08:00:00 +0000" value="10"/>"#,
            r#"<Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 09:00:00 +0000" value="1200"/>"#,
        ));
        let (result, sink) = run(&xml, IngestOptions::default());
        let stats = result.unwrap();

        assert_eq!(stats.processed, 6);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.skipped_total(), 5);
        assert_eq!(stats.skipped[&SkipReason::MissingValue], 1);
        assert_eq!(stats.skipped[&SkipReason::InvalidTimestamp], 1);
        assert_eq!(stats.skipped[&SkipReason::InvalidValue], 1);
        assert_eq!(stats.skipped[&SkipReason::MissingStartDate], 1);
        assert_eq!(stats.skipped[&SkipReason::MissingType], 1);
        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.records[0].amount(), 1200.0);
    }

    #[test]
    fn test_unrecognized_types_are_observed_not_accepted() {
        let xml = export(concat!(
            r#"<Record type="HKQuantityTypeIdentifierBodyMass" startDate="2024-01-01 08:00:00 +0000" value="70"/>"#,
            r#"<Record type="HKQuantityTypeIdentifierRestingHeartRate" startDate="2024-01-01 08:00:00 +0000" value="58"/>"#,
        ));
        let (result, sink) = run(&xml, IngestOptions::default());
        let stats = result.unwrap();
        assert_eq!(stats.unrecognized, 1);
        assert_eq!(stats.accepted, 1);
        assert_eq!(sink.types.len(), 2);
        assert_eq!(sink.types[0], "HKQuantityTypeIdentifierBodyMass");
    }

    #[test]
    fn test_records_with_children_and_doctype() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE HealthData [
<!ELEMENT HealthData (Record*)>
]>
<HealthData locale="en_US">
 <ExportDate value="2024-02-01 10:00:00 +0000"/>
 <Record type="HKQuantityTypeIdentifierHeartRateVariabilitySDNN" startDate="2024-01-01 08:00:00 +0000" endDate="2024-01-01 08:01:00 +0000" value="42.5">
  <MetadataEntry key="HKMetadataKeySyncVersion" value="2"/>
  <HeartRateVariabilityMetadataList>
   <InstantaneousBeatsPerMinute bpm="61" time="8:00:01.00 AM"/>
  </HeartRateVariabilityMetadataList>
 </Record>
</HealthData>"#;
        let (result, sink) = run(xml, IngestOptions::default());
        let stats = result.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(sink.records[0].kind, MetricKind::HeartRateVariability);
        assert_eq!(sink.records[0].amount(), 42.5);
    }

    #[test]
    fn test_escaped_attribute_values() {
        let xml = export(
            r#"<Record type="HKQuantityTypeIdentifierStepCount" sourceName="Bob&apos;s Watch" startDate="2024-01-01 08:00:00 +0000" value="&#x31;0"/>"#,
        );
        let (result, sink) = run(&xml, IngestOptions::default());
        assert_eq!(result.unwrap().accepted, 1);
        assert_eq!(sink.records[0].amount(), 10.0);
    }

    #[test]
    fn test_empty_document_is_well_formed() {
        let (result, sink) = run("<HealthData/>", IngestOptions::default());
        let stats = result.unwrap();
        assert_eq!(stats.processed, 0);
        assert!(sink.records.is_empty());
    }

    #[test]
    fn test_malformed_documents_are_fatal() {
        let cases = [
            "",
            "not xml at all",
            "<HealthData><Record type=\"x\"></HealthData>",
            "<HealthData><Record type=\"HKQuantityTypeIdentifierStepCount\" value=\"1\"/>",
            "<HealthData/><HealthData/>",
        ];
        for xml in cases {
            let (result, _) = run(xml, IngestOptions::default());
            assert!(
                matches!(result, Err(IngestError::Malformed { .. })),
                "expected malformed error for {:?}",
                xml
            );
        }
    }

    #[test]
    fn test_sampling_keeps_every_nth_record() {
        let records: String = (1..=10)
            .map(|i| {
                format!(
                    r#"<Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 08:00:00 +0000" value="{}"/>"#,
                    i
                )
            })
            .collect();
        let options = IngestOptions {
            sample_every: 5,
            ..Default::default()
        };
        let (result, sink) = run(&export(&records), options);
        let stats = result.unwrap();
        assert_eq!(stats.processed, 10);
        assert_eq!(stats.sampled_out, 8);
        let values: Vec<f64> = sink.records.iter().map(|r| r.amount()).collect();
        assert_eq!(values, vec![5.0, 10.0]);
    }

    #[test]
    fn test_since_filter() {
        let xml = export(concat!(
            r#"<Record type="HKQuantityTypeIdentifierStepCount" startDate="2023-12-31 23:59:00 +0000" value="1"/>"#,
            r#"<Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 00:00:00 +0000" value="2"/>"#,
        ));
        let options = IngestOptions {
            since: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        let (result, sink) = run(&xml, options);
        let stats = result.unwrap();
        assert_eq!(stats.filtered, 1);
        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.records[0].amount(), 2.0);
    }

    #[test]
    fn test_progress_callback() {
        let records: String = (0..7)
            .map(|_| r#"<Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 08:00:00 +0000" value="1"/>"#)
            .collect();
        let options = IngestOptions {
            progress_every: 3,
            ..Default::default()
        };
        let mut seen = Vec::new();
        let mut sink = Collect::default();
        {
            let mut ingestor = Ingestor::new(options).on_progress(|n| seen.push(n));
            ingestor
                .ingest_reader(export(&records).as_bytes(), &mut sink)
                .unwrap();
        }
        assert_eq!(seen, vec![3, 6]);
        assert_eq!(sink.records.len(), 7);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let mut sink = Collect::default();
        let result = Ingestor::new(IngestOptions::default())
            .ingest_path(Path::new("/definitely/not/here.xml"), &mut sink);
        assert!(matches!(result, Err(IngestError::Open { .. })));
    }

    #[test]
    fn test_fan_out_to_two_sinks() {
        let xml = export(
            r#"<Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 08:00:00 +0000" value="5"/>"#,
        );
        let mut pair = (Collect::default(), Collect::default());
        Ingestor::new(IngestOptions::default())
            .ingest_reader(xml.as_bytes(), &mut pair)
            .unwrap();
        assert_eq!(pair.0.records.len(), 1);
        assert_eq!(pair.1.records.len(), 1);
    }
}
