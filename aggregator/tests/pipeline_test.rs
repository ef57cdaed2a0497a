use anyhow::Result;
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};
use vitalscope_aggregator::blood_pressure::{BloodPressurePairer, BpCategory};
use vitalscope_aggregator::census::TypeCensus;
use vitalscope_aggregator::insights::{history_insights, recent_insights};
use vitalscope_aggregator::output::{chart, json, table};
use vitalscope_aggregator::stats::KeyStatistics;
use vitalscope_aggregator::{
    DailySeries, IngestError, IngestOptions, Ingestor, PeriodAggregator, SkipReason, Thresholds,
};
use vitalscope_shared::types::record::MetricKind;
use vitalscope_shared::types::summary::Granularity;

const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE HealthData [
<!ELEMENT HealthData (ExportDate,Me,(Record|Workout)*)>
]>
<HealthData locale="en_US">
 <ExportDate value="2024-03-01 09:00:00 +0000"/>
 <Me HKCharacteristicTypeIdentifierBiologicalSex="HKBiologicalSexNotSet"/>
 <Record type="HKQuantityTypeIdentifierRestingHeartRate" sourceName="Watch" unit="count/min" startDate="2024-01-05 07:00:00 +0000" endDate="2024-01-05 07:00:00 +0000" value="62"/>
 <Record type="HKQuantityTypeIdentifierRestingHeartRate" sourceName="Watch" unit="count/min" startDate="2024-01-20 07:00:00 +0000" endDate="2024-01-20 07:00:00 +0000" value="58"/>
 <Record type="HKQuantityTypeIdentifierRestingHeartRate" sourceName="Watch" unit="count/min" startDate="2024-02-03 07:00:00 +0000" endDate="2024-02-03 07:00:00 +0000" value="57"/>
 <Record type="HKQuantityTypeIdentifierOxygenSaturation" sourceName="Watch" unit="%" startDate="2024-01-05 03:00:00 +0000" endDate="2024-01-05 03:00:00 +0000" value="0.97"/>
 <Record type="HKQuantityTypeIdentifierOxygenSaturation" sourceName="Watch" unit="%" startDate="2024-01-06 03:00:00 +0000" endDate="2024-01-06 03:00:00 +0000" value="0.89"/>
 <Record type="HKQuantityTypeIdentifierStepCount" sourceName="Phone" unit="count" startDate="2024-01-05 10:00:00 +0000" endDate="2024-01-05 11:00:00 +0000" value="6200"/>
 <Record type="HKQuantityTypeIdentifierStepCount" sourceName="Phone" unit="count" startDate="2024-01-05 18:00:00 +0000" endDate="2024-01-05 19:00:00 +0000" value="3800"/>
 <Record type="HKQuantityTypeIdentifierStepCount" sourceName="Phone" unit="count" startDate="2024-02-10 10:00:00 +0000" endDate="2024-02-10 11:00:00 +0000" value="not-a-number"/>
 <Record type="HKQuantityTypeIdentifierActiveEnergyBurned" sourceName="Watch" unit="kcal" startDate="2024-01-05 10:00:00 +0000" endDate="2024-01-05 11:00:00 +0000" value="520.5"/>
 <Record type="HKCategoryTypeIdentifierSleepAnalysis" sourceName="Watch" startDate="2024-01-31 23:00:00 +0000" endDate="2024-02-01 06:30:00 +0000" value="HKCategoryValueSleepAnalysisAsleepCore"/>
 <Record type="HKCategoryTypeIdentifierSleepAnalysis" sourceName="Watch" startDate="2024-02-01 20:00:00 +0000" endDate="2024-02-03 20:00:00 +0000" value="HKCategoryValueSleepAnalysisInBed"/>
 <Record type="HKQuantityTypeIdentifierBloodPressureSystolic" sourceName="Cuff" unit="mmHg" startDate="2024-02-04 08:00:00 +0000" endDate="2024-02-04 08:00:00 +0000" value="142"/>
 <Record type="HKQuantityTypeIdentifierBloodPressureDiastolic" sourceName="Cuff" unit="mmHg" startDate="2024-02-04 08:00:00 +0000" endDate="2024-02-04 08:00:00 +0000" value="88"/>
 <Record type="HKQuantityTypeIdentifierHeartRateVariabilitySDNN" sourceName="Watch" unit="ms" startDate="2024-02-04 03:00:00 +0000" endDate="2024-02-04 03:01:00 +0000" value="41.5">
  <HeartRateVariabilityMetadataList>
   <InstantaneousBeatsPerMinute bpm="58" time="3:00:01.50 AM"/>
  </HeartRateVariabilityMetadataList>
 </Record>
 <Record type="HKQuantityTypeIdentifierBodyMass" sourceName="Scale" unit="kg" startDate="2024-02-04 08:00:00 +0000" endDate="2024-02-04 08:00:00 +0000" value="70.2"/>
 <Workout workoutActivityType="HKWorkoutActivityTypeWalking" duration="30" startDate="2024-02-05 08:00:00 +0000" endDate="2024-02-05 08:30:00 +0000"/>
</HealthData>
"#;

fn write_export(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_history_pipeline() -> Result<()> {
    let export = write_export(EXPORT)?;
    let thresholds = Thresholds::default();

    let mut sinks = (
        PeriodAggregator::new(Granularity::Month),
        (KeyStatistics::new(&thresholds), TypeCensus::new()),
    );
    let stats = Ingestor::new(IngestOptions::default()).ingest_path(export.path(), &mut sinks)?;

    assert_eq!(stats.processed, 15);
    assert_eq!(stats.accepted, 12);
    assert_eq!(stats.unrecognized, 1);
    assert_eq!(stats.skipped[&SkipReason::InvalidValue], 1);
    assert_eq!(stats.skipped[&SkipReason::DurationOutOfRange], 1);

    let (monthly, (key_stats, census)) = sinks;
    let rows = monthly.finish();
    assert_eq!(rows.len(), 2);

    let january = &rows[0];
    assert_eq!(january.period.to_string(), "2024-01");
    assert_eq!(january.mean(MetricKind::RestingHeartRate), Some(60.0));
    assert_eq!(january.total(MetricKind::Steps), Some(10_000.0));
    assert!((january.min(MetricKind::OxygenSaturation).unwrap() - 89.0).abs() < 1e-9);
    // the overnight interval belongs to the month it started in
    assert_eq!(january.total(MetricKind::Sleep), Some(7.5));

    let february = &rows[1];
    assert_eq!(february.total(MetricKind::Sleep), None);
    assert_eq!(february.mean(MetricKind::HeartRateVariability), Some(41.5));
    assert_eq!(february.total(MetricKind::Steps), None);

    let report = key_stats.scaled(1);
    assert_eq!(report.oxygen.below_critical, 1);
    assert_eq!(report.blood_pressure.systolic_high, 1);

    let ranked = census.ranked();
    // ties are ordered by identifier
    assert_eq!(ranked[0].identifier, "HKQuantityTypeIdentifierRestingHeartRate");
    assert_eq!(ranked[1].identifier, "HKQuantityTypeIdentifierStepCount");
    assert_eq!(ranked[1].count, 3);
    assert_eq!(census.total(), 15);

    let insights = history_insights(&rows, &thresholds);
    assert_eq!(insights.concerns.low_oxygen.len(), 1);
    assert!(insights.long_term.is_empty());

    let out = tempdir()?;
    let csv = out.path().join("monthly_health_summary.csv");
    table::write_summary_csv(&rows, &csv)?;
    assert_eq!(std::fs::read_to_string(&csv)?.lines().count(), 3);

    let svg = out.path().join("history.svg");
    let panel = chart::Panel::new("Resting Heart Rate", "BPM").line(
        "Monthly mean",
        &DailySeries::from_rows(&rows, MetricKind::RestingHeartRate),
        chart::RED,
    );
    chart::render_panels("History", &[panel], &svg)?;
    assert!(svg.exists());

    let json_path = out.path().join("summary.json");
    json::write_json(&rows, &json_path)?;
    let parsed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
    assert_eq!(parsed.as_array().map(|a| a.len()), Some(2));

    Ok(())
}

#[test]
fn test_daily_pipeline_with_lookback() -> Result<()> {
    let export = write_export(EXPORT)?;
    let thresholds = Thresholds::default();

    let options = IngestOptions {
        since: chrono::NaiveDate::from_ymd_opt(2024, 2, 1),
        ..Default::default()
    };
    let mut sinks = (
        PeriodAggregator::new(Granularity::Day),
        BloodPressurePairer::new(&thresholds),
    );
    let stats = Ingestor::new(options).ingest_path(export.path(), &mut sinks)?;
    assert_eq!(stats.filtered, 8);

    let (daily, pairer) = sinks;
    let rows = daily.finish();
    let series: BTreeMap<MetricKind, DailySeries> = MetricKind::ALL
        .iter()
        .map(|kind| (*kind, DailySeries::from_rows(&rows, *kind)))
        .filter(|(_, s)| !s.is_empty())
        .collect();
    assert!(series.contains_key(&MetricKind::RestingHeartRate));
    assert!(!series.contains_key(&MetricKind::Steps));

    let recent = recent_insights(&series, 30, &thresholds);
    assert_eq!(recent.low_oxygen_days, None);

    let bp = pairer.finish();
    assert_eq!(bp.readings.len(), 1);
    assert_eq!(bp.readings[0].category, BpCategory::Stage2);
    assert_eq!(bp.readings[0].pulse_pressure, 54.0);
    Ok(())
}

#[test]
fn test_empty_export_reports_no_data() -> Result<()> {
    let export = write_export("<?xml version=\"1.0\"?>\n<HealthData locale=\"en_US\">\n</HealthData>\n")?;

    let mut monthly = PeriodAggregator::new(Granularity::Month);
    let stats = Ingestor::new(IngestOptions::default()).ingest_path(export.path(), &mut monthly)?;
    assert_eq!(stats.processed, 0);

    let rows = monthly.finish();
    assert!(rows.is_empty());
    let series = DailySeries::from_rows(&rows, MetricKind::OxygenSaturation);
    assert_eq!(series.mean(), None);
    Ok(())
}

#[test]
fn test_truncated_export_is_fatal() -> Result<()> {
    let truncated = &EXPORT[..EXPORT.len() / 2];
    let export = write_export(truncated)?;

    let mut monthly = PeriodAggregator::new(Granularity::Month);
    let result = Ingestor::new(IngestOptions::default()).ingest_path(export.path(), &mut monthly);
    assert!(matches!(result, Err(IngestError::Malformed { .. })));
    Ok(())
}
