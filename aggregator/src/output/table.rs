//! CSV tables
//!
//! Periods or days without data for a column are written as empty cells.

use crate::series::DailySeries;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;
use vitalscope_shared::types::record::MetricKind;
use vitalscope_shared::types::summary::SummaryRow;

#[derive(Clone, Copy)]
enum Stat {
    Mean,
    Min,
    DailyAverage,
}

const SUMMARY_COLUMNS: [(&str, MetricKind, Stat); 11] = [
    ("avg_resting_hr", MetricKind::RestingHeartRate, Stat::Mean),
    ("min_resting_hr", MetricKind::RestingHeartRate, Stat::Min),
    ("avg_hrv", MetricKind::HeartRateVariability, Stat::Mean),
    ("avg_oxygen", MetricKind::OxygenSaturation, Stat::Mean),
    ("min_oxygen", MetricKind::OxygenSaturation, Stat::Min),
    ("avg_daily_steps", MetricKind::Steps, Stat::DailyAverage),
    ("avg_daily_calories", MetricKind::ActiveEnergy, Stat::DailyAverage),
    ("avg_sleep_hours", MetricKind::Sleep, Stat::DailyAverage),
    ("avg_heart_rate", MetricKind::HeartRate, Stat::Mean),
    ("avg_systolic", MetricKind::BloodPressureSystolic, Stat::Mean),
    ("avg_diastolic", MetricKind::BloodPressureDiastolic, Stat::Mean),
];

fn column_value(row: &SummaryRow, kind: MetricKind, stat: Stat) -> Option<f64> {
    match stat {
        Stat::Mean => row.mean(kind),
        Stat::Min => row.min(kind),
        Stat::DailyAverage => row.daily_average(kind),
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn create_writer(output_path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(output_path)
        .with_context(|| format!("Failed to create table file: {}", output_path.display()))
}

/// Write one line per period summary
pub fn write_summary_csv(rows: &[SummaryRow], output_path: &Path) -> Result<()> {
    info!("Writing summary table: {}", output_path.display());
    let mut writer = create_writer(output_path)?;

    let header = ["period", "days", "record_count"]
        .into_iter()
        .chain(SUMMARY_COLUMNS.iter().map(|(name, _, _)| *name));
    writer.write_record(header)?;

    for row in rows {
        let mut record = vec![
            row.period.to_string(),
            row.days_in_period.to_string(),
            row.record_count.to_string(),
        ];
        record.extend(
            SUMMARY_COLUMNS
                .iter()
                .map(|&(_, kind, stat)| cell(column_value(row, kind, stat))),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    info!("Summary table written: {} rows", rows.len());
    Ok(())
}

/// Write several daily series side by side, one line per date present in any
pub fn write_series_csv(columns: &[(&str, &DailySeries)], output_path: &Path) -> Result<()> {
    info!("Writing daily table: {}", output_path.display());
    let mut writer = create_writer(output_path)?;

    let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for (i, (_, series)) in columns.iter().enumerate() {
        for (date, value) in series.points() {
            by_date.entry(*date).or_insert_with(|| vec![None; columns.len()])[i] = Some(*value);
        }
    }

    writer.write_record(std::iter::once("date").chain(columns.iter().map(|(name, _)| *name)))?;
    for (date, values) in &by_date {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(values.iter().map(|v| cell(*v)));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalscope_shared::types::summary::{
        Granularity, MetricSummary, PeriodKey, SampleStats, TotalStats,
    };

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_summary_csv_leaves_missing_cells_empty() {
        let mut row = SummaryRow::new(PeriodKey::containing(date(1, 1), Granularity::Month));
        row.record_count = 2;
        let mut rhr = SampleStats::default();
        rhr.push(61.0);
        row.metrics.insert(
            MetricKind::RestingHeartRate,
            MetricSummary::from_samples(&rhr).unwrap(),
        );
        let mut steps = TotalStats::default();
        steps.add(310_000.0);
        row.metrics.insert(
            MetricKind::Steps,
            MetricSummary::from_total(&steps, row.days_in_period).unwrap(),
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monthly_health_summary.csv");
        write_summary_csv(&[row], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("period,days,record_count,avg_resting_hr"));
        assert_eq!(lines[1], "2024-01,31,2,61.00,61.00,,,,10000.00,,,,,");
    }

    #[test]
    fn test_series_csv_joins_on_date() {
        let a = DailySeries::from_points(vec![(date(1, 1), 1.0), (date(1, 2), 2.0)]);
        let b = DailySeries::from_points(vec![(date(1, 2), 5.0)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.csv");
        write_series_csv(&[("a", &a), ("b", &b)], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "date,a,b\n2024-01-01,1.00,\n2024-01-02,2.00,5.00\n");
    }

    #[test]
    fn test_series_csv_quotes_labels_with_commas() {
        let a = DailySeries::from_points(vec![(date(3, 1), 120.0)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bp.csv");
        write_series_csv(&[("systolic, mmHg", &a)], &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 2);
        assert_eq!(&headers[1], "systolic, mmHg");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "120.00");
    }
}
