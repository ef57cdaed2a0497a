//! Report configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `VITALSCOPE_*` environment variables (`__` separates sections, e.g.
//! `VITALSCOPE_REPORT__LOOKBACK_DAYS=30`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use vitalscope_shared::utils::MAX_LOOKBACK_DAYS;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "vitalscope.toml";

const ENV_PREFIX: &str = "VITALSCOPE";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input: InputSettings,
    pub ingest: IngestSettings,
    pub thresholds: Thresholds,
    pub report: ReportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Export used when no input path is given
    pub default_file: PathBuf,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            default_file: PathBuf::from("export.xml"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Records between progress notifications
    pub progress_every: u64,

    /// Sleep intervals must be shorter than this
    pub sleep_ceiling_hours: f64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            progress_every: 50_000,
            sleep_ceiling_hours: 24.0,
        }
    }
}

/// Health reference values used by observations and insights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    // Resting heart rate (BPM)
    pub resting_hr_excellent: f64,
    pub resting_hr_normal_max: f64,
    pub resting_hr_elevated: f64,
    pub resting_hr_tachycardia: f64,
    /// Daily standard deviation above which resting HR counts as variable
    pub resting_hr_variability: f64,
    /// Rise in monthly resting HR that warrants a recommendation
    pub resting_hr_rise_alert: f64,

    // Heart rate variability (ms)
    pub hrv_normal_min: f64,
    pub hrv_low: f64,
    /// Drop in monthly HRV that warrants a recommendation
    pub hrv_drop_alert: f64,

    // Oxygen saturation (%)
    pub oxygen_low: f64,
    pub oxygen_critical: f64,
    /// Share of readings below `oxygen_low` that raises a warning
    pub oxygen_low_share_pct: f64,
    /// Days below `oxygen_low` in the recent window that raise a warning
    pub oxygen_low_days: usize,

    // Sleep (hours per night)
    pub sleep_recommended: f64,
    pub sleep_minimum: f64,
    pub sleep_poor: f64,

    // Activity
    pub steps_target: f64,
    pub steps_minimum: f64,
    pub steps_low: f64,
    pub calories_target: f64,

    // Blood pressure (mmHg)
    pub systolic_normal_max: f64,
    pub systolic_elevated: f64,
    pub systolic_high: f64,
    pub systolic_crisis: f64,
    pub diastolic_normal_max: f64,
    pub diastolic_high: f64,
    pub diastolic_crisis: f64,

    /// Percent change treated as stable when comparing periods
    pub trend_band_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            resting_hr_excellent: 60.0,
            resting_hr_normal_max: 70.0,
            resting_hr_elevated: 75.0,
            resting_hr_tachycardia: 100.0,
            resting_hr_variability: 15.0,
            resting_hr_rise_alert: 5.0,
            hrv_normal_min: 30.0,
            hrv_low: 20.0,
            hrv_drop_alert: 5.0,
            oxygen_low: 95.0,
            oxygen_critical: 90.0,
            oxygen_low_share_pct: 10.0,
            oxygen_low_days: 5,
            sleep_recommended: 8.0,
            sleep_minimum: 7.0,
            sleep_poor: 6.0,
            steps_target: 10_000.0,
            steps_minimum: 7_500.0,
            steps_low: 5_000.0,
            calories_target: 500.0,
            systolic_normal_max: 120.0,
            systolic_elevated: 130.0,
            systolic_high: 140.0,
            systolic_crisis: 160.0,
            diastolic_normal_max: 80.0,
            diastolic_high: 90.0,
            diastolic_crisis: 100.0,
            trend_band_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Days covered by the dashboard and single-metric reports
    pub lookback_days: u32,
    /// Days summarized as "recent"
    pub recent_window_days: u32,
    pub rolling_short_days: u32,
    pub rolling_long_days: u32,
    /// Directory charts and exports are written to
    pub output_dir: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            recent_window_days: 30,
            rolling_short_days: 7,
            rolling_long_days: 30,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Load settings from defaults, a TOML file and the environment.
    ///
    /// An explicit `path` must exist; otherwise `vitalscope.toml` is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        Self::load_with(path, env)
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.ingest.progress_every == 0 {
            return Err(invalid("ingest.progress_every", "must be greater than 0"));
        }
        if !(self.ingest.sleep_ceiling_hours > 0.0) {
            return Err(invalid("ingest.sleep_ceiling_hours", "must be positive"));
        }

        let windows = [
            ("report.lookback_days", self.report.lookback_days),
            ("report.recent_window_days", self.report.recent_window_days),
            ("report.rolling_short_days", self.report.rolling_short_days),
            ("report.rolling_long_days", self.report.rolling_long_days),
        ];
        for (key, days) in windows {
            if days == 0 {
                return Err(invalid(key, "window must be at least one day"));
            }
            if days > MAX_LOOKBACK_DAYS {
                return Err(invalid(
                    key,
                    &format!("window must not exceed {} days", MAX_LOOKBACK_DAYS),
                ));
            }
        }

        if self.thresholds.oxygen_critical > self.thresholds.oxygen_low {
            return Err(invalid(
                "thresholds.oxygen_critical",
                "must not exceed thresholds.oxygen_low",
            ));
        }
        if self.thresholds.trend_band_pct < 0.0 {
            return Err(invalid("thresholds.trend_band_pct", "must not be negative"));
        }
        Ok(())
    }
}

fn invalid(key: &'static str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(HashMap::new()))
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.ingest.progress_every, 50_000);
        assert_eq!(settings.report.lookback_days, 90);
        assert_eq!(settings.thresholds.oxygen_low, 95.0);
        assert_eq!(settings.thresholds.steps_target, 10_000.0);
    }

    #[test]
    fn test_load_toml_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[report]\nlookback_days = 30\n\n[thresholds]\noxygen_low = 94\n"
        )
        .unwrap();

        let settings = Settings::load_with(Some(file.path()), no_env()).unwrap();
        assert_eq!(settings.report.lookback_days, 30);
        assert_eq!(settings.thresholds.oxygen_low, 94.0);
        // untouched values keep their defaults
        assert_eq!(settings.report.rolling_short_days, 7);
        assert_eq!(settings.thresholds.oxygen_critical, 90.0);
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[ingest]\nprogress_every = 1000\n").unwrap();

        let vars = HashMap::from([(
            "VITALSCOPE_INGEST__PROGRESS_EVERY".to_string(),
            "250".to_string(),
        )]);
        let env = no_env().source(Some(vars));

        let settings = Settings::load_with(Some(file.path()), env).unwrap();
        assert_eq!(settings.ingest.progress_every, 250);
    }

    #[test]
    fn test_written_defaults_load_back() {
        let mut defaults = Settings::default();
        defaults.thresholds.sleep_minimum = 6.5;
        defaults.report.output_dir = PathBuf::from("reports");

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", toml::to_string(&defaults).unwrap()).unwrap();

        let settings = Settings::load_with(Some(file.path()), no_env()).unwrap();
        assert_eq!(settings.thresholds.sleep_minimum, 6.5);
        assert_eq!(settings.thresholds.oxygen_low_days, 5);
        assert_eq!(settings.report.output_dir, PathBuf::from("reports"));
        assert_eq!(settings.input.default_file, defaults.input.default_file);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = Settings::load_with(Some(Path::new("/no/such/vitalscope.toml")), no_env());
        assert!(matches!(result, Err(SettingsError::Load(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.report.rolling_short_days = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.ingest.sleep_ceiling_hours = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.ingest.progress_every = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.thresholds.oxygen_critical = 97.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.report.lookback_days = u32::MAX;
        assert!(settings.validate().is_err());
    }
}
