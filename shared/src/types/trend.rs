//! Trend comparison types and computation
//!
//! Compares a baseline window against a comparison window and classifies the
//! change, plus a least-squares slope for trend lines.

use serde::{Deserialize, Serialize};

/// Direction of a change relative to a stability band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Stable => "stable",
        }
    }
}

/// Baseline vs comparison means for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendComparison {
    pub baseline: f64,
    pub comparison: f64,
    /// comparison - baseline
    pub delta: f64,
    /// delta / baseline * 100 (None if baseline is 0)
    pub delta_pct: Option<f64>,
}

impl TrendComparison {
    pub fn new(baseline: f64, comparison: f64) -> Self {
        let delta = comparison - baseline;
        let delta_pct = if baseline != 0.0 {
            Some(delta / baseline * 100.0)
        } else {
            None
        };
        Self {
            baseline,
            comparison,
            delta,
            delta_pct,
        }
    }

    /// Compare the means of two value sets; `None` if either side is empty
    pub fn of_means(baseline: &[f64], comparison: &[f64]) -> Option<Self> {
        Some(Self::new(mean(baseline)?, mean(comparison)?))
    }

    /// Classify against a band in percent; changes within ±band are stable.
    /// Without a percentage (zero baseline) the sign of the delta decides.
    pub fn direction(&self, band_pct: f64) -> TrendDirection {
        match self.delta_pct {
            Some(pct) if pct.abs() <= band_pct => TrendDirection::Stable,
            Some(pct) if pct > 0.0 => TrendDirection::Rising,
            Some(_) => TrendDirection::Falling,
            None if self.delta > 0.0 => TrendDirection::Rising,
            None if self.delta < 0.0 => TrendDirection::Falling,
            None => TrendDirection::Stable,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Least-squares slope of `values` against their index (change per step).
/// Needs at least two points.
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_percentages() {
        let cmp = TrendComparison::new(60.0, 63.0);
        assert_eq!(cmp.delta, 3.0);
        assert!((cmp.delta_pct.unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_comparison_zero_baseline() {
        let cmp = TrendComparison::new(0.0, 10.0);
        assert_eq!(cmp.delta_pct, None);
        assert_eq!(cmp.direction(5.0), TrendDirection::Rising);
        assert_eq!(TrendComparison::new(0.0, 0.0).direction(5.0), TrendDirection::Stable);
    }

    #[test]
    fn test_direction_band() {
        assert_eq!(TrendComparison::new(100.0, 104.0).direction(5.0), TrendDirection::Stable);
        assert_eq!(TrendComparison::new(100.0, 105.0).direction(5.0), TrendDirection::Stable);
        assert_eq!(TrendComparison::new(100.0, 110.0).direction(5.0), TrendDirection::Rising);
        assert_eq!(TrendComparison::new(100.0, 80.0).direction(5.0), TrendDirection::Falling);
    }

    #[test]
    fn test_of_means() {
        let cmp = TrendComparison::of_means(&[1.0, 3.0], &[4.0, 6.0]).unwrap();
        assert_eq!(cmp.baseline, 2.0);
        assert_eq!(cmp.comparison, 5.0);
        assert!(TrendComparison::of_means(&[], &[1.0]).is_none());
    }

    #[test]
    fn test_linear_slope() {
        assert_eq!(linear_slope(&[1.0]), None);
        let slope = linear_slope(&[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((slope - 2.0).abs() < 1e-9);
        let flat = linear_slope(&[4.0, 4.0, 4.0]).unwrap();
        assert!(flat.abs() < 1e-12);
    }
}
