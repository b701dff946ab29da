//! Summary statistics over a short daily series.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Mean, spread and trend of an ordered series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub mean: f64,
    /// Population standard deviation (divisor n)
    pub std: f64,
    /// Least-squares slope in units per day
    pub trend_slope_per_day: f64,
}

/// Compute stats over `values`, oldest first.
pub fn series_stats(values: &[f64]) -> SeriesStats {
    if values.is_empty() {
        return SeriesStats::default();
    }

    SeriesStats {
        mean: values.iter().mean(),
        std: values.iter().population_std_dev(),
        trend_slope_per_day: linear_slope(values),
    }
}

/// Slope of the least-squares line through `(index, value)`.
pub fn linear_slope(values: &[f64]) -> f64 {
    let len = values.len();
    if len < 2 {
        return 0.0;
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;

    for (idx, &value) in values.iter().enumerate() {
        let x = idx as f64;
        sum_x += x;
        sum_y += value;
        sum_xy += x * value;
        sum_x2 += x * x;
    }

    let n = len as f64;
    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}
