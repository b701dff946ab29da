//! Qualitative labels for daily series.
//!
//! Turns [`SeriesStats`] into a small fixed vocabulary a caregiver (or a
//! language-model prompt) can read without seeing variances or slopes. The
//! only numbers that reach the phrases are the ±10% / ±25% band widths.

use crate::core::stats::SeriesStats;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Guards the ratios against a zero mean.
pub const EPSILON: f64 = 1e-9;

/// Coefficient of variation below which days count as "the same".
pub const CV_STABLE: f64 = 0.10;

/// Coefficient of variation below which days differ "a little".
pub const CV_MODERATE: f64 = 0.25;

/// Relative slope per day that counts as a trend without an absolute threshold.
pub const RELATIVE_TREND: f64 = 0.05;

/// How much the daily values move around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variability {
    #[serde(rename = "ほぼ毎日おなじ")]
    Stable,
    #[serde(rename = "日によって少しちがう")]
    Moderate,
    #[serde(rename = "日によってかなりちがう")]
    High,
}

impl Variability {
    pub fn from_cv(cv: f64) -> Self {
        if cv < CV_STABLE {
            Variability::Stable
        } else if cv < CV_MODERATE {
            Variability::Moderate
        } else {
            Variability::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variability::Stable => "ほぼ毎日おなじ",
            Variability::Moderate => "日によって少しちがう",
            Variability::High => "日によってかなりちがう",
        }
    }
}

impl fmt::Display for Variability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of the weekly trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "少し増えつつある")]
    Rising,
    #[serde(rename = "少し減りつつある")]
    Falling,
    #[serde(rename = "だいたい同じ")]
    Flat,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "少し増えつつある",
            Trend::Falling => "少し減りつつある",
            Trend::Flat => "だいたい同じ",
        }
    }

    fn phrase(&self) -> &'static str {
        match self {
            Trend::Rising => "この1週間で少しずつ増えてきています",
            Trend::Falling => "この1週間で少しずつ減ってきています",
            Trend::Flat => "この1週間で目立った増減はありません",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable summary of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeLabel {
    pub variability: Variability,
    pub variability_phrase: String,
    pub trend: Trend,
    pub trend_phrase: String,
    pub band_10pct: f64,
    pub band_25pct: f64,
}

/// Label a series from its stats.
///
/// `unit` is appended to band widths (e.g. "時間/日"). When `abs_threshold` is
/// set, a slope at least that large counts as a trend even if it is small
/// relative to the mean.
pub fn label(stats: &SeriesStats, unit: &str, abs_threshold: Option<f64>) -> QualitativeLabel {
    let abs_mean = stats.mean.abs();
    let scale = abs_mean + EPSILON;

    let variability = Variability::from_cv(stats.std / scale);
    let band_10pct = abs_mean * 0.10;
    let band_25pct = abs_mean * 0.25;

    let band10 = format_band(band_10pct);
    let band25 = format_band(band_25pct);
    let variability_phrase = match variability {
        Variability::Stable => format!("日ごとの差はだいたい±{band10}{unit}以内です"),
        Variability::Moderate => {
            format!("日ごとの差はだいたい±{band10}〜{band25}{unit}くらいです")
        }
        Variability::High => format!("日ごとの差が±{band25}{unit}をこえる日もあります"),
    };

    let slope = stats.trend_slope_per_day;
    let significant = abs_threshold.is_some_and(|t| slope.abs() >= t)
        || slope.abs() / scale >= RELATIVE_TREND;
    let trend = if significant && slope > 0.0 {
        Trend::Rising
    } else if significant && slope < 0.0 {
        Trend::Falling
    } else {
        Trend::Flat
    };

    QualitativeLabel {
        variability,
        variability_phrase,
        trend,
        trend_phrase: trend.phrase().to_string(),
        band_10pct,
        band_25pct,
    }
}

/// Whole numbers for large bands, one decimal otherwise.
fn format_band(value: f64) -> String {
    if value >= 10.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stats::series_stats;

    #[test]
    fn test_constant_series_labels() {
        let stats = series_stats(&[6.0; 7]);
        let label = label(&stats, "時間/日", Some(0.2));

        assert_eq!(label.variability, Variability::Stable);
        assert_eq!(label.variability.as_str(), "ほぼ毎日おなじ");
        assert_eq!(label.trend, Trend::Flat);
        assert_eq!(label.trend.as_str(), "だいたい同じ");
        assert!((label.band_10pct - 0.6).abs() < 1e-9);
        assert!((label.band_25pct - 1.5).abs() < 1e-9);
        assert_eq!(label.variability_phrase, "日ごとの差はだいたい±0.6時間/日以内です");
    }

    #[test]
    fn test_increasing_series_is_rising() {
        let stats = series_stats(&[5.0, 5.0, 6.0, 6.0, 7.0, 7.0, 8.0]);
        let label = label(&stats, "時間/日", Some(0.2));
        assert_eq!(label.trend, Trend::Rising);
        assert_eq!(label.trend.as_str(), "少し増えつつある");
    }

    #[test]
    fn test_decreasing_series_is_falling() {
        let stats = series_stats(&[8.0, 7.0, 7.0, 6.0, 6.0, 5.0, 5.0]);
        assert_eq!(label(&stats, "時間/日", None).trend, Trend::Falling);
    }

    #[test]
    fn test_absolute_threshold_alone_triggers_trend() {
        // Slope 1 ml/day against a mean near 700: relative 0.14%, below 5%
        let values: Vec<f64> = (0..7).map(|i| 697.0 + i as f64).collect();
        let stats = series_stats(&values);

        assert_eq!(label(&stats, "ml/日", None).trend, Trend::Flat);
        assert_eq!(label(&stats, "ml/日", Some(1.0)).trend, Trend::Rising);
        assert_eq!(label(&stats, "ml/日", Some(1.5)).trend, Trend::Flat);
    }

    #[test]
    fn test_variability_buckets() {
        assert_eq!(Variability::from_cv(0.0), Variability::Stable);
        assert_eq!(Variability::from_cv(0.0999), Variability::Stable);
        assert_eq!(Variability::from_cv(0.10), Variability::Moderate);
        assert_eq!(Variability::from_cv(0.2499), Variability::Moderate);
        assert_eq!(Variability::from_cv(0.25), Variability::High);
    }

    #[test]
    fn test_zero_mean_does_not_blow_up() {
        let stats = series_stats(&[0.0; 7]);
        let label = label(&stats, "ml/日", Some(10.0));

        assert_eq!(label.variability, Variability::Stable);
        assert_eq!(label.trend, Trend::Flat);
        assert_eq!(label.band_10pct, 0.0);
    }

    #[test]
    fn test_sparse_series_is_highly_variable() {
        let stats = series_stats(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 7.0]);
        let label = label(&stats, "時間/日", Some(0.2));
        assert_eq!(label.variability, Variability::High);
        assert!(label.variability_phrase.contains("をこえる日もあります"));
    }

    #[test]
    fn test_phrases_carry_no_raw_stats() {
        let stats = series_stats(&[600.0, 650.0, 700.0, 620.0, 680.0, 710.0, 640.0]);
        let label = label(&stats, "ml/日", Some(10.0));

        let std_text = format!("{:.1}", stats.std);
        let slope_text = format!("{:.1}", stats.trend_slope_per_day);
        assert!(!label.variability_phrase.contains(&std_text));
        assert!(!label.trend_phrase.contains(&slope_text));
        assert!(!label.trend_phrase.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_label_serializes_vocabulary() {
        let stats = series_stats(&[6.0; 7]);
        let json = serde_json::to_value(label(&stats, "時間/日", None)).unwrap();
        assert_eq!(json["variability"], "ほぼ毎日おなじ");
        assert_eq!(json["trend"], "だいたい同じ");
    }
}
