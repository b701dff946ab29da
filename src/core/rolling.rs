//! Rolling daily aggregation over a fixed calendar window.
//!
//! Observations are summed per calendar day and left-joined onto the
//! canonical list of days ending at `today`. Days without observations are
//! zero, never interpolated or omitted. The window splits into the current
//! week (last seven days) and the previous week (the seven days before it).

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rolling window length in days.
pub const WINDOW_DAYS: usize = 14;

/// Length of the current and previous week.
pub const WEEK_DAYS: usize = 7;

/// Value of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub value: f64,
}

/// Result of one aggregation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindow {
    /// One bucket per day, oldest first
    pub buckets: Vec<DailyBucket>,
    /// Mean daily value of the previous week (0.0 when it has no data)
    pub previous_week_average: f64,
    /// Whether any observation fell in the previous week
    pub previous_week_has_data: bool,
}

impl RollingWindow {
    /// The most recent week.
    pub fn current_week(&self) -> &[DailyBucket] {
        let len = self.buckets.len();
        &self.buckets[len - len.min(WEEK_DAYS)..]
    }

    /// The week before [`current_week`](Self::current_week).
    pub fn previous_week(&self) -> &[DailyBucket] {
        let end = self.buckets.len() - self.buckets.len().min(WEEK_DAYS);
        &self.buckets[end.saturating_sub(WEEK_DAYS)..end]
    }

    /// Values of the current week, oldest first.
    pub fn current_values(&self) -> Vec<f64> {
        self.current_week().iter().map(|b| b.value).collect()
    }

    /// An all-zero window, used when the source is unavailable.
    pub fn empty(today: NaiveDate, window_days: usize) -> Self {
        aggregate(&[], today, window_days)
    }
}

/// The `window_days` calendar days ending at `today`, oldest first.
///
/// Days before the earliest representable date are left out.
pub fn canonical_days(today: NaiveDate, window_days: usize) -> Vec<NaiveDate> {
    (0..window_days as u64)
        .rev()
        .filter_map(|days_ago| today.checked_sub_days(Days::new(days_ago)))
        .collect()
}

/// Bucket observations into the canonical window ending at `today`.
pub fn aggregate(
    observations: &[(NaiveDate, f64)],
    today: NaiveDate,
    window_days: usize,
) -> RollingWindow {
    let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in observations {
        let value = if value.is_finite() { *value } else { 0.0 };
        *sums.entry(*date).or_insert(0.0) += value;
    }

    let buckets: Vec<DailyBucket> = canonical_days(today, window_days)
        .into_iter()
        .map(|date| DailyBucket {
            date,
            value: sums.get(&date).copied().unwrap_or(0.0),
        })
        .collect();

    let mut window = RollingWindow {
        buckets,
        previous_week_average: 0.0,
        previous_week_has_data: false,
    };

    let previous = window.previous_week();
    let has_data = previous.iter().any(|b| sums.contains_key(&b.date));
    let average = if has_data && !previous.is_empty() {
        previous.iter().map(|b| b.value).sum::<f64>() / previous.len() as f64
    } else {
        0.0
    };

    window.previous_week_average = average;
    window.previous_week_has_data = has_data;
    window
}
