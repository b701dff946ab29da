//! Sleep interval reconstruction.
//!
//! The log stores sleep as separate `sleep_start` / `sleep_end` markers. This
//! module pairs them back into intervals with a single left-to-right scan:
//!
//! - an end with no open start is discarded
//! - a start followed by another start discards the first one
//! - a start followed by an end closes one interval
//! - a trailing start with no end is dropped
//!
//! Input must already be sorted ascending by timestamp; it is never re-sorted.

use crate::source::{Category, Event};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One reconstructed sleep session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_hours: f64,
}

impl SleepInterval {
    /// Build an interval; `None` unless `end > start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if end <= start {
            return None;
        }
        let duration_hours = (end - start).num_milliseconds() as f64 / 3_600_000.0;
        Some(Self {
            start,
            end,
            duration_hours,
        })
    }

    /// Calendar day the interval counts toward: the day it ended, in `tz`.
    pub fn attributed_date(&self, tz: Tz) -> NaiveDate {
        self.end.with_timezone(&tz).date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PairingState {
    SeekingStart,
    HaveStart(DateTime<Utc>),
}

/// Pair sleep markers into intervals.
pub fn reconstruct(events: &[Event]) -> Vec<SleepInterval> {
    let mut intervals = Vec::new();
    let mut state = PairingState::SeekingStart;

    for event in events {
        state = match (state, event.category) {
            (_, Category::SleepStart) => {
                if let PairingState::HaveStart(dropped) = state {
                    tracing::debug!(%dropped, "discarding sleep start without matching end");
                }
                PairingState::HaveStart(event.timestamp)
            }
            (PairingState::HaveStart(start), Category::SleepEnd) => {
                match SleepInterval::new(start, event.timestamp) {
                    Some(interval) => intervals.push(interval),
                    None => tracing::debug!(%start, "discarding zero-length sleep interval"),
                }
                PairingState::SeekingStart
            }
            (PairingState::SeekingStart, Category::SleepEnd) => PairingState::SeekingStart,
            // Other categories don't take part in pairing
            (state, _) => state,
        };
    }

    intervals
}

/// Sleep hours as (date, hours) observations for the rolling aggregator.
pub fn daily_observations(intervals: &[SleepInterval], tz: Tz) -> Vec<(NaiveDate, f64)> {
    intervals
        .iter()
        .map(|interval| (interval.attributed_date(tz), interval.duration_hours))
        .collect()
}
