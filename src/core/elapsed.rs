//! Time since the most recent event of a kind.

use crate::diagnostics::SourceLog;
use crate::source::{Category, EventQuery, EventSource};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Upper bound of the elapsed-time gauge, in minutes.
pub const GAUGE_MAX_MINUTES: u64 = 180;

/// Minutes since the last matching event, or no data at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Elapsed {
    NoData,
    Minutes(u64),
}

impl Elapsed {
    /// Minutes with `NoData` rendered as 0.
    pub fn minutes_or_zero(&self) -> u64 {
        match self {
            Elapsed::NoData => 0,
            Elapsed::Minutes(m) => *m,
        }
    }

    pub fn has_data(&self) -> bool {
        matches!(self, Elapsed::Minutes(_))
    }
}

/// Coarse classification of elapsed minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElapsedBucket {
    #[serde(rename = "0-90")]
    Recent,
    #[serde(rename = "90-180")]
    Due,
    #[serde(rename = "180+")]
    Overdue,
}

impl ElapsedBucket {
    pub fn from_minutes(minutes: u64) -> Self {
        if minutes < 90 {
            ElapsedBucket::Recent
        } else if minutes < 180 {
            ElapsedBucket::Due
        } else {
            ElapsedBucket::Overdue
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElapsedBucket::Recent => "0-90",
            ElapsedBucket::Due => "90-180",
            ElapsedBucket::Overdue => "180+",
        }
    }
}

/// Whole minutes from `event_time` to `now`, measured in `tz`, never negative.
pub fn minutes_between(event_time: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> u64 {
    let event_local = event_time.with_timezone(&tz);
    let now_local = now.with_timezone(&tz);
    let seconds = (now_local - event_local).num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds / 60) as u64
    }
}

/// Look up the latest event among `categories` and measure time since it.
///
/// Source failures are reported on `log` under `step` and yield `NoData`.
pub async fn elapsed_since_last<S: EventSource + ?Sized>(
    source: &S,
    table: &str,
    categories: &[Category],
    now: DateTime<Utc>,
    tz: Tz,
    log: &SourceLog,
    step: &str,
) -> Elapsed {
    log.record_query();
    match source.fetch(&EventQuery::latest(table, categories)).await {
        Ok(outcome) => {
            log.record_skipped(outcome.skipped);
            match outcome.events.first() {
                Some(event) => Elapsed::Minutes(minutes_between(event.timestamp, now, tz)),
                None => Elapsed::NoData,
            }
        }
        Err(e) => {
            tracing::warn!("{} failed: {}", step, e);
            log.record_failure(step, e.to_string());
            Elapsed::NoData
        }
    }
}
