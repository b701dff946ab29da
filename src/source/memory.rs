//! In-memory event source.
//!
//! Applies the same query contract as the REST adapter over a fixed list of
//! events. Used for demos (`--demo`) and tests.

use crate::core::local_to_utc;
use crate::source::{Category, Event, EventQuery, EventSource, FetchOutcome, Order, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicU64, Ordering};

/// An event source backed by a vector.
#[derive(Debug, Default)]
pub struct MemorySource {
    events: Vec<Event>,
    queries: AtomicU64,
}

impl MemorySource {
    /// Create a source over the given events (any order).
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            queries: AtomicU64::new(0),
        }
    }

    /// Number of queries answered so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// A deterministic two-week care log ending shortly before `now`.
    pub fn sample(now: DateTime<Utc>, tz: Tz) -> Self {
        let today = now.with_timezone(&tz).date_naive();
        let mut events = Vec::new();

        for days_ago in (0..14i64).rev() {
            let date = today - Duration::days(days_ago);
            let day = 13 - days_ago;

            // Night sleep from the previous evening, plus a nap
            let night_minutes = 540 + (day % 4) * 20 + day * 3;
            let bedtime = at(tz, date - Duration::days(1), 20, 30);
            events.push(Event::new(bedtime, Category::SleepStart));
            events.push(Event::new(
                bedtime + Duration::minutes(night_minutes),
                Category::SleepEnd,
            ));
            let nap = at(tz, date, 13, 0);
            events.push(Event::new(nap, Category::SleepStart));
            events.push(Event::new(
                nap + Duration::minutes(60 + (day % 3) * 15),
                Category::SleepEnd,
            ));

            for (i, hour) in [6u32, 9, 12, 15, 18, 21].into_iter().enumerate() {
                let amount = 140.0 + ((day + i as i64) % 5) as f64 * 10.0 + day as f64 * 2.0;
                let category = if i % 3 == 2 {
                    Category::Breast
                } else {
                    Category::Formula
                };
                let feed = Event::new(at(tz, date, hour, 15), category);
                events.push(if category == Category::Formula {
                    let label = format!("授乳, {amount:.0}ml");
                    feed.with_amount(amount).with_label(label)
                } else {
                    feed
                });
            }

            for hour in [7u32, 10, 13, 16, 19, 22] {
                let category = if hour % 2 == 0 {
                    Category::DiaperPoo
                } else {
                    Category::DiaperPee
                };
                events.push(
                    Event::new(at(tz, date, hour, 40), category).with_label("おむつ替え完了"),
                );
            }
        }

        events.retain(|e| e.timestamp <= now);
        Self::new(events)
    }
}

fn at(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    local_to_utc(date.and_time(time), tz)
}

#[async_trait]
impl EventSource for MemorySource {
    async fn fetch(&self, query: &EventQuery) -> Result<FetchOutcome, SourceError> {
        self.queries.fetch_add(1, Ordering::Relaxed);

        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .map(|mut e| {
                if !query.include_amount {
                    e.amount = None;
                }
                e
            })
            .collect();

        events.sort_by_key(|e| e.timestamp);
        if query.order == Order::Descending {
            events.reverse();
        }
        if let Some(limit) = query.limit {
            events.truncate(limit);
        }

        Ok(FetchOutcome::new(events))
    }
}
