//! Read-only access to the care event store.
//!
//! Everything above this module talks to the store through [`EventSource`]
//! and the [`EventQuery`] contract: a table, a category filter, an optional
//! `since` bound, a sort order and an optional limit.

pub mod cache;
pub mod memory;
pub mod rest;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use thiserror::Error;

// Re-export commonly used types
pub use cache::CachedSource;
pub use memory::MemorySource;
pub use rest::{RestEventSource, StoreConfig};
pub use types::{Category, Event, RawEventRecord, RecordIssue};

/// Default table holding the care log.
pub const DEFAULT_TABLE: &str = "baby_events";

/// Sort order by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Ascending => "asc",
            Order::Descending => "desc",
        }
    }
}

/// One filtered, time-bounded, ordered query against the store.
///
/// Queries are hashable so the cache can key on their exact parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventQuery {
    pub table: String,
    pub categories: BTreeSet<Category>,
    pub include_amount: bool,
    pub since: Option<DateTime<Utc>>,
    pub order: Order,
    pub limit: Option<usize>,
}

impl EventQuery {
    /// All events of the given categories, oldest first.
    pub fn new(table: impl Into<String>, categories: &[Category]) -> Self {
        Self {
            table: table.into(),
            categories: categories.iter().copied().collect(),
            include_amount: false,
            since: None,
            order: Order::Ascending,
            limit: None,
        }
    }

    /// The single most recent event among `categories`.
    pub fn latest(table: impl Into<String>, categories: &[Category]) -> Self {
        Self::new(table, categories)
            .order(Order::Descending)
            .limit(1)
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_amount(mut self) -> Self {
        self.include_amount = true;
        self
    }

    /// Whether an event satisfies the category and `since` filters.
    pub fn matches(&self, event: &Event) -> bool {
        self.categories.contains(&event.category)
            && self.since.map_or(true, |since| event.timestamp >= since)
    }
}

/// Errors raised by an event source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Event store config error: {0}")]
    Config(String),

    #[error("Event store network error: {0}")]
    Network(String),

    #[error("Event store server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Event store response error: {0}")]
    Decode(String),
}

/// Events returned by a query, plus how many records were skipped as malformed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub events: Vec<Event>,
    pub skipped: usize,
}

impl FetchOutcome {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events, skipped: 0 }
    }
}

/// A read-only source of care events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Run one query. Implementations apply the full [`EventQuery`] contract.
    async fn fetch(&self, query: &EventQuery) -> Result<FetchOutcome, SourceError>;
}

#[async_trait]
impl<S: EventSource + ?Sized> EventSource for std::sync::Arc<S> {
    async fn fetch(&self, query: &EventQuery) -> Result<FetchOutcome, SourceError> {
        (**self).fetch(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_latest_query_shape() {
        let q = EventQuery::latest("events", &Category::DIAPER);
        assert_eq!(q.order, Order::Descending);
        assert_eq!(q.limit, Some(1));
        assert_eq!(q.since, None);
        assert_eq!(q.categories.len(), 2);
    }

    #[test]
    fn test_query_matches() {
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let q = EventQuery::new("events", &Category::SLEEP).since(since);

        assert!(q.matches(&Event::new(since, Category::SleepStart)));
        assert!(!q.matches(&Event::new(since, Category::Formula)));
        assert!(!q.matches(&Event::new(
            since - chrono::Duration::seconds(1),
            Category::SleepEnd
        )));
    }

    #[test]
    fn test_queries_with_same_params_are_equal() {
        let a = EventQuery::new("events", &[Category::Breast, Category::Formula]).with_amount();
        let b = EventQuery::new("events", &[Category::Formula, Category::Breast]).with_amount();
        assert_eq!(a, b);
        assert_ne!(a, b.clone().limit(3));
    }
}
