//! Short-lived memoization of event store queries.
//!
//! [`CachedSource`] wraps any [`EventSource`] and remembers successful results
//! keyed on the exact [`EventQuery`]. Entries expire a fixed TTL after they were
//! stored. A TTL of zero turns the cache into a pass-through. Hits report no
//! skipped records, so malformed rows are counted once per store read.

use crate::diagnostics::SharedSourceLog;
use crate::source::{EventQuery, EventSource, FetchOutcome, SourceError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default time-to-live for cached query results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    stored_at: Instant,
    outcome: FetchOutcome,
}

/// TTL cache in front of an event source.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<EventQuery, CacheEntry>>,
    log: Option<SharedSourceLog>,
}

impl<S: EventSource> CachedSource<S> {
    /// Wrap `inner` with the given TTL.
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
            log: None,
        }
    }

    /// Record cache hits on a diagnostics log.
    pub fn with_log(mut self, log: SharedSourceLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached entry.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| !self.is_expired(entry, now))
            .count()
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.duration_since(entry.stored_at) >= self.ttl
    }
}

#[async_trait]
impl<S: EventSource> EventSource for CachedSource<S> {
    async fn fetch(&self, query: &EventQuery) -> Result<FetchOutcome, SourceError> {
        if !self.is_enabled() {
            return self.inner.fetch(query).await;
        }

        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(query) {
                if !self.is_expired(entry, Instant::now()) {
                    tracing::debug!(table = %query.table, "event query served from cache");
                    if let Some(log) = &self.log {
                        log.record_cache_hit();
                    }
                    // Skips were reported when the entry was stored
                    return Ok(FetchOutcome::new(entry.outcome.events.clone()));
                }
            }
        }

        let outcome = self.inner.fetch(query).await?;

        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| !self.is_expired(entry, now));
        entries.insert(
            query.clone(),
            CacheEntry {
                stored_at: now,
                outcome: outcome.clone(),
            },
        );

        Ok(outcome)
    }
}
