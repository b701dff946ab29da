//! Event store diagnostics.
//!
//! Sub-computations of the KPI pipeline never raise; when a query fails they
//! fall back to defaults and report here instead. The log keeps counters and
//! a short tail of recent issues for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Maximum number of issues retained.
pub const MAX_RECENT_ISSUES: usize = 20;

/// A failure reported by one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceIssue {
    /// When the failure was observed
    pub at: DateTime<Utc>,
    /// Which computation failed (e.g. "elapsed.diaper")
    pub step: String,
    /// Error message
    pub message: String,
}

/// Counters and recent failures for event store access.
#[derive(Debug)]
pub struct SourceLog {
    /// Queries sent to the source (cache hits included)
    queries: AtomicU64,
    /// Queries answered from the cache
    cache_hits: AtomicU64,
    /// Queries that failed
    failures: AtomicU64,
    /// Records skipped as malformed
    records_skipped: AtomicU64,
    /// Snapshots built
    snapshots: AtomicU64,
    /// Tail of recent failures
    recent: Mutex<VecDeque<SourceIssue>>,
    /// Log creation time
    started_at: DateTime<Utc>,
}

impl SourceLog {
    /// Create a new log.
    pub fn new() -> Self {
        Self {
            queries: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
            snapshots: AtomicU64::new(0),
            recent: Mutex::new(VecDeque::with_capacity(MAX_RECENT_ISSUES)),
            started_at: Utc::now(),
        }
    }

    /// Record a query issued by the pipeline.
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a query answered from the cache.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record records dropped at the adapter boundary.
    pub fn record_skipped(&self, count: usize) {
        self.records_skipped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a completed snapshot.
    pub fn record_snapshot(&self) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed step and keep it in the recent tail.
    pub fn record_failure(&self, step: &str, message: impl Into<String>) {
        self.failures.fetch_add(1, Ordering::Relaxed);

        let issue = SourceIssue {
            at: Utc::now(),
            step: step.to_string(),
            message: message.into(),
        };

        // A poisoned lock only loses the tail; counters stay accurate
        if let Ok(mut recent) = self.recent.lock() {
            if recent.len() == MAX_RECENT_ISSUES {
                recent.pop_front();
            }
            recent.push_back(issue);
        }
    }

    /// Recent issues, oldest first.
    pub fn recent_issues(&self) -> Vec<SourceIssue> {
        self.recent
            .lock()
            .map(|recent| recent.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Get the current statistics.
    pub fn stats(&self) -> SourceStats {
        SourceStats {
            queries: self.queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            snapshots: self.snapshots.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut out = format!(
            "Event Store Statistics:\n\
             - Snapshots built: {}\n\
             - Queries issued: {}\n\
             - Served from cache: {}\n\
             - Failed queries: {}\n\
             - Records skipped: {}",
            stats.snapshots, stats.queries, stats.cache_hits, stats.failures, stats.records_skipped
        );

        let recent = self.recent_issues();
        if !recent.is_empty() {
            out.push_str("\n\nRecent issues:");
            for issue in recent.iter().rev().take(5) {
                out.push_str(&format!(
                    "\n - [{}] {}: {}",
                    issue.at.format("%H:%M:%S"),
                    issue.step,
                    issue.message
                ));
            }
        }

        out
    }

    /// Reset all counters and drop recent issues.
    pub fn reset(&self) {
        self.queries.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.records_skipped.store(0, Ordering::Relaxed);
        self.snapshots.store(0, Ordering::Relaxed);
        if let Ok(mut recent) = self.recent.lock() {
            recent.clear();
        }
    }
}

impl Default for SourceLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of diagnostics counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStats {
    pub queries: u64,
    pub cache_hits: u64,
    pub failures: u64,
    pub records_skipped: u64,
    pub snapshots: u64,
    pub started_at: DateTime<Utc>,
}

/// Thread-safe shared diagnostics log.
pub type SharedSourceLog = Arc<SourceLog>;

/// Create a new shared diagnostics log.
pub fn create_shared_log() -> SharedSourceLog {
    Arc::new(SourceLog::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_log_counting() {
        let log = SourceLog::new();

        log.record_query();
        log.record_query();
        log.record_cache_hit();
        log.record_skipped(3);

        let stats = log.stats();
        assert_eq!(stats.queries, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.records_skipped, 3);
        assert_eq!(stats.failures, 0);
    }

    #[test]
    fn test_recent_issues_are_bounded() {
        let log = SourceLog::new();
        for i in 0..(MAX_RECENT_ISSUES + 5) {
            log.record_failure("elapsed.diaper", format!("timeout {i}"));
        }

        let recent = log.recent_issues();
        assert_eq!(recent.len(), MAX_RECENT_ISSUES);
        assert_eq!(recent[0].message, "timeout 5");
        assert_eq!(log.stats().failures, (MAX_RECENT_ISSUES + 5) as u64);
    }

    #[test]
    fn test_source_log_reset() {
        let log = SourceLog::new();
        log.record_query();
        log.record_failure("rolling.sleep", "boom");
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.queries, 0);
        assert_eq!(stats.failures, 0);
        assert!(log.recent_issues().is_empty());
    }

    #[test]
    fn test_summary_format() {
        let log = SourceLog::new();
        assert!(log.summary().contains("Queries issued"));
        assert!(!log.summary().contains("Recent issues"));

        log.record_failure("rolling.feeding", "connection refused");
        let summary = log.summary();
        assert!(summary.contains("Recent issues"));
        assert!(summary.contains("rolling.feeding: connection refused"));
    }
}
