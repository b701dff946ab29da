//! End-to-end tests for KPI snapshots over in-memory and unreachable stores

use async_trait::async_trait;
use babycare_kpi::core::{ElapsedBucket, EngineSettings, KpiEngine, Trend};
use babycare_kpi::diagnostics::create_shared_log;
use babycare_kpi::source::{
    CachedSource, Category, Event, EventQuery, EventSource, FetchOutcome, MemorySource,
    RestEventSource, SourceError, StoreConfig,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Tokyo;
use pretty_assertions::assert_eq;
use std::sync::Arc;

// 12:00 JST on May 14
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 14, 3, 0, 0).unwrap()
}

fn jst(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Tokyo
        .with_ymd_and_hms(2024, 5, d, h, m, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
}

#[tokio::test]
async fn test_repeated_snapshot_within_ttl_is_identical() {
    let memory = Arc::new(MemorySource::sample(now(), Tokyo));
    let log = create_shared_log();
    let source = CachedSource::new(memory.clone(), std::time::Duration::from_secs(60))
        .with_log(log.clone());
    let engine =
        KpiEngine::new(Arc::new(source), EngineSettings::default()).with_log(log.clone());

    let first = serde_json::to_string(&engine.snapshot_at(now()).await).unwrap();
    let queries_after_first = memory.query_count();
    let second = serde_json::to_string(&engine.snapshot_at(now()).await).unwrap();

    assert_eq!(first, second);
    assert_eq!(memory.query_count(), queries_after_first);

    let stats = log.stats();
    assert_eq!(stats.snapshots, 2);
    assert_eq!(stats.cache_hits, queries_after_first);
    assert_eq!(stats.failures, 0);
}

#[tokio::test]
async fn test_windows_are_contiguous_and_end_today() {
    let engine = KpiEngine::new(
        Arc::new(MemorySource::new(Vec::new())),
        EngineSettings::default(),
    );
    let payload = engine.snapshot_at(now()).await;

    for metric in [&payload.sleep, &payload.feeding, &payload.diaper_changes] {
        let days: Vec<NaiveDate> = metric.last_7_days.iter().map(|b| b.date).collect();
        let expected: Vec<NaiveDate> = (0..7)
            .rev()
            .map(|n| today() - Duration::days(n))
            .collect();
        assert_eq!(days, expected);
        assert!(metric.last_7_days.iter().all(|b| b.value == 0.0));
        assert_eq!(metric.previous_week_average, 0.0);
        assert_eq!(metric.qualitative.trend, Trend::Flat);
    }
}

#[tokio::test]
async fn test_sample_data_snapshot() {
    let engine = KpiEngine::new(
        Arc::new(MemorySource::sample(now(), Tokyo)),
        EngineSettings::default(),
    );
    let payload = engine.snapshot_at(now()).await;

    assert_eq!(payload.as_of, today());

    // Last diaper change at 10:40, last feed at 09:15
    assert_eq!(payload.elapsed.diaper.minutes, 80);
    assert_eq!(payload.elapsed.diaper.bucket, ElapsedBucket::Recent);
    assert_eq!(payload.elapsed.feeding.minutes, 165);
    assert_eq!(payload.elapsed.feeding.bucket, ElapsedBucket::Due);

    assert!(payload.sleep.last_7_days.iter().all(|b| b.value > 8.0));
    assert!(payload.feeding.last_7_days.iter().all(|b| b.value > 0.0));
    assert_eq!(payload.diaper_changes.previous_week_average, 6.0);
    assert_eq!(payload.diaper_changes.last_7_days[5].value, 6.0);
    // Only the 07:40 and 10:40 changes so far today
    assert_eq!(payload.diaper_changes.last_7_days[6].value, 2.0);

    assert_eq!(payload.recent_log.len(), 5);
    assert_eq!(payload.recent_log[0].time, "10:40");
}

#[tokio::test]
async fn test_sleep_attributed_to_end_date_across_midnight() {
    let events = vec![
        Event::new(jst(12, 22, 0), Category::SleepStart),
        Event::new(jst(13, 5, 0), Category::SleepEnd),
        // Orphan end and a repeated start
        Event::new(jst(13, 9, 0), Category::SleepEnd),
        Event::new(jst(13, 20, 0), Category::SleepStart),
        Event::new(jst(13, 21, 0), Category::SleepStart),
        Event::new(jst(13, 23, 30), Category::SleepEnd),
    ];
    let engine = KpiEngine::new(Arc::new(MemorySource::new(events)), EngineSettings::default());
    let payload = engine.snapshot_at(now()).await;

    let days = &payload.sleep.last_7_days;
    assert_eq!(days[4].value, 0.0);
    assert_eq!(days[5].date, NaiveDate::from_ymd_opt(2024, 5, 13).unwrap());
    // 7h overnight plus 2.5h from the later start
    assert_eq!(days[5].value, 9.5);
    assert_eq!(days[6].value, 0.0);
}

#[tokio::test]
async fn test_unreachable_store_degrades_to_defaults() {
    let config = StoreConfig {
        timeout_secs: 1,
        ..StoreConfig::new("http://127.0.0.1:1", "key")
    };
    let source = RestEventSource::new(config).unwrap();
    let engine = KpiEngine::new(Arc::new(source), EngineSettings::default());

    let payload = engine.snapshot_at(now()).await;

    assert!(!payload.elapsed.diaper.has_data);
    assert!(!payload.elapsed.feeding.has_data);
    assert_eq!(payload.elapsed.feeding.minutes, 0);
    assert!(payload.recent_log.is_empty());
    assert_eq!(payload.sleep.last_7_days.len(), 7);

    let stats = engine.log().stats();
    assert_eq!(stats.failures, 6);
    assert!(engine
        .log()
        .recent_issues()
        .iter()
        .any(|issue| issue.step == "rolling.sleep"));
}

#[tokio::test]
async fn test_feeding_previous_week_average() {
    let mut events = Vec::new();
    for d in 1..=7 {
        events.push(Event::new(jst(d, 9, 0), Category::Formula).with_amount(700.0));
    }
    events.push(Event::new(jst(14, 9, 0), Category::Breast));
    let engine = KpiEngine::new(Arc::new(MemorySource::new(events)), EngineSettings::default());
    let payload = engine.snapshot_at(now()).await;

    assert_eq!(payload.feeding.previous_week_average, 700.0);
    assert_eq!(payload.feeding.this_week_average, 0.0);
    // Breast feed without amount still counts as a feed for elapsed time
    assert_eq!(payload.elapsed.feeding.minutes, 180);
    assert_eq!(payload.elapsed.feeding.bucket, ElapsedBucket::Overdue);
}

/// Answers every query with one malformed record dropped.
struct OneBadRecordSource;

#[async_trait]
impl EventSource for OneBadRecordSource {
    async fn fetch(&self, _query: &EventQuery) -> Result<FetchOutcome, SourceError> {
        Ok(FetchOutcome {
            events: Vec::new(),
            skipped: 1,
        })
    }
}

#[tokio::test]
async fn test_skipped_records_counted_once_per_store_read() {
    let log = create_shared_log();
    let source = CachedSource::new(OneBadRecordSource, std::time::Duration::from_secs(60))
        .with_log(log.clone());
    let engine =
        KpiEngine::new(Arc::new(source), EngineSettings::default()).with_log(log.clone());

    engine.snapshot_at(now()).await;
    engine.snapshot_at(now()).await;

    let stats = log.stats();
    // Six queries per snapshot, the second snapshot served from cache
    assert_eq!(stats.cache_hits, 6);
    assert_eq!(stats.records_skipped, 6);
}
