//! KPI snapshot assembly.
//!
//! [`KpiEngine`] runs every derivation step for one display refresh and
//! packs the results into a [`KpiPayload`]. Each step degrades on its own:
//! a failed query turns into zeros for that part of the payload and a record
//! on the diagnostics log, never an error for the caller.

use crate::core::elapsed::{elapsed_since_last, Elapsed, ElapsedBucket, GAUGE_MAX_MINUTES};
use crate::core::label::{label, QualitativeLabel};
use crate::core::recent::{log_entries, LogEntry, DEFAULT_RECENT_LIMIT};
use crate::core::rolling::{aggregate, DailyBucket, RollingWindow, WINDOW_DAYS};
use crate::core::sleep::{daily_observations, reconstruct};
use crate::core::stats::{series_stats, SeriesStats};
use crate::core::{local_date, start_of_day_utc};
use crate::diagnostics::{create_shared_log, SharedSourceLog};
use crate::source::{Category, Event, EventQuery, EventSource, Order, DEFAULT_TABLE};
use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unit label used in sleep phrases.
pub const SLEEP_UNIT_LABEL: &str = "時間/日";
/// Unit label used in feeding phrases.
pub const FEEDING_UNIT_LABEL: &str = "ml/日";
/// Unit label used in diaper phrases.
pub const DIAPER_UNIT_LABEL: &str = "回/日";

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Table holding care events
    pub table: String,
    /// Display timezone for day boundaries and elapsed time
    pub timezone: Tz,
    /// Entries in the recent log feed
    pub recent_limit: usize,
    /// Absolute trend threshold for sleep (hours/day per day)
    pub sleep_trend_threshold: Option<f64>,
    /// Absolute trend threshold for feeding (ml/day per day)
    pub feeding_trend_threshold: Option<f64>,
    /// Absolute trend threshold for diaper changes (count/day per day)
    pub diaper_trend_threshold: Option<f64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            timezone: chrono_tz::Asia::Tokyo,
            recent_limit: DEFAULT_RECENT_LIMIT,
            sleep_trend_threshold: Some(0.2),
            feeding_trend_threshold: Some(10.0),
            diaper_trend_threshold: Some(0.5),
        }
    }
}

/// Elapsed time for one event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElapsedKpi {
    pub unit: String,
    /// Minutes since the last event (0 when there is none)
    pub minutes: u64,
    /// False when no matching event exists
    pub has_data: bool,
    pub bucket: ElapsedBucket,
    /// Fill of the elapsed-time gauge, 0.0..=1.0
    pub gauge_ratio: f64,
}

impl ElapsedKpi {
    pub fn from_elapsed(elapsed: Elapsed) -> Self {
        let minutes = elapsed.minutes_or_zero();
        Self {
            unit: "minutes".to_string(),
            minutes,
            has_data: elapsed.has_data(),
            bucket: ElapsedBucket::from_minutes(minutes),
            gauge_ratio: (minutes as f64 / GAUGE_MAX_MINUTES as f64).min(1.0),
        }
    }
}

/// Elapsed time for every tracked kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElapsedSummary {
    pub diaper: ElapsedKpi,
    pub feeding: ElapsedKpi,
}

/// Week-over-week view of one daily metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricKpi {
    /// Machine unit of the daily values (`hours`, `ml`, `count`)
    pub unit: String,
    /// Human unit used in the phrases
    pub label_unit: String,
    /// The current week, oldest first
    pub last_7_days: Vec<DailyBucket>,
    pub this_week_average: f64,
    pub previous_week_average: f64,
    pub stats: SeriesStats,
    pub qualitative: QualitativeLabel,
}

impl MetricKpi {
    fn from_window(
        window: &RollingWindow,
        unit: &str,
        label_unit: &str,
        threshold: Option<f64>,
    ) -> Self {
        let values = window.current_values();
        let stats = series_stats(&values);
        Self {
            unit: unit.to_string(),
            label_unit: label_unit.to_string(),
            last_7_days: window.current_week().to_vec(),
            this_week_average: stats.mean,
            previous_week_average: window.previous_week_average,
            stats,
            qualitative: label(&stats, label_unit, threshold),
        }
    }
}

/// Everything the dashboard and prompt layer need for one refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiPayload {
    /// Local calendar day the snapshot was built for
    pub as_of: NaiveDate,
    pub timezone: String,
    pub elapsed: ElapsedSummary,
    pub sleep: MetricKpi,
    pub feeding: MetricKpi,
    pub diaper_changes: MetricKpi,
    pub recent_log: Vec<LogEntry>,
}

/// Builds KPI snapshots from an event source.
pub struct KpiEngine {
    source: Arc<dyn EventSource>,
    settings: EngineSettings,
    log: SharedSourceLog,
}

impl KpiEngine {
    /// Create an engine over `source`.
    pub fn new(source: Arc<dyn EventSource>, settings: EngineSettings) -> Self {
        Self {
            source,
            settings,
            log: create_shared_log(),
        }
    }

    /// Report failures on an existing diagnostics log.
    pub fn with_log(mut self, log: SharedSourceLog) -> Self {
        self.log = log;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn log(&self) -> &SharedSourceLog {
        &self.log
    }

    /// Build a snapshot for the current instant.
    pub async fn snapshot(&self) -> KpiPayload {
        self.snapshot_at(Utc::now()).await
    }

    /// Build a snapshot as seen at `now`.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> KpiPayload {
        let tz = self.settings.timezone;
        let today = local_date(now, tz);
        let window_start = self.window_start(today);

        let diaper = self
            .elapsed(&Category::DIAPER, now, "elapsed.diaper")
            .await;
        let feeding = self
            .elapsed(&Category::FEEDING, now, "elapsed.feeding")
            .await;

        let sleep_events = self
            .fetch_or_default(
                "rolling.sleep",
                EventQuery::new(&self.settings.table, &Category::SLEEP).since(window_start),
            )
            .await;
        let sleep_window = aggregate(
            &daily_observations(&reconstruct(&sleep_events), tz),
            today,
            WINDOW_DAYS,
        );

        let feeding_events = self
            .fetch_or_default(
                "rolling.feeding",
                EventQuery::new(&self.settings.table, &Category::FEEDING)
                    .since(window_start)
                    .with_amount(),
            )
            .await;
        let feeding_window = aggregate(
            &feeding_observations(&feeding_events, tz),
            today,
            WINDOW_DAYS,
        );

        let diaper_events = self
            .fetch_or_default(
                "rolling.diaper",
                EventQuery::new(&self.settings.table, &Category::DIAPER).since(window_start),
            )
            .await;
        let diaper_window = aggregate(
            &count_observations(&diaper_events, tz),
            today,
            WINDOW_DAYS,
        );

        let recent_log = self.recent_log().await;

        self.log.record_snapshot();
        tracing::debug!(%today, "built KPI snapshot");

        KpiPayload {
            as_of: today,
            timezone: tz.name().to_string(),
            elapsed: ElapsedSummary {
                diaper: ElapsedKpi::from_elapsed(diaper),
                feeding: ElapsedKpi::from_elapsed(feeding),
            },
            sleep: MetricKpi::from_window(
                &sleep_window,
                "hours",
                SLEEP_UNIT_LABEL,
                self.settings.sleep_trend_threshold,
            ),
            feeding: MetricKpi::from_window(
                &feeding_window,
                "ml",
                FEEDING_UNIT_LABEL,
                self.settings.feeding_trend_threshold,
            ),
            diaper_changes: MetricKpi::from_window(
                &diaper_window,
                "count",
                DIAPER_UNIT_LABEL,
                self.settings.diaper_trend_threshold,
            ),
            recent_log,
        }
    }

    /// Latest events across every category, newest first.
    pub async fn recent_log(&self) -> Vec<LogEntry> {
        let query = EventQuery::new(&self.settings.table, &Category::ALL)
            .with_amount()
            .order(Order::Descending)
            .limit(self.settings.recent_limit);
        let events = self.fetch_or_default("recent", query).await;
        log_entries(&events, self.settings.timezone)
    }

    async fn elapsed(&self, categories: &[Category], now: DateTime<Utc>, step: &str) -> Elapsed {
        elapsed_since_last(
            self.source.as_ref(),
            &self.settings.table,
            categories,
            now,
            self.settings.timezone,
            &self.log,
            step,
        )
        .await
    }

    /// Local midnight of the first day in the window, as a UTC bound.
    fn window_start(&self, today: NaiveDate) -> DateTime<Utc> {
        let first_day = today
            .checked_sub_days(Days::new(WINDOW_DAYS as u64 - 1))
            .unwrap_or(NaiveDate::MIN);
        start_of_day_utc(first_day, self.settings.timezone)
    }

    async fn fetch_or_default(&self, step: &str, query: EventQuery) -> Vec<Event> {
        self.log.record_query();
        match self.source.fetch(&query).await {
            Ok(outcome) => {
                self.log.record_skipped(outcome.skipped);
                outcome.events
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", step, e);
                self.log.record_failure(step, e.to_string());
                Vec::new()
            }
        }
    }
}

/// Feeding amounts per local day. Missing amounts count as zero.
pub fn feeding_observations(events: &[Event], tz: Tz) -> Vec<(NaiveDate, f64)> {
    events
        .iter()
        .filter(|e| e.category.is_feeding())
        .map(|e| (local_date(e.timestamp, tz), e.amount_or_zero()))
        .collect()
}

/// One observation per event, for counting metrics.
pub fn count_observations(events: &[Event], tz: Tz) -> Vec<(NaiveDate, f64)> {
    events
        .iter()
        .map(|e| (local_date(e.timestamp, tz), 1.0))
        .collect()
}
