//! Event-to-KPI derivation.
//!
//! This module contains:
//! - Elapsed time since the last event of a kind
//! - Sleep interval reconstruction from start/end markers
//! - Rolling daily aggregation over a two-week window
//! - Summary statistics and qualitative labels
//! - KPI snapshot assembly

pub mod elapsed;
pub mod kpi;
pub mod label;
pub mod recent;
pub mod rolling;
pub mod sleep;
pub mod stats;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

// Re-export commonly used types
pub use elapsed::{elapsed_since_last, Elapsed, ElapsedBucket};
pub use kpi::{EngineSettings, ElapsedKpi, KpiEngine, KpiPayload, MetricKpi};
pub use label::{label, QualitativeLabel, Trend, Variability};
pub use recent::LogEntry;
pub use rolling::{aggregate, DailyBucket, RollingWindow};
pub use sleep::{reconstruct, SleepInterval};
pub use stats::{series_stats, SeriesStats};

/// Calendar day of `instant` in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// The UTC instant at which `date` begins in `tz`.
pub fn start_of_day_utc(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    local_to_utc(date.and_time(chrono::NaiveTime::default()), tz)
}

/// Resolve a wall-clock time in `tz` to UTC.
///
/// Ambiguous times take the earlier instant. A time inside a DST gap moves
/// forward to the first wall-clock time that exists.
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    (0..=96)
        .find_map(|quarter| {
            tz.from_local_datetime(&(local + Duration::minutes(15 * quarter)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| local.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Tokyo;

    #[test]
    fn test_local_date_uses_timezone() {
        // 16:00 UTC on May 1 is already May 2 in Tokyo
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 16, 0, 0).unwrap();
        assert_eq!(
            local_date(instant, Tokyo),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
        );
        assert_eq!(
            local_date(instant, chrono_tz::UTC),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
    }

    #[test]
    fn test_start_of_day_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert_eq!(
            start_of_day_utc(date, Tokyo),
            Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_start_of_day_inside_dst_gap() {
        // Santiago skips 00:00-01:00 on 2024-09-08; the day starts at 01:00 -03
        let date = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
        let start = start_of_day_utc(date, chrono_tz::America::Santiago);

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap());
        assert_eq!(local_date(start, chrono_tz::America::Santiago), date);
    }

    #[test]
    fn test_local_to_utc_takes_earlier_of_ambiguous() {
        // 01:30 happens twice in New York on 2024-11-03; the first is EDT
        let local = NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        assert_eq!(
            local_to_utc(local, chrono_tz::America::New_York),
            Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap()
        );
    }
}
