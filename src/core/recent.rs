//! Latest-events feed for the log card.

use crate::source::Event;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Default number of entries in the feed.
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// One line of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local time of day, `HH:MM`
    pub time: String,
    /// What happened
    pub action: String,
}

impl LogEntry {
    /// Render an event in `tz`. Feeding amounts are appended when the label
    /// doesn't already mention them.
    pub fn from_event(event: &Event, tz: Tz) -> Self {
        let time = event.timestamp.with_timezone(&tz).format("%H:%M").to_string();
        let mut action = event.display_label();

        if event.category.is_feeding() {
            if let Some(amount) = event.amount.filter(|a| *a > 0.0) {
                if !action.contains("ml") {
                    action = format!("{action}, {amount:.0}ml");
                }
            }
        }

        Self { time, action }
    }
}

/// Render events (already newest first) as feed entries.
pub fn log_entries(events: &[Event], tz: Tz) -> Vec<LogEntry> {
    events.iter().map(|e| LogEntry::from_event(e, tz)).collect()
}
