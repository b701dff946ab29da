//! Typed care events and the raw record shape returned by the event store.
//!
//! External records are loosely typed JSON. They are coerced into [`Event`]
//! here, at the adapter boundary, so the rest of the crate only ever sees the
//! closed category set and UTC instants.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of care event recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DiaperPee,
    DiaperPoo,
    SleepStart,
    SleepEnd,
    Formula,
    Breast,
}

impl Category {
    /// Every known category.
    pub const ALL: [Category; 6] = [
        Category::DiaperPee,
        Category::DiaperPoo,
        Category::SleepStart,
        Category::SleepEnd,
        Category::Formula,
        Category::Breast,
    ];

    /// Diaper change categories.
    pub const DIAPER: [Category; 2] = [Category::DiaperPee, Category::DiaperPoo];

    /// Feeding categories.
    pub const FEEDING: [Category; 2] = [Category::Formula, Category::Breast];

    /// Sleep boundary categories.
    pub const SLEEP: [Category; 2] = [Category::SleepStart, Category::SleepEnd];

    /// Wire name used by the event store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DiaperPee => "diaper_pee",
            Category::DiaperPoo => "diaper_poo",
            Category::SleepStart => "sleep_start",
            Category::SleepEnd => "sleep_end",
            Category::Formula => "formula",
            Category::Breast => "breast",
        }
    }

    /// Parse a wire name. Surrounding whitespace and case are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Caregiver-facing name, used when a record carries no label.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::DiaperPee => "おむつ替え(おしっこ)",
            Category::DiaperPoo => "おむつ替え(うんち)",
            Category::SleepStart => "ねんね開始",
            Category::SleepEnd => "起床",
            Category::Formula => "ミルク",
            Category::Breast => "授乳",
        }
    }

    pub fn is_feeding(&self) -> bool {
        Self::FEEDING.contains(self)
    }

    pub fn is_diaper(&self) -> bool {
        Self::DIAPER.contains(self)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single timestamped care action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub category: Category,
    /// Amount in ml (feeding categories only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Free-form display label from the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, category: Category) -> Self {
        Self {
            timestamp,
            category,
            amount: None,
            label: None,
        }
    }

    /// Attach an amount (ml).
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Attach a display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Amount with missing values coerced to zero.
    pub fn amount_or_zero(&self) -> f64 {
        self.amount.filter(|a| a.is_finite()).unwrap_or(0.0)
    }

    /// Label to show in the log feed.
    pub fn display_label(&self) -> String {
        match self.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => self.category.display_name().to_string(),
        }
    }
}

/// A record as it arrives from the event store, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEventRecord {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Why a raw record could not be turned into an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordIssue {
    MissingTimestamp,
    BadTimestamp(String),
    MissingCategory,
    UnknownCategory(String),
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordIssue::MissingTimestamp => write!(f, "record has no timestamp"),
            RecordIssue::BadTimestamp(ts) => write!(f, "unparseable timestamp '{ts}'"),
            RecordIssue::MissingCategory => write!(f, "record has no category"),
            RecordIssue::UnknownCategory(c) => write!(f, "unknown category '{c}'"),
        }
    }
}

impl RawEventRecord {
    /// Validate and coerce into an [`Event`].
    ///
    /// Timestamp and category are required. A malformed `amount` is coerced
    /// to `0.0` rather than rejecting the record.
    pub fn into_event(self) -> Result<Event, RecordIssue> {
        let ts = self.timestamp.ok_or(RecordIssue::MissingTimestamp)?;
        let timestamp = parse_timestamp(&ts).ok_or(RecordIssue::BadTimestamp(ts))?;

        let raw_category = self.category.ok_or(RecordIssue::MissingCategory)?;
        let category =
            Category::parse(&raw_category).ok_or(RecordIssue::UnknownCategory(raw_category))?;

        let amount = self.amount.and_then(coerce_amount);

        Ok(Event {
            timestamp,
            category,
            amount,
            label: self.label,
        })
    }
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // PostgREST renders `timestamptz` with a space separator and short offset
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Null stays absent; numbers and numeric strings pass; anything else is 0.
fn coerce_amount(value: serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Number(n) => Some(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Some(s.trim().parse::<f64>().unwrap_or(0.0)),
        _ => Some(0.0),
    }
}
