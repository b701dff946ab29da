//! Babycare KPI - event-to-KPI derivation for infant-care dashboards.
//!
//! This library turns a timestamped care log (diaper changes, feedings,
//! sleep start/end markers) into the numbers a caregiver dashboard shows and
//! the labels a language-model prompt can safely quote.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Babycare KPI                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │ EventSource │──▶│   Elapsed   │──▶│             │             │
//! │  │ (REST/mem)  │   │    Sleep    │   │   Rolling   │             │
//! │  └─────────────┘   │ reconstruct │──▶│  14 days    │             │
//! │         │          └─────────────┘   └─────────────┘             │
//! │         ▼                                   │                    │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │ Diagnostics │   │ KPI payload │◀──│ Stats/Label │             │
//! │  │     log     │   │             │   │             │             │
//! │  └─────────────┘   └─────────────┘   └─────────────┘             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use babycare_kpi::{core::{EngineSettings, KpiEngine}, source::MemorySource};
//!
//! # async fn demo() {
//! let settings = EngineSettings::default();
//! let source = MemorySource::sample(chrono::Utc::now(), settings.timezone);
//! let engine = KpiEngine::new(Arc::new(source), settings);
//!
//! let payload = engine.snapshot().await;
//! println!("{}", payload.sleep.qualitative.trend);
//! # }
//! ```

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod source;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, ThresholdConfig};
pub use core::{EngineSettings, KpiEngine, KpiPayload};
pub use diagnostics::{SharedSourceLog, SourceLog, SourceStats};
pub use source::{
    CachedSource, Category, Event, EventQuery, EventSource, MemorySource, RestEventSource,
    SourceError, StoreConfig,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Guidance attached to prompts built from a [`KpiPayload`].
///
/// The payload's qualitative labels are written for caregivers; this note
/// tells the model how to use them.
pub const PROMPT_GUIDANCE: &str = "\
以下は赤ちゃんのお世話記録から作った要約です。
・数値の統計用語(分散、標準偏差、傾きなど)は使わず、ラベルの言葉で説明してください。
・医療的な判断はせず、気になる場合はかかりつけ医への相談をすすめてください。";
