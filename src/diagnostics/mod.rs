//! Diagnostics for the KPI pipeline.
//!
//! Failed event store queries are reported here rather than propagated, so
//! the dashboard always has a payload to render.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, SharedSourceLog, SourceIssue, SourceLog, SourceStats};
