//! REST adapter for the hosted event store.
//!
//! The store exposes a PostgREST-style API: one table per log, filters in the
//! query string, `apikey` plus bearer authentication. The adapter only reads.

use crate::source::types::RawEventRecord;
use crate::source::{EventQuery, EventSource, FetchOutcome, SourceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Event store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store (e.g. https://xyz.supabase.co)
    pub base_url: String,
    /// API key sent as `apikey` and bearer token
    pub api_key: String,
    /// Table holding care events
    pub table: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:54321".to_string(),
            api_key: String::new(),
            table: super::DEFAULT_TABLE.to_string(),
            timeout_secs: 10,
        }
    }
}

impl StoreConfig {
    /// Create a new store configuration.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Get the REST root URL.
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.base_url.trim_end_matches('/'))
    }

    /// Get the URL for a table.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url(), table)
    }
}

/// Translate a query into PostgREST query-string parameters.
pub fn query_params(query: &EventQuery) -> Vec<(String, String)> {
    let mut select = vec!["timestamp", "category", "label"];
    if query.include_amount {
        select.push("amount");
    }

    let categories = query
        .categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let mut params = vec![
        ("select".to_string(), select.join(",")),
        ("category".to_string(), format!("in.({categories})")),
    ];

    if let Some(since) = query.since {
        params.push((
            "timestamp".to_string(),
            format!(
                "gte.{}",
                since.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            ),
        ));
    }

    params.push((
        "order".to_string(),
        format!("timestamp.{}", query.order.as_str()),
    ));

    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }

    params
}

/// Read-only client for the event store.
pub struct RestEventSource {
    config: StoreConfig,
    client: reqwest::Client,
}

impl RestEventSource {
    /// Create a new client from explicit configuration.
    pub fn new(config: StoreConfig) -> Result<Self, SourceError> {
        if config.base_url.trim().is_empty() {
            return Err(SourceError::Config("Store base URL is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| SourceError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            return request;
        }
        request
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
    }

    /// Test connection to the store by reading at most one row.
    pub async fn test_connection(&self) -> Result<bool, SourceError> {
        let response = self
            .authorized(self.client.get(self.config.table_url(&self.config.table)))
            .query(&[("select", "timestamp"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl EventSource for RestEventSource {
    async fn fetch(&self, query: &EventQuery) -> Result<FetchOutcome, SourceError> {
        let url = self.config.table_url(&query.table);
        tracing::debug!(%url, categories = query.categories.len(), "querying event store");

        let response = self
            .authorized(self.client.get(&url))
            .header("Accept", "application/json")
            .query(&query_params(query))
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SourceError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let records: Vec<RawEventRecord> = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        Ok(decode_records(records))
    }
}

/// Coerce raw records, skipping the ones that cannot be repaired.
pub fn decode_records(records: Vec<RawEventRecord>) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();
    for record in records {
        match record.into_event() {
            Ok(event) => outcome.events.push(event),
            Err(issue) => {
                tracing::warn!("Skipping event record: {}", issue);
                outcome.skipped += 1;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Category, Order};
    use chrono::{TimeZone, Utc};

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_store_config_url() {
        let config = StoreConfig::new("https://store.example.com/", "key");
        assert_eq!(config.rest_url(), "https://store.example.com/rest/v1");
        assert_eq!(
            config.table_url("baby_events"),
            "https://store.example.com/rest/v1/baby_events"
        );
    }

    #[test]
    fn test_latest_query_params() {
        let q = EventQuery::latest("baby_events", &Category::FEEDING);
        let params = query_params(&q);

        assert_eq!(param(&params, "select"), Some("timestamp,category,label"));
        assert_eq!(param(&params, "category"), Some("in.(formula,breast)"));
        assert_eq!(param(&params, "order"), Some("timestamp.desc"));
        assert_eq!(param(&params, "limit"), Some("1"));
        assert_eq!(param(&params, "timestamp"), None);
    }

    #[test]
    fn test_ranged_query_params() {
        let since = Utc.with_ymd_and_hms(2024, 4, 17, 15, 0, 0).unwrap();
        let q = EventQuery::new("baby_events", &Category::FEEDING)
            .with_amount()
            .since(since)
            .order(Order::Ascending);
        let params = query_params(&q);

        assert_eq!(
            param(&params, "select"),
            Some("timestamp,category,label,amount")
        );
        assert_eq!(param(&params, "timestamp"), Some("gte.2024-04-17T15:00:00Z"));
        assert_eq!(param(&params, "order"), Some("timestamp.asc"));
        assert_eq!(param(&params, "limit"), None);
    }

    #[test]
    fn test_decode_records_skips_bad_rows() {
        let records: Vec<RawEventRecord> = serde_json::from_value(serde_json::json!([
            {"timestamp": "2024-05-01T00:00:00+00:00", "category": "formula", "amount": 100},
            {"timestamp": "2024-05-01T01:00:00+00:00", "category": "unknown"},
            {"category": "diaper_pee"},
            {"timestamp": "2024-05-01T02:00:00+00:00", "category": "diaper_pee", "amount": null}
        ]))
        .unwrap();

        let outcome = decode_records(records);
        assert_eq!(outcome.events.len(), 2);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.events[0].amount, Some(100.0));
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let config = StoreConfig::new("  ", "key");
        assert!(matches!(
            RestEventSource::new(config),
            Err(SourceError::Config(_))
        ));
    }
}
