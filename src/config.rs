//! Configuration for the babycare KPI engine.

use crate::core::kpi::EngineSettings;
use crate::core::recent::DEFAULT_RECENT_LIMIT;
use crate::source::StoreConfig;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event store connection
    pub store: StoreConfig,

    /// IANA timezone used for day boundaries and elapsed time
    pub timezone: String,

    /// How long query results are reused (0 disables caching)
    pub cache_ttl_secs: u64,

    /// Entries in the recent log feed
    pub recent_limit: usize,

    /// Absolute trend thresholds per metric
    pub thresholds: ThresholdConfig,

    /// Port for `serve`
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            timezone: "Asia/Tokyo".to_string(),
            cache_ttl_secs: 60,
            recent_limit: DEFAULT_RECENT_LIMIT,
            thresholds: ThresholdConfig::default(),
            server_port: 8787,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it doesn't exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("babycare-kpi")
            .join("config.json")
    }

    /// Check values that serde alone can't.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        if self.recent_limit == 0 {
            return Err(ConfigError::Invalid("recent_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Parsed display timezone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    /// Query cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Engine settings derived from this configuration.
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        self.validate()?;
        Ok(EngineSettings {
            table: self.store.table.clone(),
            timezone: self.tz()?,
            recent_limit: self.recent_limit,
            sleep_trend_threshold: self.thresholds.sleep_hours_per_day,
            feeding_trend_threshold: self.thresholds.feeding_ml_per_day,
            diaper_trend_threshold: self.thresholds.diaper_changes_per_day,
        })
    }
}

/// Absolute slope (per day) above which a metric counts as trending.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub sleep_hours_per_day: Option<f64>,
    pub feeding_ml_per_day: Option<f64>,
    pub diaper_changes_per_day: Option<f64>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            sleep_hours_per_day: Some(0.2),
            feeding_ml_per_day: Some(10.0),
            diaper_changes_per_day: Some(0.5),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
