//! Configuration types
//!
//! Every section deserializes with defaults, so an empty environment
//! yields a runnable local configuration. Environment variables use the
//! `TRENDING_` prefix and `__` between section and key, e.g.
//! `TRENDING_AGGREGATION__INTERVAL_MS=60000` or
//! `TRENDING_AGGREGATION__WINDOWS=5m,1h`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ConfigError, ConfigResult, TimeWindow};

/// HTTP / WebSocket listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream market-data API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9090/trending".to_string(),
            api_key: None,
            timeout_ms: 10_000,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Aggregation cadence and the windows polled each cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub interval_ms: u64,
    pub windows: Vec<TimeWindow>,
    /// Records requested per window
    pub limit: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 120_000,
            windows: TimeWindow::defaults(),
            limit: 100,
        }
    }
}

impl AggregationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Per-window fetch retry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Updates buffered per subscriber before it starts skipping
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

/// Query endpoint paging limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub aggregation: AggregationConfig,
    pub retry: RetryConfig,
    pub broadcast: BroadcastConfig,
    pub query: QueryConfig,
}

impl AppConfig {
    /// Environment source with the `TRENDING_` prefix
    pub fn environment() -> config::Environment {
        config::Environment::with_prefix("TRENDING")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("aggregation.windows")
            .try_parsing(true)
    }

    /// Load from the process environment and validate
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_source(Self::environment())
    }

    pub fn from_source(source: config::Environment) -> ConfigResult<Self> {
        let settings = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let app: AppConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.aggregation.windows.is_empty() {
            return Err(ConfigError::Invalid("at least one time window is required".into()));
        }
        if self.aggregation.limit == 0 {
            return Err(ConfigError::Invalid("aggregation.limit must be positive".into()));
        }
        if self.aggregation.interval_ms == 0 {
            return Err(ConfigError::Invalid("aggregation.interval_ms must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.broadcast.capacity == 0 {
            return Err(ConfigError::Invalid("broadcast.capacity must be positive".into()));
        }
        if self.query.default_limit == 0 || self.query.default_limit > self.query.max_limit {
            return Err(ConfigError::Invalid(format!(
                "query.default_limit {} must be within 1..={}",
                self.query.default_limit, self.query.max_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::environment().source(Some(map))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.aggregation.interval(), Duration::from_secs(120));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.query.default_limit, 50);
        assert_eq!(config.aggregation.windows.len(), 4);
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::from_source(env(&[
            ("TRENDING_AGGREGATION__INTERVAL_MS", "60000"),
            ("TRENDING_AGGREGATION__WINDOWS", "5m,1h"),
            ("TRENDING_SERVER__PORT", "9001"),
            ("TRENDING_RETRY__BASE_DELAY_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.aggregation.interval_ms, 60_000);
        let windows: Vec<_> = config.aggregation.windows.iter().map(|w| w.to_string()).collect();
        assert_eq!(windows, vec!["5m", "1h"]);
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.retry.base_delay(), Duration::from_millis(250));
        assert_eq!(config.upstream.timeout_ms, 10_000);
    }

    #[test]
    fn test_validation_rejects_zero_limit() {
        let mut config = AppConfig::default();
        config.aggregation.limit = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.aggregation.windows.clear();
        assert!(config.validate().is_err());
    }
}
