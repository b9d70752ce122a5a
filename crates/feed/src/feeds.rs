//! Upstream trending-token sources

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use trending_core::{FetchError, FetchResult, RawRecord, TimeWindow, UpstreamConfig};

/// Accepted response shapes, validated before records reach the normalizer
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UpstreamPayload {
    /// `[ {...}, {...} ]`
    Bare(Vec<RawRecord>),
    /// `{ "data": [ {...}, {...} ] }`
    Wrapped { data: Vec<RawRecord> },
}

impl UpstreamPayload {
    /// Validate a decoded body and extract its records
    pub fn parse(window: &TimeWindow, body: Value) -> FetchResult<Vec<RawRecord>> {
        let shape = describe(&body);
        let payload: UpstreamPayload =
            serde_json::from_value(body).map_err(|_| FetchError::UnexpectedShape {
                window: window.to_string(),
                message: format!("expected an array or an object with a data array, got {shape}"),
            })?;

        let records = payload.into_records();
        if records.is_empty() {
            return Err(FetchError::Empty {
                window: window.to_string(),
            });
        }
        Ok(records)
    }

    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            UpstreamPayload::Bare(records) => records,
            UpstreamPayload::Wrapped { data } => data,
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Source of raw trending records for one window
#[async_trait]
pub trait TrendingSource: Send + Sync {
    /// Fetch up to `limit` records for `window`. An empty result is an error.
    async fn fetch(&self, window: &TimeWindow, limit: usize) -> FetchResult<Vec<RawRecord>>;

    fn name(&self) -> &str;
}

/// HTTP source: `GET {base_url}?interval={window}&limit={limit}`
pub struct HttpTrendingSource {
    config: UpstreamConfig,
    client: reqwest::Client,
}

impl HttpTrendingSource {
    pub fn new(config: UpstreamConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

#[async_trait]
impl TrendingSource for HttpTrendingSource {
    async fn fetch(&self, window: &TimeWindow, limit: usize) -> FetchResult<Vec<RawRecord>> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            window: window.to_string(),
            message: e.to_string(),
        };

        let limit = limit.to_string();
        let mut request = self
            .client
            .get(&self.config.base_url)
            .query(&[("interval", window.as_str()), ("limit", limit.as_str())]);

        if let Some(key) = &self.config.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                window: window.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(transport)?;
        let records = UpstreamPayload::parse(window, body)?;
        debug!("Fetched {} records for window {}", records.len(), window);

        Ok(records)
    }

    fn name(&self) -> &str {
        "http"
    }
}
