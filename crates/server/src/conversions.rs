//! Conversions between internal types and wire responses

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use tracing::error;

use trending_feed::{AggregatorStats, StreamEvent};

/// `GET /health` body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok" once a snapshot exists, "warming" before
    pub status: String,
    pub tokens: usize,
    pub cycles: u64,
    pub cycles_failed: u64,
    pub last_update_age_ms: Option<u64>,
    pub subscribers: usize,
}

impl From<&AggregatorStats> for HealthResponse {
    fn from(stats: &AggregatorStats) -> Self {
        let status = if stats.snapshot_sequence > 0 { "ok" } else { "warming" };

        Self {
            status: status.to_string(),
            tokens: stats.token_count,
            cycles: stats.cycles_run,
            cycles_failed: stats.cycles_failed,
            last_update_age_ms: stats.last_update_age.map(|age| age.as_millis() as u64),
            subscribers: stats.subscribers,
        }
    }
}

/// JSON text frame for one subscription event
pub fn event_to_message(event: &StreamEvent) -> Option<Message> {
    match event.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to encode {:?} event: {}", event.kind, e);
            None
        }
    }
}
