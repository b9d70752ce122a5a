//! Update broadcaster
//!
//! Fans every published snapshot out to live subscribers over a tokio
//! broadcast channel. New subscribers get the current snapshot first as
//! an `INITIAL_LOAD`, then every later snapshot as an `UPDATE`.

use chrono::Utc;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use trending_core::Token;

use crate::state::{Snapshot, TokenState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    InitialLoad,
    Update,
}

/// One message on the subscription channel.
///
/// Serializes as `{"type": "UPDATE", "tokens": [...], "ts": 1700000000000}`.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub kind: EventKind,
    pub snapshot: Arc<Snapshot>,
    /// Milliseconds since the Unix epoch
    pub ts: i64,
}

impl StreamEvent {
    pub fn new(kind: EventKind, snapshot: Arc<Snapshot>) -> Self {
        Self {
            kind,
            snapshot,
            ts: Utc::now().timestamp_millis(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.snapshot.tokens
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "type")]
    kind: EventKind,
    tokens: &'a [Token],
    ts: i64,
}

impl Serialize for StreamEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEvent {
            kind: self.kind,
            tokens: &self.snapshot.tokens,
            ts: self.ts,
        }
        .serialize(serializer)
    }
}

/// Publishes snapshots to every connected subscriber
#[derive(Debug)]
pub struct UpdateBroadcaster {
    tx: broadcast::Sender<StreamEvent>,
    state: Arc<TokenState>,
}

impl UpdateBroadcaster {
    pub fn new(capacity: usize, state: Arc<TokenState>) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, state }
    }

    /// Send `snapshot` as an `UPDATE`. Returns how many subscribers were reached.
    pub fn publish(&self, snapshot: Arc<Snapshot>) -> usize {
        let event = StreamEvent::new(EventKind::Update, snapshot);
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No live subscribers for update");
                0
            }
        }
    }

    /// Register a subscriber. It receives the current snapshot first when
    /// one exists.
    pub fn subscribe(&self) -> Subscription {
        // Subscribe before reading state so no publish falls in between
        let rx = self.tx.subscribe();
        let snapshot = self.state.snapshot();

        let initial = (!snapshot.is_empty())
            .then(|| StreamEvent::new(EventKind::InitialLoad, snapshot));

        Subscription { initial, rx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live subscriber's view of the event stream
#[derive(Debug)]
pub struct Subscription {
    initial: Option<StreamEvent>,
    rx: broadcast::Receiver<StreamEvent>,
}

impl Subscription {
    /// Next event, or `None` once the broadcaster is gone.
    /// A subscriber that falls behind skips to the newest updates.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
