//! HTTP and WebSocket handlers

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info};

use trending_core::QueryConfig;
use trending_engine::{query_tokens, QueryPage, QueryParams, QueryRequest};
use trending_feed::{AggregatorMonitor, Subscription, TokenState, TrendingAggregator, UpdateBroadcaster};

use crate::conversions::{event_to_message, HealthResponse};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub state: Arc<TokenState>,
    pub broadcaster: Arc<UpdateBroadcaster>,
    pub monitor: AggregatorMonitor,
    pub query: QueryConfig,
}

impl AppState {
    pub fn new(aggregator: &TrendingAggregator, query: QueryConfig) -> Self {
        Self {
            state: aggregator.state(),
            broadcaster: aggregator.broadcaster(),
            monitor: aggregator.monitor(),
            query,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/tokens", get(list_tokens))
        .route("/ws", get(subscribe))
        .route("/health", get(health))
        .with_state(state)
}

/// `GET /api/tokens?sortBy=&order=&limit=&cursor=`
///
/// Malformed parameters fall back to defaults; this endpoint never rejects a query.
async fn list_tokens(
    State(app): State<AppState>,
    Query(request): Query<QueryRequest>,
) -> Json<QueryPage> {
    let params = QueryParams::from_request(&request, &app.query);
    let snapshot = app.state.snapshot();
    Json(query_tokens(&snapshot.tokens, &params))
}

async fn health(State(app): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from(&app.monitor.stats()))
}

async fn subscribe(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| {
        let subscription = app.broadcaster.subscribe();
        stream_updates(socket, subscription)
    })
}

async fn stream_updates(socket: WebSocket, mut subscription: Subscription) {
    info!("Subscriber connected");
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let Some(message) = event_to_message(&event) else { continue };
                if sender.send(message).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // client frames carry nothing
                Some(Ok(_)) => {}
            }
        }
    }

    debug!("Subscriber disconnected");
}
