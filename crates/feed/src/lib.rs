//! Trending token feed and aggregation pipeline
//!
//! Features:
//! - Concurrent multi-window fetch from the upstream API
//! - Bounded exponential backoff, faster on rate limits
//! - Best-effort normalization of raw upstream records
//! - Lock-free snapshot reads via atomic swap
//! - Fan-out of every published snapshot to live subscribers

pub mod normalizer;
pub mod feeds;
pub mod retry;
pub mod state;
pub mod broadcast;
pub mod aggregator;

pub use aggregator::{AggregatorConfig, AggregatorMonitor, AggregatorStats, CycleReport, TrendingAggregator};
pub use broadcast::{EventKind, StreamEvent, Subscription, UpdateBroadcaster};
pub use feeds::{HttpTrendingSource, TrendingSource, UpstreamPayload};
pub use normalizer::normalize;
pub use retry::RetryPolicy;
pub use state::{Snapshot, TokenState};
