//! HTTP server for the trending token aggregator
//!
//! Serves paginated queries over the current snapshot and streams every
//! new snapshot to WebSocket subscribers

pub mod server;
pub mod service;
pub mod conversions;

pub use conversions::HealthResponse;
pub use server::HttpServer;
pub use service::{create_router, AppState};
