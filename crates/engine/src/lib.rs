//! Token merge and query engine
//!
//! Features:
//! - Key-based deduplication of tokens across time windows
//! - Stable sort by price or volume
//! - Opaque cursor pagination
//! - Pure functions over immutable snapshots, safe to run concurrently

pub mod merge;
pub mod cursor;
pub mod query;

pub use merge::{merge_tokens, MergeReducer};
pub use cursor::{decode_cursor, encode_cursor, offset_or_zero};
pub use query::{query_tokens, QueryPage, QueryParams, QueryRequest, SortField, SortOrder};
