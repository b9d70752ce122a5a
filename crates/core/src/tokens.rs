//! Token definitions and merge keys
//!
//! A `Token` is rebuilt from scratch every aggregation cycle; nothing
//! carries identity across cycles. Duplicates across windows collapse
//! onto a single `MergeKey`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel id when no candidate identifier field is present
pub const UNKNOWN_ID: &str = "unknown";
/// Sentinel symbol when the upstream symbol is missing or blank
pub const UNKNOWN_SYMBOL: &str = "N/A";
/// Default display name
pub const UNKNOWN_NAME: &str = "Unknown";

/// Canonical trending token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub image: String,
    pub liquidity: f64,
    pub market_cap: f64,
    pub price_change_24h: f64,
    pub volume_24h: f64,
}

impl Token {
    /// Key used to deduplicate tokens across windows
    pub fn merge_key(&self) -> MergeKey {
        if self.has_symbol() {
            MergeKey(self.symbol.to_lowercase())
        } else {
            MergeKey(self.id.to_lowercase())
        }
    }

    pub fn has_symbol(&self) -> bool {
        !self.symbol.is_empty() && self.symbol != UNKNOWN_SYMBOL
    }
}

impl Default for Token {
    fn default() -> Self {
        Self {
            id: UNKNOWN_ID.to_string(),
            symbol: UNKNOWN_SYMBOL.to_string(),
            name: UNKNOWN_NAME.to_string(),
            price: 0.0,
            image: String::new(),
            liquidity: 0.0,
            market_cap: 0.0,
            price_change_24h: 0.0,
            volume_24h: 0.0,
        }
    }
}

/// Lowercased symbol, or lowercased id for tokens without a usable symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MergeKey(String);

impl MergeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MergeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
