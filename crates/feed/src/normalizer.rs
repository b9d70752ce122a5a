//! Raw record normalization
//!
//! `normalize` is total: every field has an ordered list of candidate
//! keys and a default. Upstream data of any shape degrades to defaults,
//! it never aborts a cycle.
//!
//! Numeric candidates treat zero the same as absent and keep falling
//! back. Downstream merge logic relies on zero meaning "unknown".

use serde_json::Value;

use trending_core::{RawRecord, Token, UNKNOWN_ID, UNKNOWN_NAME, UNKNOWN_SYMBOL};

const ID_FIELDS: &[&str] = &["token_address", "address", "id", "mint"];
const SYMBOL_FIELDS: &[&str] = &["symbol", "token_symbol", "ticker"];
const NAME_FIELDS: &[&str] = &["name", "token_name"];
const IMAGE_FIELDS: &[&str] = &["logo_uri", "logoURI", "image", "image_url", "logo"];

const PRICE_FIELDS: &[&str] = &["price_usd", "priceUsd", "price"];
const LIQUIDITY_FIELDS: &[&str] = &["liquidity_usd", "liquidity"];
const MARKET_CAP_FIELDS: &[&str] = &["market_cap", "marketCap", "fdv"];
const PRICE_CHANGE_FIELDS: &[&str] = &["price_change_24h", "priceChange24h", "price_change_percent"];

const BUY_VOLUME_FIELDS: &[&str] = &["buy_volume_usd", "buy_volume"];
const SELL_VOLUME_FIELDS: &[&str] = &["sell_volume_usd", "sell_volume"];
const TOTAL_VOLUME_FIELDS: &[&str] = &["volume_usd", "volume_24h", "volume"];

/// Convert one upstream record into the canonical token shape
pub fn normalize(raw: &RawRecord) -> Token {
    let symbol = first_text(raw, SYMBOL_FIELDS)
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| UNKNOWN_SYMBOL.to_string());

    let buy_sell = first_number(raw, BUY_VOLUME_FIELDS) + first_number(raw, SELL_VOLUME_FIELDS);
    let volume_24h = if buy_sell != 0.0 {
        buy_sell
    } else {
        first_number(raw, TOTAL_VOLUME_FIELDS)
    };

    Token {
        id: first_text(raw, ID_FIELDS).unwrap_or_else(|| UNKNOWN_ID.to_string()),
        symbol,
        name: first_text(raw, NAME_FIELDS).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        price: first_number(raw, PRICE_FIELDS),
        image: first_text(raw, IMAGE_FIELDS).unwrap_or_default(),
        liquidity: first_number(raw, LIQUIDITY_FIELDS),
        market_cap: first_number(raw, MARKET_CAP_FIELDS),
        price_change_24h: first_number(raw, PRICE_CHANGE_FIELDS),
        volume_24h,
    }
}

/// First candidate holding a non-blank string (numbers are stringified)
fn first_text(raw: &RawRecord, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match raw.get(field)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First candidate holding a finite, non-zero number, else 0
fn first_number(raw: &RawRecord, fields: &[&str]) -> f64 {
    fields
        .iter()
        .filter_map(|field| raw.get(field).and_then(coerce_number))
        .find(|v| *v != 0.0)
        .unwrap_or(0.0)
}

fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
