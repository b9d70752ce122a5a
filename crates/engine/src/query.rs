//! Query engine - filter, sort and paginate a merged snapshot

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use trending_core::{QueryConfig, Token};

use crate::cursor::{encode_cursor, offset_or_zero};

/// Sort key for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Price,
    #[default]
    Volume,
}

impl SortField {
    /// `"price"` selects price, anything else volume
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("price") => SortField::Price,
            _ => SortField::Volume,
        }
    }

    fn key(&self, token: &Token) -> f64 {
        match self {
            SortField::Price => token.price,
            SortField::Volume => token.volume_24h,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `"asc"` selects ascending, anything else descending
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

/// Raw query-string parameters, every field optional and unvalidated
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

/// Validated query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub sort_by: SortField,
    pub order: SortOrder,
    pub limit: usize,
    pub cursor: Option<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            sort_by: SortField::Volume,
            order: SortOrder::Desc,
            limit: 50,
            cursor: None,
        }
    }
}

impl QueryParams {
    /// Lenient parse: unknown values fall back to defaults and the limit
    /// is clamped into `1..=max_limit`.
    pub fn from_request(request: &QueryRequest, limits: &QueryConfig) -> Self {
        let limit = request
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .unwrap_or(limits.default_limit)
            .clamp(1, limits.max_limit.max(1));

        Self {
            sort_by: SortField::parse(request.sort_by.as_deref()),
            order: SortOrder::parse(request.order.as_deref()),
            limit,
            cursor: request.cursor.clone().filter(|c| !c.trim().is_empty()),
        }
    }

    /// Page size, at least 1
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn sorted_by(mut self, sort_by: SortField, order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.order = order;
        self
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub tokens: Vec<Token>,
    pub next_cursor: Option<String>,
    /// Count after filtering, before pagination
    pub total: usize,
    pub limit: usize,
}

/// Filter, sort and paginate `tokens`. Pure; never mutates its input.
pub fn query_tokens(tokens: &[Token], params: &QueryParams) -> QueryPage {
    // NaN fails the comparison and is dropped with negative prices
    let mut filtered: Vec<&Token> = tokens.iter().filter(|t| t.price >= 0.0).collect();

    let field = params.sort_by;
    filtered.sort_by(|a, b| {
        let ord = field
            .key(a)
            .partial_cmp(&field.key(b))
            .unwrap_or(Ordering::Equal);
        match params.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    // An empty page would hand back the same cursor forever
    let limit = params.limit.max(1);
    let total = filtered.len();
    let start = offset_or_zero(params.cursor.as_deref());
    let end = start.saturating_add(limit);

    let page: Vec<Token> = filtered
        .into_iter()
        .skip(start)
        .take(limit)
        .cloned()
        .collect();

    let next_cursor = if end < total {
        Some(encode_cursor(end))
    } else {
        None
    };

    QueryPage {
        tokens: page,
        next_cursor,
        total,
        limit,
    }
}
