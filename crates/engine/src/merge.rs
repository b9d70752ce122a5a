//! Merge reducer - folds tokens from every window into one collection

use std::collections::HashMap;

use trending_core::{MergeKey, Token};

/// Accumulates tokens keyed by `MergeKey`, preserving first-seen order
#[derive(Debug, Default)]
pub struct MergeReducer {
    index: HashMap<MergeKey, usize>,
    merged: Vec<Token>,
    seen: usize,
}

impl MergeReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one token. The first occurrence of a key seeds the entry,
    /// later occurrences are combined into it.
    pub fn push(&mut self, token: Token) {
        self.seen += 1;
        let key = token.merge_key();

        match self.index.get(&key) {
            Some(&pos) => combine(&mut self.merged[pos], &token),
            None => {
                self.index.insert(key, self.merged.len());
                self.merged.push(token);
            }
        }
    }

    /// Number of tokens pushed so far
    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn finish(self) -> Vec<Token> {
        self.merged
    }
}

impl Extend<Token> for MergeReducer {
    fn extend<I: IntoIterator<Item = Token>>(&mut self, iter: I) {
        for token in iter {
            self.push(token);
        }
    }
}

/// Merge a sequence of tokens. Output order is first-seen key order.
pub fn merge_tokens<I>(tokens: I) -> Vec<Token>
where
    I: IntoIterator<Item = Token>,
{
    let mut reducer = MergeReducer::new();
    reducer.extend(tokens);
    reducer.finish()
}

/// Identity fields (id, symbol, name, image, price change) stay first-seen.
fn combine(existing: &mut Token, incoming: &Token) {
    // Zero price means "unknown", never overwrite with it
    if incoming.price != 0.0 && (existing.price == 0.0 || incoming.price > existing.price) {
        existing.price = incoming.price;
    }
    existing.volume_24h += incoming.volume_24h;
    existing.liquidity = existing.liquidity.max(incoming.liquidity);
    existing.market_cap = existing.market_cap.max(incoming.market_cap);
}
