//! Lock-free snapshot state
//!
//! The current snapshot sits behind an `ArcSwap`. Readers load an `Arc`
//! and keep a consistent view for as long as they hold it; the
//! scheduler installs a whole new snapshot after each successful cycle.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use trending_core::Token;

/// Merged tokens of one successful cycle. Never mutated after publication.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tokens: Vec<Token>,
    pub published_at: DateTime<Utc>,
    /// 0 for the initial empty snapshot, then one per publish
    pub sequence: u64,
    /// Monotonic publish time, `None` for the initial empty snapshot
    pub published: Option<Instant>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            tokens: Vec::new(),
            published_at: Utc::now(),
            sequence: 0,
            published: None,
        }
    }

    /// Time since publication, `None` before the first publish
    pub fn age(&self) -> Option<Duration> {
        self.published.map(|at| at.elapsed())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}

/// Holder of the process-wide current snapshot
#[derive(Debug)]
pub struct TokenState {
    current: ArcSwap<Snapshot>,
    sequence: AtomicU64,
}

impl TokenState {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Current snapshot; cheap, never blocks on the writer
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replace the snapshot wholesale and return the new one
    pub fn publish(&self, tokens: Vec<Token>) -> Arc<Snapshot> {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(Snapshot {
            tokens,
            published_at: Utc::now(),
            sequence,
            published: Some(Instant::now()),
        });

        self.current.store(Arc::clone(&snapshot));
        snapshot
    }

    pub fn has_data(&self) -> bool {
        !self.current.load().is_empty()
    }

    /// All fields come from one snapshot load
    pub fn stats(&self) -> TokenStateStats {
        let current = self.current.load();
        TokenStateStats {
            token_count: current.len(),
            sequence: current.sequence,
            last_update_age: current.age(),
        }
    }
}

impl Default for TokenState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about token state
#[derive(Debug, Clone)]
pub struct TokenStateStats {
    pub token_count: usize,
    pub sequence: u64,
    /// `None` until the first publish
    pub last_update_age: Option<Duration>,
}
