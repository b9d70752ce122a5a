//! Trending aggregator - runs the fetch, merge and publish cycle

use futures::future::join_all;
use parking_lot::RwLock as SyncRwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use trending_core::{AppConfig, CycleError, CycleResult, FetchError, TimeWindow};
use trending_engine::MergeReducer;

use crate::broadcast::UpdateBroadcaster;
use crate::feeds::TrendingSource;
use crate::normalizer::normalize;
use crate::retry::RetryPolicy;
use crate::state::TokenState;

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub windows: Vec<TimeWindow>,
    /// Records requested per window
    pub limit: usize,
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            windows: TimeWindow::defaults(),
            limit: 100,
            interval: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&AppConfig> for AggregatorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            windows: config.aggregation.windows.clone(),
            limit: config.aggregation.limit,
            interval: config.aggregation.interval(),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// Outcome of one successful cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub sequence: u64,
    pub windows_succeeded: Vec<TimeWindow>,
    pub windows_failed: Vec<(TimeWindow, FetchError)>,
    /// Normalized tokens before merging
    pub raw_tokens: usize,
    pub merged_tokens: usize,
    pub subscribers_notified: usize,
    pub duration: Duration,
}

#[derive(Debug, Default)]
struct CycleCounters {
    run: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    last_report: SyncRwLock<Option<CycleReport>>,
}

/// Everything one cycle needs; cloned into the scheduler task
#[derive(Clone)]
struct Pipeline {
    config: AggregatorConfig,
    source: Arc<dyn TrendingSource>,
    state: Arc<TokenState>,
    broadcaster: Arc<UpdateBroadcaster>,
    counters: Arc<CycleCounters>,
}

impl Pipeline {
    async fn run_cycle(&self) -> CycleResult<CycleReport> {
        let started = Instant::now();

        let source = self.source.as_ref();
        let retry = &self.config.retry;
        let limit = self.config.limit;

        // Windows are fetched concurrently; results keep window order
        let fetches = self.config.windows.iter().map(|window| async move {
            let label = format!("window {}", window);
            let result = retry.run(&label, move |_| source.fetch(window, limit)).await;
            (window, result)
        });
        let results = join_all(fetches).await;

        let mut reducer = MergeReducer::new();
        let mut windows_succeeded = Vec::new();
        let mut windows_failed = Vec::new();

        for (window, result) in results {
            match result {
                Ok(records) => {
                    debug!("Window {} returned {} records", window, records.len());
                    reducer.extend(records.iter().map(normalize));
                    windows_succeeded.push(window.clone());
                }
                Err(e) => {
                    warn!("Window {} dropped from cycle: {}", window, e);
                    windows_failed.push((window.clone(), e));
                }
            }
        }

        // Counted once settled; a cycle dropped by shutdown never counts
        if reducer.seen() == 0 {
            self.counters.run.fetch_add(1, Ordering::Relaxed);
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            return Err(CycleError::AllWindowsFailed {
                windows: self.config.windows.len(),
            });
        }

        let raw_tokens = reducer.seen();
        let snapshot = self.state.publish(reducer.finish());
        let subscribers_notified = self.broadcaster.publish(Arc::clone(&snapshot));

        let report = CycleReport {
            sequence: snapshot.sequence,
            windows_succeeded,
            windows_failed,
            raw_tokens,
            merged_tokens: snapshot.len(),
            subscribers_notified,
            duration: started.elapsed(),
        };

        self.counters.run.fetch_add(1, Ordering::Relaxed);
        self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
        *self.counters.last_report.write() = Some(report.clone());
        Ok(report)
    }

    async fn run_logged(&self) {
        match self.run_cycle().await {
            Ok(report) => info!(
                "Cycle {} published {} tokens ({} raw) from {}/{} windows in {:?}",
                report.sequence,
                report.merged_tokens,
                report.raw_tokens,
                report.windows_succeeded.len(),
                self.config.windows.len(),
                report.duration
            ),
            Err(e) => error!("Aggregation cycle failed: {}", e),
        }
    }

    fn stats(&self) -> AggregatorStats {
        let state_stats = self.state.stats();

        AggregatorStats {
            cycles_run: self.counters.run.load(Ordering::Relaxed),
            cycles_succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            cycles_failed: self.counters.failed.load(Ordering::Relaxed),
            token_count: state_stats.token_count,
            snapshot_sequence: state_stats.sequence,
            last_update_age: state_stats.last_update_age,
            subscribers: self.broadcaster.subscriber_count(),
            last_report: self.counters.last_report.read().clone(),
        }
    }

    /// Fixed-delay loop: the first cycle runs immediately
    async fn run_loop(self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = self.run_logged() => {}
                _ = &mut shutdown => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = &mut shutdown => break,
            }
        }
        debug!("Aggregation loop exited");
    }
}

/// Main trending aggregator
pub struct TrendingAggregator {
    pipeline: Pipeline,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handles: Vec<JoinHandle<()>>,
    running: Arc<RwLock<bool>>,
}

impl TrendingAggregator {
    pub fn new(
        config: AggregatorConfig,
        source: Arc<dyn TrendingSource>,
        state: Arc<TokenState>,
        broadcaster: Arc<UpdateBroadcaster>,
    ) -> Self {
        Self {
            pipeline: Pipeline {
                config,
                source,
                state,
                broadcaster,
                counters: Arc::default(),
            },
            shutdown_tx: None,
            handles: vec![],
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Get shared state reference
    pub fn state(&self) -> Arc<TokenState> {
        Arc::clone(&self.pipeline.state)
    }

    pub fn broadcaster(&self) -> Arc<UpdateBroadcaster> {
        Arc::clone(&self.pipeline.broadcaster)
    }

    /// Run one cycle in the caller's task. On total failure the previous
    /// snapshot stays in place and nothing is broadcast.
    pub async fn run_cycle(&self) -> CycleResult<CycleReport> {
        self.pipeline.run_cycle().await
    }

    /// Start the recurring schedule
    pub async fn start(&mut self) -> anyhow::Result<()> {
        let mut running = self.running.write().await;
        if *running {
            warn!("Trending aggregator already running");
            return Ok(());
        }

        let windows: Vec<&str> = self.pipeline.config.windows.iter().map(TimeWindow::as_str).collect();
        info!(
            "Starting trending aggregator from {} for windows [{}] every {:?}",
            self.pipeline.source.name(),
            windows.join(", "),
            self.pipeline.config.interval
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let pipeline = self.pipeline.clone();
        self.handles.push(tokio::spawn(pipeline.run_loop(shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
        *running = true;

        Ok(())
    }

    /// Stop the schedule. An in-flight cycle is abandoned before it publishes.
    pub async fn stop(&mut self) {
        info!("Stopping trending aggregator");
        *self.running.write().await = false;

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Aggregation task ended abnormally: {}", e);
            }
        }
    }

    /// Check if running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Read-only handle for statistics, shareable with request handlers
    pub fn monitor(&self) -> AggregatorMonitor {
        AggregatorMonitor {
            pipeline: self.pipeline.clone(),
        }
    }

    /// Get statistics
    pub fn stats(&self) -> AggregatorStats {
        self.pipeline.stats()
    }
}

/// Cloneable view of a running aggregator's statistics
#[derive(Clone)]
pub struct AggregatorMonitor {
    pipeline: Pipeline,
}

impl AggregatorMonitor {
    pub fn stats(&self) -> AggregatorStats {
        self.pipeline.stats()
    }
}

/// Aggregator statistics
#[derive(Debug, Clone)]
pub struct AggregatorStats {
    pub cycles_run: u64,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    pub token_count: usize,
    pub snapshot_sequence: u64,
    pub last_update_age: Option<Duration>,
    pub subscribers: usize,
    pub last_report: Option<CycleReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use trending_core::{FetchResult, RawRecord};

    use crate::broadcast::EventKind;

    /// Serves canned bodies per window; windows without one fail with 500
    #[derive(Default)]
    struct ScriptedSource {
        bodies: Mutex<HashMap<String, Vec<Value>>>,
        calls: AtomicU64,
    }

    impl ScriptedSource {
        fn with(self, window: &str, records: Vec<Value>) -> Self {
            self.serve(window, records);
            self
        }

        fn serve(&self, window: &str, records: Vec<Value>) {
            self.bodies.lock().insert(window.to_string(), records);
        }

        fn fail_all(&self) {
            self.bodies.lock().clear();
        }
    }

    #[async_trait]
    impl TrendingSource for ScriptedSource {
        async fn fetch(&self, window: &TimeWindow, _limit: usize) -> FetchResult<Vec<RawRecord>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match self.bodies.lock().get(window.as_str()) {
                Some(records) => Ok(records.iter().cloned().map(RawRecord::new).collect()),
                None => Err(FetchError::Status {
                    window: window.to_string(),
                    status: 500,
                }),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn test_config() -> AggregatorConfig {
        AggregatorConfig {
            windows: TimeWindow::defaults(),
            limit: 10,
            interval: Duration::from_secs(1),
            retry: RetryPolicy::new(2, Duration::from_millis(10)),
        }
    }

    fn aggregator(source: Arc<ScriptedSource>) -> TrendingAggregator {
        let state = Arc::new(TokenState::new());
        let broadcaster = Arc::new(UpdateBroadcaster::new(16, Arc::clone(&state)));
        TrendingAggregator::new(test_config(), source, state, broadcaster)
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_still_publishes() {
        let source = Arc::new(ScriptedSource::default().with(
            "1h",
            vec![json!({"symbol": "wif", "price_usd": 2.0}), json!({"symbol": "bonk", "price_usd": 0.1})],
        ));
        let agg = aggregator(Arc::clone(&source));

        let report = agg.run_cycle().await.unwrap();
        assert_eq!(report.sequence, 1);
        assert_eq!(report.windows_succeeded.len(), 1);
        assert_eq!(report.windows_failed.len(), 3);
        assert_eq!(report.merged_tokens, 2);

        // 1 call for the good window, 2 attempts for each failing one
        assert_eq!(source.calls.load(Ordering::Relaxed), 7);
        assert_eq!(agg.state().snapshot().len(), 2);
    }

    /// Never answers; the cycle only ends when it is dropped
    struct StalledSource;

    #[async_trait]
    impl TrendingSource for StalledSource {
        async fn fetch(&self, _window: &TimeWindow, _limit: usize) -> FetchResult<Vec<RawRecord>> {
            std::future::pending().await
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_cycle_replaces_previous_snapshot() {
        let source = Arc::new(ScriptedSource::default().with("5m", vec![json!({"symbol": "OLD", "price_usd": 1.0})]));
        let agg = aggregator(Arc::clone(&source));
        let mut sub = agg.broadcaster().subscribe();

        let first = agg.run_cycle().await.unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(sub.recv().await.unwrap().tokens()[0].symbol, "OLD");

        // second cycle: only 1h answers
        source.fail_all();
        source.serve("1h", vec![json!({"symbol": "NEW", "price_usd": 2.0})]);

        let second = agg.run_cycle().await.unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.windows_failed.len(), 3);

        let snapshot = agg.state().snapshot();
        let symbols: Vec<&str> = snapshot.tokens.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["NEW"]);
        assert_eq!(snapshot.sequence, 2);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Update);
        assert_eq!(event.snapshot.sequence, 2);
        let symbols: Vec<&str> = event.tokens().iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["NEW"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_cycle_is_not_counted() {
        let state = Arc::new(TokenState::new());
        let broadcaster = Arc::new(UpdateBroadcaster::new(16, Arc::clone(&state)));
        let mut agg = TrendingAggregator::new(test_config(), Arc::new(StalledSource), state, broadcaster);

        agg.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        agg.stop().await;

        let stats = agg.stats();
        assert_eq!(stats.cycles_run, 0);
        assert_eq!(stats.cycles_succeeded + stats.cycles_failed, stats.cycles_run);
        assert_eq!(stats.snapshot_sequence, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_keeps_previous_snapshot() {
        let source = Arc::new(ScriptedSource::default().with("5m", vec![json!({"symbol": "wif"})]));
        let agg = aggregator(Arc::clone(&source));
        agg.run_cycle().await.unwrap();
        let before = agg.state().snapshot();

        let mut sub = agg.broadcaster().subscribe();
        assert_eq!(sub.recv().await.unwrap().kind, EventKind::InitialLoad);

        source.fail_all();
        let err = agg.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::AllWindowsFailed { windows: 4 }));

        let after = agg.state().snapshot();
        assert!(Arc::ptr_eq(&before, &after));

        let stats = agg.stats();
        assert_eq!(stats.cycles_run, 2);
        assert_eq!(stats.cycles_succeeded, 1);
        assert_eq!(stats.cycles_failed, 1);
        assert_eq!(stats.snapshot_sequence, 1);
        assert_eq!(stats.subscribers, 1);
        assert_eq!(agg.monitor().stats().cycles_failed, 1);

        // nothing was broadcast for the failed cycle
        let pending = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(pending.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_merge_and_reach_subscribers() {
        let source = Arc::new(
            ScriptedSource::default()
                .with("5m", vec![json!({"symbol": "WIF", "price_usd": 2.0, "volume_usd": 100.0})])
                .with("1h", vec![json!({"symbol": "wif", "price_usd": 2.5, "volume_usd": 50.0, "liquidity": 10.0})])
                .with("6h", vec![json!({"symbol": "bonk", "price_usd": 0.2})])
                .with("24h", vec![json!({"address": "Mint", "volume_usd": 1.0})]),
        );
        let agg = aggregator(source);
        let mut sub = agg.broadcaster().subscribe();

        let report = agg.run_cycle().await.unwrap();
        assert_eq!(report.raw_tokens, 4);
        assert_eq!(report.merged_tokens, 3);
        assert_eq!(report.subscribers_notified, 1);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Update);

        let wif = event.tokens().iter().find(|t| t.symbol == "WIF").unwrap();
        assert_eq!(wif.price, 2.5);
        assert_eq!(wif.volume_24h, 150.0);
        assert_eq!(wif.liquidity, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_start_stop() {
        let source = Arc::new(ScriptedSource::default().with("24h", vec![json!({"symbol": "wif"})]));
        let mut agg = aggregator(source);

        agg.start().await.unwrap();
        assert!(agg.is_running().await);

        // first cycle runs without waiting for the interval
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(agg.stats().cycles_succeeded, 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(agg.stats().cycles_succeeded >= 3);

        agg.stop().await;
        assert!(!agg.is_running().await);

        let stats = agg.stats();
        assert_eq!(stats.cycles_run, stats.cycles_succeeded + stats.cycles_failed);

        let stopped_at = stats.cycles_run;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(agg.stats().cycles_run, stopped_at);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut agg = aggregator(Arc::new(ScriptedSource::default()));
        agg.stop().await;
        assert!(!agg.is_running().await);
        assert!(agg.stats().last_report.is_none());
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig::default();
        let config = AggregatorConfig::from(&app);
        assert_eq!(config.windows.len(), 4);
        assert_eq!(config.interval, Duration::from_secs(120));
        assert_eq!(config.retry.max_attempts, 3);
    }
}
