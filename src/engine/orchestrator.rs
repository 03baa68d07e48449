//! # engine::orchestrator
//!
//! **Polling Orchestrator**: one pass across every subscriber's exchanges.
//!
//! ## Flow (per cycle)
//! ```text
//! requests: subscriber → {exchange ids}
//!     │
//!     ├─ 1. distinct exchange ids not yet in the cycle cache
//!     ├─ 2. fan out concurrently, fetch under the cycle deadline:
//!     │      tickers, then candles (per symbol, bounded concurrency)
//!     ├─ 3. apply complete snapshots: price machine, then RSI machine
//!     ├─ 4. cache: exchange → events (failed / timed out → empty)
//!     └─ 5. per subscriber: concatenate cached events of its exchanges
//! ```
//!
//! Every exchange is fetched at most once per cycle however many subscribers
//! ask for it, and all of them receive the same `Arc<AlertEvent>`s. An exchange
//! that fails or times out changes no state. The wall clock decides which
//! candles are requested and which bars an adapter still treats as forming.
//! Once a snapshot is fetched, the events follow from it and the prior state
//! alone.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AlertConfig;
use crate::error::FetchError;
use crate::exchange::{Exchange, ExchangeRegistry};
use crate::models::{AlertEvent, Candle, Ticker};
use crate::state::{SymbolKey, SymbolStore};

pub type SubscriberId = String;

// ─── Cycle Cache ──────────────────────────────────────────────────────────────

/// Exchange id → events computed for it during one cycle.
#[derive(Debug, Default, Clone)]
pub struct CycleCache {
    events: HashMap<String, Vec<Arc<AlertEvent>>>,
}

impl CycleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, exchange: &str) -> bool {
        self.events.contains_key(exchange)
    }

    pub fn insert(&mut self, exchange: &str, events: Vec<Arc<AlertEvent>>) {
        self.events.insert(exchange.to_string(), events);
    }

    pub fn get(&self, exchange: &str) -> Option<&[Arc<AlertEvent>]> {
        self.events.get(exchange).map(Vec::as_slice)
    }

    /// Concatenated events for `exchanges`, in the order given.
    pub fn events_for<'a>(&self, exchanges: impl IntoIterator<Item = &'a str>) -> Vec<Arc<AlertEvent>> {
        exchanges
            .into_iter()
            .filter_map(|id| self.events.get(id))
            .flat_map(|events| events.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ─── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// Exchanges computed in this pass (cache hits excluded).
    pub processed:   usize,
    pub failed:      usize,
    pub timed_out:   usize,
    pub events:      usize,
    pub subscribers: usize,
}

#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub cycle_id:       Uuid,
    pub per_subscriber: HashMap<SubscriberId, Vec<Arc<AlertEvent>>>,
    pub summary:        CycleSummary,
}

impl CycleOutcome {
    pub fn events_for(&self, subscriber: &str) -> &[Arc<AlertEvent>] {
        self.per_subscriber
            .get(subscriber)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Raw payloads for one exchange, gathered before any state changes.
struct ExchangeSnapshot {
    tickers: Vec<Ticker>,
    candles: Vec<(String, Vec<Candle>)>,
}

enum ExchangeRun {
    Completed(Vec<Arc<AlertEvent>>),
    Failed,
    TimedOut,
}

// ─── Orchestrator ─────────────────────────────────────────────────────────────

pub struct Orchestrator {
    registry: ExchangeRegistry,
    store:    Arc<SymbolStore>,
    config:   AlertConfig,
}

impl Orchestrator {
    pub fn new(registry: ExchangeRegistry, store: Arc<SymbolStore>, config: AlertConfig) -> Self {
        Self { registry, store, config }
    }

    pub fn store(&self) -> &Arc<SymbolStore> {
        &self.store
    }

    /// Seed price baselines before the first cycle so it can already compare.
    /// Emits nothing. Returns how many symbols were seeded.
    pub async fn warm_up<'a>(&self, exchanges: impl IntoIterator<Item = &'a str>) -> usize {
        let distinct: BTreeSet<String> = exchanges.into_iter().map(str::to_lowercase).collect();

        let seeded = join_all(distinct.iter().map(|id| async move {
            let tickers = match self.fetch_tickers(id).await {
                Ok(tickers) => tickers,
                Err(e) => {
                    warn!(exchange = %id, error = %e, "Warm-up skipped");
                    return 0;
                }
            };

            let mut seeded = 0;
            for ticker in &tickers {
                if self.store.seed_price(&SymbolKey::new(id, &ticker.symbol), ticker.last_price).await {
                    seeded += 1;
                }
            }
            info!(exchange = %id, seeded, "Price baselines warmed up");
            seeded
        }))
        .await;

        seeded.into_iter().sum()
    }

    /// One full cycle with a fresh cache.
    pub async fn process_cycle(&self, requests: &HashMap<SubscriberId, BTreeSet<String>>) -> CycleOutcome {
        let mut cache = CycleCache::new();
        self.process_cycle_with(&mut cache, requests).await
    }

    /// One cycle that reuses (and fills) `cache`; exchanges already in it are
    /// not fetched again.
    pub async fn process_cycle_with(
        &self,
        cache: &mut CycleCache,
        requests: &HashMap<SubscriberId, BTreeSet<String>>,
    ) -> CycleOutcome {
        let cycle_id = Uuid::new_v4();

        let pending: BTreeSet<String> = requests
            .values()
            .flatten()
            .map(|id| id.to_lowercase())
            .filter(|id| !cache.contains(id))
            .collect();

        info!(
            %cycle_id,
            subscribers = requests.len(),
            exchanges   = ?pending,
            cached      = cache.len(),
            "🔄 Cycle starting"
        );

        let runs = join_all(pending.iter().map(|id| self.run_exchange(id))).await;

        let mut summary = CycleSummary {
            processed:   pending.len(),
            subscribers: requests.len(),
            ..CycleSummary::default()
        };

        for (id, run) in pending.iter().zip(runs) {
            let events = match run {
                ExchangeRun::Completed(events) => events,
                ExchangeRun::Failed => {
                    summary.failed += 1;
                    Vec::new()
                }
                ExchangeRun::TimedOut => {
                    summary.timed_out += 1;
                    Vec::new()
                }
            };
            summary.events += events.len();
            cache.insert(id, events);
        }

        let per_subscriber: HashMap<SubscriberId, Vec<Arc<AlertEvent>>> = requests
            .iter()
            .map(|(subscriber, exchanges)| {
                let ids: Vec<String> = exchanges.iter().map(|e| e.to_lowercase()).collect();
                let events = cache.events_for(ids.iter().map(String::as_str));
                (subscriber.clone(), events)
            })
            .collect();

        info!(
            %cycle_id,
            processed = summary.processed,
            failed    = summary.failed,
            timed_out = summary.timed_out,
            events    = summary.events,
            "✅ Cycle complete"
        );

        CycleOutcome { cycle_id, per_subscriber, summary }
    }

    /// Fetch one exchange under the cycle deadline, then apply what arrived.
    /// Never fails the cycle.
    ///
    /// Only the fetch phase can time out. The store is touched afterwards,
    /// outside the deadline, so a timed-out exchange leaves its baselines and
    /// flags exactly as they were and the next cycle sees the same move again.
    async fn run_exchange(&self, id: &str) -> ExchangeRun {
        let deadline = self.config.cycle.deadline;

        match tokio::time::timeout(deadline, self.fetch_exchange(id)).await {
            Ok(Ok(snapshot)) => ExchangeRun::Completed(self.apply_snapshot(id, snapshot).await),
            Ok(Err(e)) => {
                warn!(exchange = %id, error = %e, transient = e.is_transient(), "⚠️ Exchange skipped this cycle");
                ExchangeRun::Failed
            }
            Err(_) => {
                warn!(exchange = %id, ?deadline, "⏱️ Exchange timed out, skipped this cycle");
                ExchangeRun::TimedOut
            }
        }
    }

    async fn fetch_tickers(&self, id: &str) -> Result<Vec<Ticker>, FetchError> {
        self.registry.get(id)?.fetch_tickers().await
    }

    /// Everything one exchange needs this cycle: tickers, then candles per
    /// symbol when RSI is on and the venue has them. Reads the store, never
    /// writes it.
    async fn fetch_exchange(&self, id: &str) -> Result<ExchangeSnapshot, FetchError> {
        let exchange = self.registry.get(id)?;
        let tickers = exchange.fetch_tickers().await?;

        debug!(exchange = %id, symbols = tickers.len(), "Tickers fetched");

        let rsi = &self.config.rsi;
        let candles: Vec<(String, Vec<Candle>)> = if rsi.enabled && exchange.has_candles() {
            stream::iter(&tickers)
                .map(|ticker| self.fetch_symbol_candles(exchange.as_ref(), id, &ticker.symbol))
                .buffer_unordered(self.config.cycle.candle_concurrency.max(1))
                .filter_map(|fetched| async move { fetched })
                .collect()
                .await
        } else {
            if rsi.enabled {
                debug!(exchange = %id, "No candle support, RSI skipped");
            }
            Vec::new()
        };

        Ok(ExchangeSnapshot { tickers, candles })
    }

    /// Candles for one symbol: from the last consumed bar when the stored
    /// RSI state is seeded, otherwise the full lookback window.
    async fn fetch_symbol_candles(
        &self,
        exchange: &dyn Exchange,
        id: &str,
        symbol: &str,
    ) -> Option<(String, Vec<Candle>)> {
        let rsi = &self.config.rsi;
        let key = SymbolKey::new(id, symbol);

        let since_ms = match self.store.get_rsi_state(&key).await {
            Some(state) if state.seeded => state.last_candle_at.timestamp_millis(),
            _ => Utc::now().timestamp_millis() - rsi.lookback_millis(),
        };

        match exchange.fetch_candles(symbol, rsi.timeframe, since_ms).await {
            Ok(candles) => Some((symbol.to_string(), candles)),
            Err(e) => {
                warn!(exchange = %id, symbol, error = %e, "Candles unavailable, RSI skipped");
                None
            }
        }
    }

    /// Run a complete snapshot through the price and RSI machines. Events are
    /// sorted by (kind, symbol).
    async fn apply_snapshot(&self, id: &str, snapshot: ExchangeSnapshot) -> Vec<Arc<AlertEvent>> {
        let mut events = Vec::new();

        for ticker in &snapshot.tickers {
            let key = SymbolKey::new(id, &ticker.symbol);
            events.extend(self.store.observe_price(&key, ticker.last_price, &self.config.price).await);
        }
        for (symbol, candles) in &snapshot.candles {
            let key = SymbolKey::new(id, symbol);
            events.extend(self.store.observe_candles(&key, candles, &self.config.rsi).await);
        }

        events.sort_by(|a, b| (a.kind, &a.symbol).cmp(&(b.kind, &b.symbol)));

        if !events.is_empty() {
            info!(exchange = %id, events = events.len(), "📣 Alerts raised");
        }
        events.into_iter().map(Arc::new).collect()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CycleSettings, RsiSettings};
    use crate::models::{AlertKind, Candle, Direction, Timeframe};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted exchange: prices are set between cycles, calls are counted.
    struct MockExchange {
        id:            &'static str,
        prices:        Mutex<Vec<(String, f64)>>,
        closes:        Mutex<HashMap<String, Vec<f64>>>,
        candles:       bool,
        /// Open time of bar 0; recent enough to sit inside the lookback window.
        origin:        DateTime<Utc>,
        fail:          Option<FetchError>,
        delay:         Duration,
        /// Sleep inside `fetch_candles`; adjustable between cycles.
        candle_delay_ms: AtomicU64,
        ticker_calls:  AtomicUsize,
        candle_calls:  AtomicUsize,
        candle_since:  Mutex<Vec<i64>>,
    }

    impl MockExchange {
        fn new(id: &'static str) -> Self {
            Self {
                id,
                prices:       Mutex::new(Vec::new()),
                closes:       Mutex::new(HashMap::new()),
                candles:      false,
                origin:       Utc::now() - chrono::Duration::hours(4),
                fail:         None,
                delay:        Duration::ZERO,
                candle_delay_ms: AtomicU64::new(0),
                ticker_calls: AtomicUsize::new(0),
                candle_calls: AtomicUsize::new(0),
                candle_since: Mutex::new(Vec::new()),
            }
        }

        fn set_price(&self, symbol: &str, price: f64) {
            let mut prices = self.prices.lock().unwrap();
            prices.retain(|(s, _)| s != symbol);
            prices.push((symbol.to_string(), price));
        }

        fn set_closes(&self, symbol: &str, closes: &[f64]) {
            self.closes.lock().unwrap().insert(symbol.to_string(), closes.to_vec());
        }

        /// 30-minute bars from `origin`.
        fn bar_time(&self, i: usize) -> DateTime<Utc> {
            self.origin + chrono::Duration::minutes(30 * i as i64)
        }
    }

    #[async_trait]
    impl Exchange for MockExchange {
        fn id(&self) -> &str {
            self.id
        }

        async fn list_symbols(&self) -> Result<Vec<String>, FetchError> {
            Ok(self.prices.lock().unwrap().iter().map(|(s, _)| s.clone()).collect())
        }

        async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, FetchError> {
            let prices = self.prices.lock().unwrap();
            let (_, price) = prices
                .iter()
                .find(|(s, _)| s == symbol)
                .ok_or_else(|| FetchError::malformed(self.id, "unknown symbol"))?;
            Ok(Ticker { exchange: self.id.into(), symbol: symbol.into(), last_price: *price })
        }

        async fn fetch_tickers(&self) -> Result<Vec<Ticker>, FetchError> {
            self.ticker_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(e) = &self.fail {
                return Err(e.clone());
            }
            let prices = self.prices.lock().unwrap().clone();
            Ok(prices
                .into_iter()
                .map(|(symbol, last_price)| Ticker { exchange: self.id.into(), symbol, last_price })
                .collect())
        }

        fn has_candles(&self) -> bool {
            self.candles
        }

        async fn fetch_candles(
            &self,
            symbol: &str,
            _timeframe: Timeframe,
            since_ms: i64,
        ) -> Result<Vec<Candle>, FetchError> {
            self.candle_calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.candle_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            self.candle_since.lock().unwrap().push(since_ms);

            let closes = self.closes.lock().unwrap().get(symbol).cloned().unwrap_or_default();
            Ok(closes
                .iter()
                .enumerate()
                .map(|(i, &close)| Candle {
                    symbol:    symbol.into(),
                    timestamp: self.bar_time(i),
                    open:      close,
                    high:      close,
                    low:       close,
                    close,
                    volume:    1.0,
                })
                .filter(|c| c.timestamp.timestamp_millis() >= since_ms)
                .collect())
        }
    }

    fn config() -> AlertConfig {
        AlertConfig {
            rsi: RsiSettings { period: 2, lookback: 10, timeframe: Timeframe::M30, ..RsiSettings::default() },
            cycle: CycleSettings { deadline: Duration::from_secs(5), candle_concurrency: 4 },
            ..AlertConfig::default()
        }
    }

    fn orchestrator(exchanges: Vec<Arc<MockExchange>>, config: AlertConfig) -> Orchestrator {
        let mut registry = ExchangeRegistry::new();
        for exchange in exchanges {
            registry.register(exchange);
        }
        Orchestrator::new(registry, Arc::new(SymbolStore::new()), config)
    }

    fn requests(entries: &[(&str, &[&str])]) -> HashMap<SubscriberId, BTreeSet<String>> {
        entries
            .iter()
            .map(|(sub, exs)| (sub.to_string(), exs.iter().map(|e| e.to_string()).collect()))
            .collect()
    }

    #[tokio::test]
    async fn test_shared_exchange_fetched_once_per_cycle() {
        let x = Arc::new(MockExchange::new("x"));
        x.set_price("BTC/USD", 100.0);
        let orch = orchestrator(vec![x.clone()], config());
        let reqs = requests(&[("a", &["x"]), ("b", &["x"]), ("c", &["X"])]);

        orch.process_cycle(&reqs).await;
        assert_eq!(x.ticker_calls.load(Ordering::SeqCst), 1);

        x.set_price("BTC/USD", 105.0);
        let outcome = orch.process_cycle(&reqs).await;
        assert_eq!(x.ticker_calls.load(Ordering::SeqCst), 2);

        // all three see the very same event object
        let a = outcome.events_for("a");
        assert_eq!(a.len(), 1);
        assert!(Arc::ptr_eq(&a[0], &outcome.events_for("b")[0]));
        assert!(Arc::ptr_eq(&a[0], &outcome.events_for("c")[0]));
        assert_eq!(outcome.summary.processed, 1);
        assert_eq!(outcome.summary.events, 1);
    }

    #[tokio::test]
    async fn test_cache_reused_across_passes() {
        let x = Arc::new(MockExchange::new("x"));
        x.set_price("ETH/USD", 10.0);
        let orch = orchestrator(vec![x.clone()], config());
        let mut cache = CycleCache::new();

        orch.process_cycle_with(&mut cache, &requests(&[("a", &["x"])])).await;
        let outcome = orch.process_cycle_with(&mut cache, &requests(&[("b", &["x"])])).await;

        assert_eq!(x.ticker_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.summary.processed, 0);
        assert!(cache.contains("x"));
    }

    #[tokio::test]
    async fn test_hysteresis_across_cycles() {
        let x = Arc::new(MockExchange::new("x"));
        let orch = orchestrator(vec![x.clone()], config());
        let reqs = requests(&[("a", &["x"])]);

        let mut total = 0;
        for price in [100.0, 104.0, 108.2, 112.6, 117.2, 122.0] {
            x.set_price("SOL/USD", price);
            total += orch.process_cycle(&reqs).await.events_for("a").len();
        }
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_failed_exchange_does_not_affect_others() {
        let good = Arc::new(MockExchange::new("good"));
        let mut bad = MockExchange::new("bad");
        bad.fail = Some(FetchError::Exhausted {
            endpoint: "bad".into(),
            attempts: 3,
            last:     Box::new(FetchError::TimedOut { endpoint: "bad".into() }),
        });
        let bad = Arc::new(bad);

        good.set_price("A", 1.0);
        let orch = orchestrator(vec![good.clone(), bad], config());
        let reqs = requests(&[("s1", &["good", "bad"]), ("s2", &["bad"]), ("s3", &["nowhere"])]);

        orch.process_cycle(&reqs).await;
        good.set_price("A", 0.5);
        let outcome = orch.process_cycle(&reqs).await;

        assert_eq!(outcome.events_for("s1").len(), 1);
        assert_eq!(outcome.events_for("s1")[0].direction, Direction::Down);
        assert!(outcome.events_for("s2").is_empty());
        assert!(outcome.events_for("s3").is_empty());
        // "bad" and the unregistered "nowhere"
        assert_eq!(outcome.summary.failed, 2);
    }

    #[tokio::test]
    async fn test_slow_exchange_times_out_without_blocking_fast_one() {
        let fast = Arc::new(MockExchange::new("fast"));
        let mut slow = MockExchange::new("slow");
        slow.delay = Duration::from_secs(30);
        let slow = Arc::new(slow);
        fast.set_price("A", 1.0);

        let mut cfg = config();
        cfg.cycle.deadline = Duration::from_millis(100);
        let orch = orchestrator(vec![fast.clone(), slow], cfg);
        let reqs = requests(&[("s", &["fast", "slow"])]);

        orch.process_cycle(&reqs).await;
        fast.set_price("A", 2.0);

        let started = std::time::Instant::now();
        let outcome = orch.process_cycle(&reqs).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.summary.timed_out, 1);
        assert_eq!(outcome.events_for("s").len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_in_candle_phase_leaves_state_untouched() {
        let mut x = MockExchange::new("x");
        x.candles = true;
        let x = Arc::new(x);
        x.set_price("BTC/USD", 100.0);
        x.set_closes("BTC/USD", &[10.0, 11.0, 10.0, 11.0, 10.0]);

        let mut cfg = config();
        cfg.cycle.deadline = Duration::from_millis(200);
        let orch = orchestrator(vec![x.clone()], cfg);
        let reqs = requests(&[("a", &["x"])]);
        let key = SymbolKey::new("x", "BTC/USD");

        orch.process_cycle(&reqs).await;
        let rsi_before = orch.store().get_rsi_state(&key).await;

        // tickers arrive, candles stall past the deadline
        x.set_price("BTC/USD", 110.0);
        x.set_closes("BTC/USD", &[10.0, 11.0, 10.0, 11.0, 10.0, 12.0]);
        x.candle_delay_ms.store(5_000, Ordering::SeqCst);
        let stalled = orch.process_cycle(&reqs).await;

        assert_eq!(stalled.summary.timed_out, 1);
        assert!(stalled.events_for("a").is_empty());
        let price = orch.store().get_price_state(&key).await.unwrap();
        assert_eq!(price.baseline, 100.0);
        assert!(!price.significance.is_flagged());
        assert_eq!(orch.store().get_rsi_state(&key).await, rsi_before);

        // healthy again: the +10% move and the RSI crossing both still alert
        x.candle_delay_ms.store(0, Ordering::SeqCst);
        let healthy = orch.process_cycle(&reqs).await;

        let events = healthy.events_for("a");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, AlertKind::PriceMove);
        assert_eq!(events[0].magnitude, 10.0);
        assert_eq!(events[1].kind, AlertKind::RsiLevel);
        assert_eq!(events[1].magnitude, 79.0);
    }

    #[tokio::test]
    async fn test_rsi_incremental_after_full_rebuild() {
        let mut x = MockExchange::new("x");
        x.candles = true;
        let x = Arc::new(x);
        x.set_price("BTC/USD", 100.0);
        x.set_closes("BTC/USD", &[10.0, 11.0, 10.0, 11.0, 10.0]);

        let orch = orchestrator(vec![x.clone()], config());
        let reqs = requests(&[("a", &["x"])]);

        // first cycle: full lookback, RSI 37, silent
        assert!(orch.process_cycle(&reqs).await.events_for("a").is_empty());

        // a new closed bar pushes RSI to 79
        x.set_closes("BTC/USD", &[10.0, 11.0, 10.0, 11.0, 10.0, 12.0]);
        let outcome = orch.process_cycle(&reqs).await;

        let events = outcome.events_for("a");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertKind::RsiLevel);
        assert_eq!(events[0].magnitude, 79.0);

        // second fetch asked only from the last consumed bar onward
        let since = x.candle_since.lock().unwrap().clone();
        assert_eq!(since.len(), 2);
        assert_eq!(since[1], x.bar_time(4).timestamp_millis());
    }

    #[tokio::test]
    async fn test_rsi_skipped_without_candle_support() {
        let x = Arc::new(MockExchange::new("x"));
        x.set_price("BTC/USD", 100.0);
        x.set_closes("BTC/USD", &[1.0, 2.0, 3.0]);

        let orch = orchestrator(vec![x.clone()], config());
        orch.process_cycle(&requests(&[("a", &["x"])])).await;

        assert_eq!(x.candle_calls.load(Ordering::SeqCst), 0);
        assert!(orch.store().get_rsi_state(&SymbolKey::new("x", "BTC/USD")).await.is_none());
    }

    #[tokio::test]
    async fn test_events_sorted_and_deterministic() {
        let x = Arc::new(MockExchange::new("x"));
        for symbol in ["ZEC", "ADA", "MKR"] {
            x.set_price(symbol, 10.0);
        }
        let orch = orchestrator(vec![x.clone()], config());
        let reqs = requests(&[("a", &["x"])]);
        orch.process_cycle(&reqs).await;

        for symbol in ["ZEC", "ADA", "MKR"] {
            x.set_price(symbol, 11.0);
        }
        let outcome = orch.process_cycle(&reqs).await;
        let symbols: Vec<&str> = outcome.events_for("a").iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, ["ADA", "MKR", "ZEC"]);
    }

    #[tokio::test]
    async fn test_warm_up_seeds_without_events() {
        let x = Arc::new(MockExchange::new("x"));
        x.set_price("A", 100.0);
        x.set_price("B", 50.0);
        let orch = orchestrator(vec![x.clone()], config());

        assert_eq!(orch.warm_up(["x", "X", "missing"]).await, 2);

        // the first real cycle can already compare against the warm baseline
        x.set_price("A", 110.0);
        let outcome = orch.process_cycle(&requests(&[("a", &["x"])])).await;
        assert_eq!(outcome.events_for("a").len(), 1);
    }
}
