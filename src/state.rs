//! # state
//!
//! The **symbol state store**: last alerted price and rolling RSI averages per
//! `(exchange, symbol)`, plus the hysteresis flags that make alerting
//! edge-triggered.
//!
//! ## Hysteresis
//!
//! ```text
//!            extreme zone / ALERT
//!   Quiet ───────────────────────▶ Flagged(dir)
//!     ▲                              │  │
//!     │     normal band (silent)     │  │ same zone again → no alert
//!     └──────────────────────────────┘  │
//!                                       │ opposite extreme → ALERT, Flagged(!dir)
//! ```
//!
//! Price and RSI each run their own machine; neither affects the other.
//!
//! ## Concurrency
//!
//! One `tokio::sync::RwLock` guards the map. Every read-modify-write happens
//! inside a single write-guard scope with no `.await` in it, so overlapping
//! cycles serialize per key and no lock is held across network I/O.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::{PriceThresholds, RsiSettings};
use crate::engine::indicators::{self, percent_change, WilderAverages};
use crate::error::IndicatorError;
use crate::models::{AlertEvent, Candle, Direction};

// ─── Keys & Flags ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey {
    pub exchange: String,
    pub symbol:   String,
}

impl SymbolKey {
    pub fn new(exchange: &str, symbol: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol:   symbol.to_string(),
        }
    }
}

/// Where a value sits relative to its configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Normal,
    Extreme(Direction),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Significance {
    #[default]
    Quiet,
    Flagged(Direction),
}

impl Significance {
    /// Next state, and the direction to alert on if this step fires.
    pub fn transition(self, zone: Zone) -> (Significance, Option<Direction>) {
        match (self, zone) {
            (_, Zone::Normal) => (Significance::Quiet, None),
            (Significance::Flagged(flagged), Zone::Extreme(dir)) if flagged == dir => (self, None),
            (_, Zone::Extreme(dir)) => (Significance::Flagged(dir), Some(dir)),
        }
    }

    /// Initial placement without alerting.
    pub fn settle(zone: Zone) -> Significance {
        match zone {
            Zone::Normal => Significance::Quiet,
            Zone::Extreme(dir) => Significance::Flagged(dir),
        }
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, Significance::Flagged(_))
    }
}

// ─── Price ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceState {
    /// Price at the last alert (or first sighting). Noise never moves it.
    pub baseline:     f64,
    pub significance: Significance,
}

impl PriceState {
    pub fn seed(price: f64) -> Self {
        Self {
            baseline:     price,
            significance: Significance::Quiet,
        }
    }

    /// Compare `price` to the baseline and step the machine. On an alert the
    /// baseline moves to `price`; otherwise it stays put so small moves add up.
    pub fn observe(
        &mut self,
        price: f64,
        thresholds: &PriceThresholds,
    ) -> Result<Option<(f64, Direction)>, IndicatorError> {
        let change = percent_change(self.baseline, price)?;
        let (next, fired) = self.significance.transition(thresholds.zone(change));
        self.significance = next;

        Ok(fired.map(|dir| {
            self.baseline = price;
            (change, dir)
        }))
    }
}

// ─── RSI ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiState {
    pub averages:       WilderAverages,
    /// The seed window was full; incremental updates are exact from here on.
    pub seeded:         bool,
    pub value:          u8,
    pub last_close:     f64,
    pub last_candle_at: DateTime<Utc>,
    pub significance:   Significance,
}

impl RsiState {
    /// Full recompute over `candles` (oldest first). `None` for an empty slice.
    pub fn from_candles(candles: &[Candle], period: usize) -> Option<Self> {
        let last = candles.last()?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let reading = indicators::rsi(&closes, period);

        Some(Self {
            averages:       reading.averages,
            seeded:         reading.seeded,
            value:          reading.value,
            last_close:     last.close,
            last_candle_at: last.timestamp,
            significance:   Significance::Quiet,
        })
    }

    /// Fold in every candle newer than the last one consumed; older or
    /// repeated candles are ignored. Returns how many were applied.
    pub fn advance(&mut self, candles: &[Candle], period: usize) -> usize {
        let mut applied = 0;

        for candle in candles {
            if candle.timestamp <= self.last_candle_at {
                continue;
            }
            self.averages = self.averages.smooth(candle.close - self.last_close, period);
            self.last_close = candle.close;
            self.last_candle_at = candle.timestamp;
            applied += 1;
        }

        if applied > 0 {
            self.value = self.averages.rsi();
        }
        applied
    }
}

// ─── Store ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct SymbolEntry {
    price: Option<PriceState>,
    rsi:   Option<RsiState>,
}

/// In-memory, process-lifetime store owned by the orchestrator.
#[derive(Debug, Default)]
pub struct SymbolStore {
    entries: RwLock<HashMap<SymbolKey, SymbolEntry>>,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_price(&self, key: &SymbolKey) -> Option<f64> {
        self.get_price_state(key).await.map(|p| p.baseline)
    }

    pub async fn get_price_state(&self, key: &SymbolKey) -> Option<PriceState> {
        let entries = self.entries.read().await;
        entries.get(key).and_then(|e| e.price)
    }

    /// Overwrite the baseline, keeping the current flag.
    pub async fn set_price(&self, key: &SymbolKey, price: f64) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();
        match entry.price.as_mut() {
            Some(state) => state.baseline = price,
            None => entry.price = Some(PriceState::seed(price)),
        }
    }

    pub async fn get_rsi_state(&self, key: &SymbolKey) -> Option<RsiState> {
        let entries = self.entries.read().await;
        entries.get(key).and_then(|e| e.rsi)
    }

    pub async fn set_rsi_state(&self, key: &SymbolKey, state: RsiState) {
        let mut entries = self.entries.write().await;
        entries.entry(key.clone()).or_default().rsi = Some(state);
    }

    /// Number of tracked `(exchange, symbol)` pairs.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Seed a baseline if none exists. Returns `true` when it did.
    pub async fn seed_price(&self, key: &SymbolKey, price: f64) -> bool {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();
        if entry.price.is_some() {
            return false;
        }
        entry.price = Some(PriceState::seed(price));
        true
    }

    /// Feed one ticker price through the price machine.
    ///
    /// First sighting only seeds. A zero baseline cannot produce a percent
    /// change, so it is replaced by `price` and the comparison skipped.
    pub async fn observe_price(
        &self,
        key: &SymbolKey,
        price: f64,
        thresholds: &PriceThresholds,
    ) -> Option<AlertEvent> {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();

        let Some(state) = entry.price.as_mut() else {
            entry.price = Some(PriceState::seed(price));
            debug!(exchange = %key.exchange, symbol = %key.symbol, price, "Price baseline seeded");
            return None;
        };

        match state.observe(price, thresholds) {
            Ok(fired) => fired.map(|(change, dir)| {
                AlertEvent::price_move(&key.exchange, &key.symbol, change, dir)
            }),
            Err(e) => {
                debug!(exchange = %key.exchange, symbol = %key.symbol, error = %e, "Skipping comparison, re-seeding");
                *state = PriceState::seed(price);
                None
            }
        }
    }

    /// Feed closed candles through the RSI machine.
    ///
    /// A seeded state is advanced incrementally with whatever candles are
    /// newer than the last one it consumed. Anything else is rebuilt from
    /// `candles` and settled silently; only the first seeded reading counts
    /// as the baseline, so short histories never alert.
    pub async fn observe_candles(
        &self,
        key: &SymbolKey,
        candles: &[Candle],
        settings: &RsiSettings,
    ) -> Option<AlertEvent> {
        let period = settings.period;
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();

        if let Some(state) = entry.rsi.as_mut().filter(|s| s.seeded) {
            if state.advance(candles, period) == 0 {
                return None;
            }
            let (next, fired) = state.significance.transition(settings.zone(state.value));
            state.significance = next;

            debug!(exchange = %key.exchange, symbol = %key.symbol, rsi = state.value, ?next, "RSI advanced");
            return fired.map(|dir| AlertEvent::rsi_level(&key.exchange, &key.symbol, state.value, dir));
        }

        let mut fresh = RsiState::from_candles(candles, period)?;
        if fresh.seeded {
            fresh.significance = Significance::settle(settings.zone(fresh.value));
        }
        debug!(
            exchange = %key.exchange,
            symbol   = %key.symbol,
            rsi      = fresh.value,
            seeded   = fresh.seeded,
            candles  = candles.len(),
            "RSI rebuilt from history"
        );
        entry.rsi = Some(fresh);
        None
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
