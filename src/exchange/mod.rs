//! # exchange — Uniform Exchange Adapters
//!
//! Every venue is reached through the [`Exchange`] trait. Candle support is an
//! optional capability: adapters without it keep the default
//! [`Exchange::fetch_candles`] and the orchestrator skips RSI for them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::FetchError;
use crate::models::{Candle, Ticker, Timeframe};
use crate::transport::RetryingClient;

pub mod binance;
pub mod kraken;

pub use binance::Binance;
pub use kraken::Kraken;

// ─── Adapter Contract ─────────────────────────────────────────────────────────

#[async_trait]
pub trait Exchange: Send + Sync {
    /// Registry id, lowercase (e.g. `"binance"`).
    fn id(&self) -> &str;

    async fn list_symbols(&self) -> Result<Vec<String>, FetchError>;

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, FetchError>;

    /// All tickers. The default walks [`list_symbols`](Self::list_symbols);
    /// adapters with a bulk endpoint override it. A symbol that fails is
    /// skipped, not fatal.
    async fn fetch_tickers(&self) -> Result<Vec<Ticker>, FetchError> {
        let symbols = self.list_symbols().await?;
        let mut tickers = Vec::with_capacity(symbols.len());

        for symbol in &symbols {
            match self.fetch_ticker(symbol).await {
                Ok(ticker) => tickers.push(ticker),
                Err(e) => warn!(exchange = self.id(), symbol = %symbol, error = %e, "Ticker skipped"),
            }
        }
        Ok(tickers)
    }

    fn has_candles(&self) -> bool {
        false
    }

    /// Closed candles for `symbol`, oldest first, opening at or after `since_ms`.
    async fn fetch_candles(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _since_ms: i64,
    ) -> Result<Vec<Candle>, FetchError> {
        Err(FetchError::Unsupported {
            exchange:   self.id().to_string(),
            capability: "candles",
        })
    }
}

// ─── Registry ─────────────────────────────────────────────────────────────────

/// Exchange id → adapter. Lookups are case-insensitive.
#[derive(Clone, Default)]
pub struct ExchangeRegistry {
    exchanges: HashMap<String, Arc<dyn Exchange>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every adapter this crate ships, sharing one client.
    pub fn with_defaults(client: RetryingClient) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Binance::new(client.clone())));
        registry.register(Arc::new(Kraken::new(client)));
        registry
    }

    pub fn register(&mut self, exchange: Arc<dyn Exchange>) {
        self.exchanges.insert(exchange.id().to_lowercase(), exchange);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Exchange>, FetchError> {
        self.exchanges
            .get(&id.to_lowercase())
            .cloned()
            .ok_or_else(|| FetchError::UnsupportedExchange(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.exchanges.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

// ─── Payload Helpers ──────────────────────────────────────────────────────────

/// Parse a price that must be finite and positive.
pub(crate) fn parse_price(endpoint: &str, raw: &str) -> Result<f64, FetchError> {
    match raw.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price > 0.0 => Ok(price),
        _ => Err(FetchError::malformed(endpoint, format!("bad price '{raw}'"))),
    }
}

// ─── Test Doubles ─────────────────────────────────────────────────────────────
