//! # exchange::binance
//!
//! Binance spot REST API.
//!
//! - tickers: `GET /api/v3/ticker/price` (all symbols in one call)
//! - candles: `GET /api/v3/klines?symbol=..&interval=..&startTime=..&limit=1000`

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{parse_price, Exchange};
use crate::error::FetchError;
use crate::models::{Candle, Ticker, Timeframe};
use crate::transport::RetryingClient;

const BASE_URL: &str = "https://api.binance.com";

/// Binance caps klines per request at 1000.
const KLINE_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
struct PriceEntry {
    symbol: String,
    price:  String,
}

#[derive(Clone)]
pub struct Binance {
    client:   RetryingClient,
    base_url: String,
}

impl Binance {
    pub fn new(client: RetryingClient) -> Self {
        Self::with_base_url(client, BASE_URL)
    }

    pub fn with_base_url(client: RetryingClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn ticker_from(&self, endpoint: &str, entry: PriceEntry) -> Result<Ticker, FetchError> {
        Ok(Ticker {
            exchange:   self.id().to_string(),
            last_price: parse_price(endpoint, &entry.price)?,
            symbol:     entry.symbol,
        })
    }
}

#[async_trait]
impl Exchange for Binance {
    fn id(&self) -> &str {
        "binance"
    }

    async fn list_symbols(&self) -> Result<Vec<String>, FetchError> {
        let tickers = self.fetch_tickers().await?;
        Ok(tickers.into_iter().map(|t| t.symbol).collect())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, FetchError> {
        let url = format!("{}/api/v3/ticker/price?symbol={symbol}", self.base_url);
        let payload = self.client.fetch(&url).await?;

        let entry: PriceEntry =
            serde_json::from_value(payload).map_err(|e| FetchError::malformed(&url, e.to_string()))?;
        self.ticker_from(&url, entry)
    }

    async fn fetch_tickers(&self) -> Result<Vec<Ticker>, FetchError> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let payload = self.client.fetch(&url).await?;

        let entries: Vec<PriceEntry> =
            serde_json::from_value(payload).map_err(|e| FetchError::malformed(&url, e.to_string()))?;

        // delisted pairs report "0.00000000"; drop them rather than fail the batch
        Ok(entries
            .into_iter()
            .filter_map(|entry| self.ticker_from(&url, entry).ok())
            .collect())
    }

    fn has_candles(&self) -> bool {
        true
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since_ms: i64,
    ) -> Result<Vec<Candle>, FetchError> {
        let url = format!(
            "{}/api/v3/klines?symbol={symbol}&interval={timeframe}&startTime={since_ms}&limit={KLINE_LIMIT}",
            self.base_url
        );
        let payload = self.client.fetch(&url).await?;

        parse_klines(&url, symbol, &payload, Utc::now().timestamp_millis())
    }
}

/// Decode kline rows, keeping only bars whose close time is before `now_ms`.
///
/// Row layout: `[open_time, open, high, low, close, volume, close_time, ...]`
/// with prices as strings.
fn parse_klines(
    endpoint: &str,
    symbol: &str,
    payload: &Value,
    now_ms: i64,
) -> Result<Vec<Candle>, FetchError> {
    let rows = payload
        .as_array()
        .ok_or_else(|| FetchError::malformed(endpoint, "klines payload is not an array"))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let cols = row
            .as_array()
            .filter(|c| c.len() >= 7)
            .ok_or_else(|| FetchError::malformed(endpoint, "kline row is too short"))?;

        let close_time = int_at(endpoint, cols, 6)?;
        if close_time >= now_ms {
            continue;
        }

        let open_time = int_at(endpoint, cols, 0)?;
        let timestamp = Utc
            .timestamp_millis_opt(open_time)
            .single()
            .ok_or_else(|| FetchError::malformed(endpoint, format!("bad open time {open_time}")))?;

        candles.push(Candle {
            symbol: symbol.to_string(),
            timestamp,
            open:   float_at(endpoint, cols, 1)?,
            high:   float_at(endpoint, cols, 2)?,
            low:    float_at(endpoint, cols, 3)?,
            close:  float_at(endpoint, cols, 4)?,
            volume: float_at(endpoint, cols, 5)?,
        });
    }

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

fn int_at(endpoint: &str, cols: &[Value], idx: usize) -> Result<i64, FetchError> {
    cols[idx]
        .as_i64()
        .ok_or_else(|| FetchError::malformed(endpoint, format!("kline column {idx} is not an integer")))
}

fn float_at(endpoint: &str, cols: &[Value], idx: usize) -> Result<f64, FetchError> {
    cols[idx]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| FetchError::malformed(endpoint, format!("kline column {idx} is not a number")))
}
