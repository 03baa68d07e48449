//! # exchange::kraken
//!
//! Kraken public REST API, tickers only (no candle capability, so RSI is
//! skipped for this venue).
//!
//! Kraken answers HTTP 200 with `{"error": [...], "result": {...}}` and reports
//! throttling inside `error`, so payloads are checked inside the retry loop.

use async_trait::async_trait;
use serde_json::Value;

use super::{parse_price, Exchange};
use crate::error::FetchError;
use crate::models::Ticker;
use crate::transport::RetryingClient;

const BASE_URL: &str = "https://api.kraken.com";

#[derive(Clone)]
pub struct Kraken {
    client:   RetryingClient,
    base_url: String,
}

impl Kraken {
    pub fn new(client: RetryingClient) -> Self {
        Self::with_base_url(client, BASE_URL)
    }

    pub fn with_base_url(client: RetryingClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `result` object of a successful call.
    async fn call(&self, path: &str) -> Result<serde_json::Map<String, Value>, FetchError> {
        let url = format!("{}{path}", self.base_url);
        let payload = self.client.fetch_checked(&url, check_envelope).await?;

        match payload {
            Value::Object(mut body) => match body.remove("result") {
                Some(Value::Object(result)) => Ok(result),
                _ => Err(FetchError::malformed(&url, "missing 'result' object")),
            },
            _ => Err(FetchError::malformed(&url, "payload is not an object")),
        }
    }

    fn tickers_from(&self, result: serde_json::Map<String, Value>) -> Vec<Ticker> {
        result
            .into_iter()
            .filter_map(|(pair, info)| {
                // "c" = [last trade price, lot volume]
                let last = info.get("c")?.get(0)?.as_str()?;
                let last_price = parse_price(self.id(), last).ok()?;
                Some(Ticker {
                    exchange: self.id().to_string(),
                    symbol:   pair,
                    last_price,
                })
            })
            .collect()
    }
}

/// Turn a non-empty `error` array into a [`FetchError`]. Rate-limit and
/// service-busy codes are transient.
fn check_envelope(endpoint: &str, payload: Value) -> Result<Value, FetchError> {
    let errors: Vec<String> = payload
        .get("error")
        .and_then(Value::as_array)
        .map(|errs| errs.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let Some(first) = errors.first() else {
        return Ok(payload);
    };

    if first.starts_with("EAPI:Rate limit") || first.starts_with("EGeneral:Too many requests") {
        return Err(FetchError::RateLimited { endpoint: endpoint.to_string(), status: 200 });
    }
    if first.starts_with("EService:Unavailable") || first.starts_with("EService:Busy") {
        return Err(FetchError::ServerError { endpoint: endpoint.to_string(), status: 200 });
    }

    Err(FetchError::Api {
        endpoint: endpoint.to_string(),
        message:  errors.join(", "),
    })
}

#[async_trait]
impl Exchange for Kraken {
    fn id(&self) -> &str {
        "kraken"
    }

    async fn list_symbols(&self) -> Result<Vec<String>, FetchError> {
        let mut pairs: Vec<String> = self.call("/0/public/AssetPairs").await?.into_iter().map(|(k, _)| k).collect();
        pairs.sort();
        Ok(pairs)
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, FetchError> {
        let path = format!("/0/public/Ticker?pair={symbol}");
        let result = self.call(&path).await?;

        self.tickers_from(result)
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::malformed(&path, format!("no ticker for {symbol}")))
    }

    async fn fetch_tickers(&self) -> Result<Vec<Ticker>, FetchError> {
        let result = self.call("/0/public/Ticker").await?;
        let mut tickers = self.tickers_from(result);
        tickers.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(tickers)
    }
}
