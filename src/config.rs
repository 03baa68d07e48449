//! # config — Configuration from Environment Variables
//!
//! | Variable               | Default          |
//! |------------------------|------------------|
//! | `MOONING_PCT`          | `4.0`            |
//! | `FREE_FALL_PCT`        | `-10.0`          |
//! | `RSI_ENABLED`          | `true`           |
//! | `RSI_OVERBOUGHT`       | `70`             |
//! | `RSI_OVERSOLD`         | `30`             |
//! | `RSI_PERIOD`           | `14`             |
//! | `RSI_TIMEFRAME`        | `30m`            |
//! | `RSI_LOOKBACK`         | `500` candles    |
//! | `FETCH_MAX_ATTEMPTS`   | `3`              |
//! | `FETCH_MAX_BACKOFF_MS` | `2000`           |
//! | `HTTP_TIMEOUT_SECS`    | `10`             |
//! | `CYCLE_DEADLINE_SECS`  | `120`            |
//! | `CANDLE_CONCURRENCY`   | `8`              |
//! | `POLL_INTERVAL_SECS`   | `300`            |
//! | `SUBSCRIBERS`          | `default=binance`|
//!
//! `SUBSCRIBERS` format: `name[@channel]=exchange,exchange;name=exchange`.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use anyhow::{bail, Context};

use crate::models::{Direction, Timeframe};
use crate::state::Zone;
use crate::transport::RetryPolicy;

// ─── Alert Thresholds ─────────────────────────────────────────────────────────

/// Percent-change band. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceThresholds {
    /// e.g. `4.0` → alert at `>= +4%`
    pub mooning:   f64,
    /// e.g. `-10.0` → alert at `<= -10%`
    pub free_fall: f64,
}

impl Default for PriceThresholds {
    fn default() -> Self {
        Self { mooning: 4.0, free_fall: -10.0 }
    }
}

impl PriceThresholds {
    pub fn zone(&self, change_pct: f64) -> Zone {
        if change_pct >= self.mooning {
            Zone::Extreme(Direction::Up)
        } else if change_pct <= self.free_fall {
            Zone::Extreme(Direction::Down)
        } else {
            Zone::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiSettings {
    /// Off → the candle pipeline is never run.
    pub enabled:    bool,
    pub overbought: u8,
    pub oversold:   u8,
    pub period:     usize,
    pub timeframe:  Timeframe,
    /// Candles fetched when (re)building from scratch.
    pub lookback:   u32,
}

impl Default for RsiSettings {
    fn default() -> Self {
        Self {
            enabled:    true,
            overbought: 70,
            oversold:   30,
            period:     14,
            timeframe:  Timeframe::M30,
            lookback:   500,
        }
    }
}

impl RsiSettings {
    pub fn zone(&self, rsi: u8) -> Zone {
        if rsi >= self.overbought {
            Zone::Extreme(Direction::Up)
        } else if rsi <= self.oversold {
            Zone::Extreme(Direction::Down)
        } else {
            Zone::Normal
        }
    }

    /// Span of the full lookback window in milliseconds.
    pub fn lookback_millis(&self) -> i64 {
        i64::from(self.lookback) * self.timeframe.millis()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSettings {
    /// Per-exchange budget inside one cycle, retries included.
    pub deadline:           Duration,
    /// Max in-flight candle requests per exchange.
    pub candle_concurrency: usize,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            deadline:           Duration::from_secs(120),
            candle_concurrency: 8,
        }
    }
}

/// Everything the orchestrator needs to make decisions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlertConfig {
    pub price: PriceThresholds,
    pub rsi:   RsiSettings,
    pub cycle: CycleSettings,
}

impl AlertConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.price.mooning > 0.0) {
            bail!("MOONING_PCT must be > 0 (got {})", self.price.mooning);
        }
        if !(self.price.free_fall < 0.0) {
            bail!("FREE_FALL_PCT must be < 0 (got {})", self.price.free_fall);
        }
        if self.rsi.oversold >= self.rsi.overbought || self.rsi.overbought > 100 {
            bail!(
                "RSI bounds must satisfy oversold < overbought <= 100 (got {} / {})",
                self.rsi.oversold,
                self.rsi.overbought
            );
        }
        if self.rsi.period == 0 {
            bail!("RSI_PERIOD must be at least 1");
        }
        if (self.rsi.lookback as usize) <= self.rsi.period {
            bail!(
                "RSI_LOOKBACK ({}) must exceed RSI_PERIOD ({})",
                self.rsi.lookback,
                self.rsi.period
            );
        }
        if self.cycle.candle_concurrency == 0 {
            bail!("CANDLE_CONCURRENCY must be at least 1");
        }
        Ok(())
    }
}

// ─── Subscribers ──────────────────────────────────────────────────────────────

/// A consumer of alerts and the exchanges it watches.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscriber {
    pub id:        String,
    /// Opaque output channel handed through to delivery.
    pub channel:   Option<String>,
    pub exchanges: BTreeSet<String>,
}

/// Parse `name[@channel]=ex1,ex2;name2=ex3`.
pub fn parse_subscribers(raw: &str) -> anyhow::Result<Vec<Subscriber>> {
    let mut subscribers: Vec<Subscriber> = Vec::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (who, exchanges) = entry
            .split_once('=')
            .with_context(|| format!("subscriber entry '{entry}' is missing '='"))?;

        let (id, channel) = match who.split_once('@') {
            Some((id, channel)) => (id.trim(), Some(channel.trim().to_string())),
            None => (who.trim(), None),
        };
        if id.is_empty() {
            bail!("subscriber entry '{entry}' has an empty name");
        }
        if subscribers.iter().any(|s| s.id == id) {
            bail!("subscriber '{id}' is listed twice");
        }

        let exchanges: BTreeSet<String> = exchanges
            .split(',')
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        subscribers.push(Subscriber {
            id: id.to_string(),
            channel: channel.filter(|c| !c.is_empty()),
            exchanges,
        });
    }

    Ok(subscribers)
}

// ─── Top-level Config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub alerts:        AlertConfig,
    pub retry:         RetryPolicy,
    pub http_timeout:  Duration,
    pub poll_interval: Duration,
    pub subscribers:   Vec<Subscriber>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let timeframe: Timeframe = std::env::var("RSI_TIMEFRAME")
            .unwrap_or_else(|_| "30m".to_string())
            .parse()
            .map_err(anyhow::Error::msg)
            .context("RSI_TIMEFRAME is invalid")?;

        let alerts = AlertConfig {
            price: PriceThresholds {
                mooning:   env_parse("MOONING_PCT", 4.0)?,
                free_fall: env_parse("FREE_FALL_PCT", -10.0)?,
            },
            rsi: RsiSettings {
                enabled:    env_flag("RSI_ENABLED", true),
                overbought: env_parse("RSI_OVERBOUGHT", 70)?,
                oversold:   env_parse("RSI_OVERSOLD", 30)?,
                period:     env_parse("RSI_PERIOD", 14)?,
                timeframe,
                lookback:   env_parse("RSI_LOOKBACK", 500)?,
            },
            cycle: CycleSettings {
                deadline:           Duration::from_secs(env_parse("CYCLE_DEADLINE_SECS", 120)?),
                candle_concurrency: env_parse("CANDLE_CONCURRENCY", 8)?,
            },
        };
        alerts.validate()?;

        let max_attempts: u32 = env_parse("FETCH_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            bail!("FETCH_MAX_ATTEMPTS must be at least 1");
        }

        let subscribers = parse_subscribers(
            &std::env::var("SUBSCRIBERS").unwrap_or_else(|_| "default=binance".to_string()),
        )
        .context("SUBSCRIBERS is invalid")?;

        Ok(Self {
            alerts,
            retry: RetryPolicy::new(
                max_attempts,
                Duration::from_millis(env_parse("FETCH_MAX_BACKOFF_MS", 2000)?),
            ),
            http_timeout:  Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 10)?),
            poll_interval: Duration::from_secs(env_parse("POLL_INTERVAL_SECS", 300)?),
            subscribers,
        })
    }

    /// Subscriber → requested exchanges, the shape a cycle consumes.
    pub fn requests(&self) -> HashMap<String, BTreeSet<String>> {
        self.subscribers
            .iter()
            .map(|s| (s.id.clone(), s.exchanges.clone()))
            .collect()
    }
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(default)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
