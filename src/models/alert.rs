//! # models::alert
//!
//! [`AlertEvent`] is the only thing the engine emits. One event per state
//! transition into an extreme zone; never persisted by the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which indicator produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Percent change against the last alerted baseline.
    PriceMove,
    /// RSI crossed into overbought / oversold.
    RsiLevel,
}

/// `Up` = mooning / overbought, `Down` = free-fall / oversold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub exchange: String,
    pub symbol: String,
    pub kind: AlertKind,
    /// Percent change for [`AlertKind::PriceMove`], RSI value for
    /// [`AlertKind::RsiLevel`].
    pub magnitude: f64,
    pub direction: Direction,
}

impl AlertEvent {
    pub fn price_move(exchange: &str, symbol: &str, change_pct: f64, direction: Direction) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            kind: AlertKind::PriceMove,
            magnitude: change_pct,
            direction,
        }
    }

    pub fn rsi_level(exchange: &str, symbol: &str, rsi: u8, direction: Direction) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            kind: AlertKind::RsiLevel,
            magnitude: f64::from(rsi),
            direction,
        }
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AlertKind::PriceMove => write!(
                f,
                "{}/{}: {:+.2}%",
                self.exchange, self.symbol, self.magnitude
            ),
            AlertKind::RsiLevel => write!(
                f,
                "{}/{}: RSI {:.0} ({})",
                self.exchange,
                self.symbol,
                self.magnitude,
                match self.direction {
                    Direction::Up => "overbought",
                    Direction::Down => "oversold",
                }
            ),
        }
    }
}
