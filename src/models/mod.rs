//! Domain models shared across the whole alert pipeline.

pub mod alert;
pub mod market;

pub use alert::{AlertEvent, AlertKind, Direction};
pub use market::{Candle, Ticker, Timeframe};
