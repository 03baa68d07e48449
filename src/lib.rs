//! # Moonwatch — Multi-Exchange Price & RSI Alerts
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌──────────────┐  fetch_tickers / fetch_candles  ┌──────────────────────┐
//!  │  Exchange    │ ◀────────────────────────────── │  Orchestrator        │
//!  │  adapters    │   (RetryingClient → reqwest)    │  one fetch per       │
//!  └──────────────┘                                 │  exchange per cycle  │
//!                                                   └──────────┬───────────┘
//!                                                              │ prices, closes
//!                                                   ┌──────────▼───────────┐
//!                                                   │  SymbolStore         │
//!                                                   │  RwLock<HashMap<     │
//!                                                   │    (exchange,symbol),│
//!                                                   │    price + RSI>>     │
//!                                                   └──────────┬───────────┘
//!                                                              │ AlertEvent
//!  ┌──────────────┐        Vec<Arc<AlertEvent>>     ┌──────────▼───────────┐
//!  │  Formatter   │ ◀────────────────────────────── │  per-subscriber      │
//!  │  → delivery  │                                 │  fan-in              │
//!  └──────────────┘                                 └──────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod formatter;
pub mod models;
pub mod state;
pub mod transport;

pub use config::{AlertConfig, Config};
pub use engine::{CycleOutcome, Orchestrator};
pub use error::{FetchError, IndicatorError};
pub use exchange::{Exchange, ExchangeRegistry};
pub use formatter::{AlertFormatter, PlainTextFormatter, TextMessage};
pub use models::{AlertEvent, AlertKind, Direction};
pub use state::SymbolStore;
pub use transport::{HttpTransport, RetryPolicy, RetryingClient, Transport};
