//! Alert engine: indicator math and the per-cycle orchestrator.

pub mod indicators;
pub mod orchestrator;

pub use indicators::{percent_change, rsi, RsiReading, WilderAverages};
pub use orchestrator::{CycleCache, CycleOutcome, CycleSummary, Orchestrator, SubscriberId};
