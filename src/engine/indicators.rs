//! # engine::indicators
//!
//! Pure numeric core: percent change and Wilder-smoothed RSI.
//!
//! ## RSI
//! ```text
//! seed      avg_gain = Σ gains  over first min(N, len-1) deltas / N
//!           avg_loss = Σ losses over first min(N, len-1) deltas / N
//! each next avg      = (avg * (N-1) + this_tick) / N
//! RS  = avg_gain / avg_loss
//! RSI = 100 - 100 / (1 + RS)            truncated to an integer
//! ```
//!
//! Batch ([`rsi`]) and incremental ([`WilderAverages::smooth`]) evaluation
//! share the same recurrence, so folding `k` new ticks into stored averages
//! gives bit-identical results to recomputing over the whole series.

use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;

/// RSI reported for an empty series.
pub const NEUTRAL_RSI: u8 = 50;

// ─── Percent Change ───────────────────────────────────────────────────────────

/// `((new - old) / old) * 100`, rounded to two decimals.
pub fn percent_change(old: f64, new: f64) -> Result<f64, IndicatorError> {
    if old == 0.0 {
        return Err(IndicatorError::ZeroBaseline);
    }
    Ok(round2((new - old) / old * 100.0))
}

#[inline]
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ─── Wilder Averages ──────────────────────────────────────────────────────────

/// Rolling average gain / loss. Both sides are always `>= 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WilderAverages {
    pub avg_gain: f64,
    pub avg_loss: f64,
}

impl WilderAverages {
    /// Seed from the first deltas. Each sum is divided by `period`, not by
    /// the number of gain or loss ticks.
    pub fn seed(deltas: &[f64], period: usize) -> Self {
        let period = period.max(1) as f64;
        let (gains, losses) = deltas.iter().fold((0.0, 0.0), |(g, l), &d| {
            let (gain, loss) = split(d);
            (g + gain, l + loss)
        });

        Self {
            avg_gain: gains / period,
            avg_loss: losses / period,
        }
    }

    /// Fold one price delta into the averages. Both sides move every tick.
    pub fn smooth(self, delta: f64, period: usize) -> Self {
        let period = period.max(1) as f64;
        let (gain, loss) = split(delta);

        Self {
            avg_gain: (self.avg_gain * (period - 1.0) + gain) / period,
            avg_loss: (self.avg_loss * (period - 1.0) + loss) / period,
        }
    }

    /// RSI for the current averages.
    ///
    /// Flat (`0 / 0`) reads as 0 and a loss-free series as 100; neither
    /// divides by zero.
    pub fn rsi(&self) -> u8 {
        if self.avg_gain <= 0.0 {
            return 0;
        }
        if self.avg_loss <= 0.0 {
            return 100;
        }

        let rs = self.avg_gain / self.avg_loss;
        let value = 100.0 - 100.0 / (1.0 + rs);

        value.trunc().clamp(0.0, 100.0) as u8
    }
}

/// `(gain, loss)` for one delta; at most one side is non-zero.
#[inline]
fn split(delta: f64) -> (f64, f64) {
    if delta > 0.0 {
        (delta, 0.0)
    } else if delta < 0.0 {
        (0.0, -delta)
    } else {
        (0.0, 0.0)
    }
}

// ─── Batch RSI ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiReading {
    pub value:    u8,
    pub averages: WilderAverages,
    /// At least `period` deltas were available for the seed window.
    pub seeded:   bool,
}

/// RSI over `closes` (oldest first).
pub fn rsi(closes: &[f64], period: usize) -> RsiReading {
    let period = period.max(1);

    if closes.is_empty() {
        return RsiReading {
            value:    NEUTRAL_RSI,
            averages: WilderAverages::default(),
            seeded:   false,
        };
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let seed_len = period.min(deltas.len());

    let averages = deltas[seed_len..]
        .iter()
        .fold(WilderAverages::seed(&deltas[..seed_len], period), |avg, &d| {
            avg.smooth(d, period)
        });

    RsiReading {
        value: averages.rsi(),
        averages,
        seeded: deltas.len() >= period,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
