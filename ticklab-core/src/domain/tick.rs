//! Tick: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single bid/ask quote observation.
///
/// `is_gap` is set by the dataset loader on both ticks around a time
/// discontinuity larger than the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub is_gap: bool,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        Self {
            timestamp,
            bid,
            ask,
            is_gap: false,
        }
    }

    /// Reference price: the bid/ask midpoint.
    pub fn price(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}
