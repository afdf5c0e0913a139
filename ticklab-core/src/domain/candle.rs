//! Candle: OHLC summary of the ticks in one timeframe bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLC candle over tick mid prices.
///
/// `usable` is false when any contributing tick was gap-marked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start instant.
    pub start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_count: usize,
    pub usable: bool,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// high/low bound open/close.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(open: f64, close: f64) -> Candle {
        Candle {
            start: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open,
            high: open.max(close) + 0.001,
            low: open.min(close) - 0.001,
            close,
            tick_count: 4,
            usable: true,
        }
    }

    #[test]
    fn direction_helpers() {
        assert!(candle(1.0, 1.1).is_bullish());
        assert!(candle(1.1, 1.0).is_bearish());
        let flat = candle(1.0, 1.0);
        assert!(!flat.is_bullish() && !flat.is_bearish());
    }

    #[test]
    fn sanity_check() {
        assert!(candle(1.0, 1.1).is_sane());
        let mut bad = candle(1.0, 1.1);
        bad.high = 0.5;
        assert!(!bad.is_sane());
    }
}
