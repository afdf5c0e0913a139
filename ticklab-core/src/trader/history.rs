//! Rolling window of the most recent candles.

use std::collections::VecDeque;

use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct History {
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a candle, evicting the oldest once full.
    pub fn push(&mut self, candle: Candle) {
        if self.capacity == 0 {
            return;
        }
        if self.candles.len() == self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.candles.len() == self.capacity
    }

    /// Full and every candle usable.
    pub fn is_usable(&self) -> bool {
        self.is_full() && self.candles.iter().all(|c| c.usable)
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Candle `lookback` steps back from the latest (0 = latest).
    pub fn get(&self, lookback: usize) -> Option<&Candle> {
        let len = self.candles.len();
        if lookback >= len {
            return None;
        }
        self.candles.get(len - 1 - lookback)
    }

    /// Close of the latest candle.
    pub fn price(&self) -> Option<f64> {
        self.latest().map(|c| c.close)
    }

    /// Lowest low over the last `period` candles. `None` if fewer are held.
    pub fn lowest_low(&self, period: usize) -> Option<f64> {
        self.window(period)
            .map(|w| w.map(|c| c.low).fold(f64::INFINITY, f64::min))
    }

    /// Highest high over the last `period` candles. `None` if fewer are held.
    pub fn highest_high(&self, period: usize) -> Option<f64> {
        self.window(period)
            .map(|w| w.map(|c| c.high).fold(f64::NEG_INFINITY, f64::max))
    }

    fn window(&self, period: usize) -> Option<impl Iterator<Item = &Candle>> {
        if period == 0 || period > self.candles.len() {
            return None;
        }
        Some(self.candles.iter().skip(self.candles.len() - period))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(i: u32, low: f64, high: f64, usable: bool) -> Candle {
        Candle {
            start: Utc.with_ymd_and_hms(2024, 1, 2, 9, i, 0).unwrap(),
            open: low,
            high,
            low,
            close: high,
            tick_count: 1,
            usable,
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut h = History::new(2);
        h.push(candle(0, 1.0, 2.0, true));
        h.push(candle(1, 1.1, 2.1, true));
        h.push(candle(2, 1.2, 2.2, true));
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(1).unwrap().low, 1.1);
        assert_eq!(h.get(0).unwrap().low, 1.2);
        assert!(h.get(2).is_none());
        assert_eq!(h.price(), Some(2.2));
    }

    #[test]
    fn usable_needs_full_window_of_usable_candles() {
        let mut h = History::new(3);
        h.push(candle(0, 1.0, 2.0, true));
        h.push(candle(1, 1.0, 2.0, true));
        assert!(!h.is_usable());
        h.push(candle(2, 1.0, 2.0, false));
        assert!(h.is_full());
        assert!(!h.is_usable());
        for i in 3..6 {
            h.push(candle(i, 1.0, 2.0, true));
        }
        assert!(h.is_usable());
    }

    #[test]
    fn extremes_over_window() {
        let mut h = History::new(5);
        h.push(candle(0, 0.5, 3.0, true));
        h.push(candle(1, 1.0, 2.0, true));
        h.push(candle(2, 0.9, 2.5, true));
        assert_eq!(h.lowest_low(2), Some(0.9));
        assert_eq!(h.highest_high(2), Some(2.5));
        assert_eq!(h.lowest_low(3), Some(0.5));
        assert_eq!(h.highest_high(3), Some(3.0));
        assert!(h.lowest_low(4).is_none());
        assert!(h.highest_high(0).is_none());
    }

    #[test]
    fn zero_capacity_holds_nothing() {
        let mut h = History::new(0);
        h.push(candle(0, 1.0, 2.0, true));
        assert!(h.is_empty());
        assert!(!h.is_usable());
    }
}
