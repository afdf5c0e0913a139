use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::engine::Broker;
use crate::indicators::Indicator;
use crate::trader::{History, IndicatorCache};

/// Read-only view handed to conditions and order computers.
pub struct TraderContext<'a> {
    pub broker: &'a dyn Broker,
    pub history: &'a History,
    pub indicators: &'a IndicatorCache,
    pub open_positions: usize,
}

impl<'a> TraderContext<'a> {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.broker.current_time()
    }

    /// Reference entry price: close of the latest candle.
    pub fn entry_price(&self) -> Option<f64> {
        self.history.price()
    }

    /// Indicator series over the current history, computed at most once per candle.
    pub fn indicator(&self, indicator: &dyn Indicator) -> Arc<[f64]> {
        self.indicators.values(self.history, indicator)
    }
}
