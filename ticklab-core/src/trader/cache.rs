//! Per-candle memo of indicator series.
//!
//! Several conditions often read the same indicator (e.g. two crossovers on
//! one EMA). The cache computes each series once per candle, keyed by the
//! indicator's name, and is cleared when the next candle arrives.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::Candle;
use crate::indicators::Indicator;
use crate::trader::History;

#[derive(Debug, Default)]
pub struct IndicatorCache {
    series: RefCell<HashMap<String, Arc<[f64]>>>,
    candles: RefCell<Option<Arc<[Candle]>>>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything computed for the previous candle.
    pub fn clear(&self) {
        self.series.borrow_mut().clear();
        *self.candles.borrow_mut() = None;
    }

    /// Series of `indicator` over `history`, aligned with it (last value is
    /// the latest candle).
    pub fn values(&self, history: &History, indicator: &dyn Indicator) -> Arc<[f64]> {
        if let Some(values) = self.series.borrow().get(indicator.name()) {
            return Arc::clone(values);
        }
        let candles = self.candles(history);
        let values: Arc<[f64]> = indicator.compute(&candles).into();
        self.series
            .borrow_mut()
            .insert(indicator.name().to_string(), Arc::clone(&values));
        values
    }

    pub fn len(&self) -> usize {
        self.series.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn candles(&self, history: &History) -> Arc<[Candle]> {
        let mut slot = self.candles.borrow_mut();
        Arc::clone(slot.get_or_insert_with(|| history.iter().copied().collect()))
    }
}
