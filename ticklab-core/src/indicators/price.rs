//! Trivial series: the close itself and a constant level.

use crate::domain::Candle;
use crate::indicators::Indicator;

#[derive(Debug, Clone, Copy)]
pub struct Close;

impl Indicator for Close {
    fn name(&self) -> &str {
        "close"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        candles.iter().map(|c| c.close).collect()
    }
}

/// A horizontal line, e.g. an RSI level to cross.
#[derive(Debug, Clone)]
pub struct Constant {
    value: f64,
    name: String,
}

impl Constant {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            name: format!("const_{value}"),
        }
    }
}

impl Indicator for Constant {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        vec![self.value; candles.len()]
    }
}
