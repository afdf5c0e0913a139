//! Rolling mean of another indicator's series.
//!
//! Lookback: inner lookback + period - 1. A window touching an undefined
//! inner value is undefined.

use crate::domain::Candle;
use crate::indicators::Indicator;

#[derive(Debug)]
pub struct Mean {
    inner: Box<dyn Indicator>,
    period: usize,
    name: String,
}

impl Mean {
    pub fn new(inner: Box<dyn Indicator>, period: usize) -> Self {
        assert!(period >= 1, "mean period must be >= 1");
        let name = format!("mean_{period}({})", inner.name());
        Self { inner, period, name }
    }
}

impl Indicator for Mean {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.inner.lookback() + self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let values = self.inner.compute(candles);
        let mut result = vec![f64::NAN; values.len()];
        for (end, slot) in result.iter_mut().enumerate().skip(self.period - 1) {
            let window = &values[end + 1 - self.period..=end];
            if window.iter().all(|v| !v.is_nan()) {
                *slot = window.iter().sum::<f64>() / self.period as f64;
            }
        }
        result
    }
}
