//! Exponential moving average of closes.
//!
//! EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seeded with the SMA of the first `period` closes. Lookback: period - 1.

use crate::domain::Candle;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        ema_of_series(&closes, self.period)
    }
}

/// EMA of an arbitrary series. NaN in the seed window leaves everything NaN;
/// NaN after the seed taints the rest.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let seed_window = &values[..period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in period..n {
        if values[i].is_nan() {
            break;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}
