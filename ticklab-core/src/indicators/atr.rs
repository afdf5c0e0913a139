//! Average True Range with Wilder smoothing.
//!
//! TR[t] = max(high - low, |high - close[t-1]|, |low - close[t-1]|).
//! TR[0] has no previous close and is left out. Lookback: period.

use crate::domain::Candle;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        wilder_smooth(&true_range(candles), self.period)
    }
}

/// True range per candle; NaN for the first.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; candles.len()];
    for i in 1..candles.len() {
        let (h, l, pc) = (candles[i].high, candles[i].low, candles[i - 1].close);
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }
    tr
}

/// Wilder smoothing (alpha = 1/period), seeded with the mean of the first run
/// of `period` consecutive defined values. A NaN after the seed ends the series.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let Some(seed_start) = (0..=n - period)
        .find(|&i| values[i..i + period].iter().all(|v| !v.is_nan()))
    else {
        return result;
    };
    let seed_end = seed_start + period;
    let mut prev = values[seed_start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = prev;

    let alpha = 1.0 / period as f64;
    for i in seed_end..n {
        if values[i].is_nan() {
            break;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}
