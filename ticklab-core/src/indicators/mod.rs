//! Candle indicators used by the modular trader's conditions.
//!
//! Indicators are pure functions of the candle history: every series has the
//! same length as its input, and the first `lookback()` values are NaN
//! (warmup). Values are recomputed once per candle through the trader's
//! `IndicatorCache`, keyed by `name()`.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod mean;
pub mod price;
pub mod rsi;

use std::fmt::Debug;

use crate::domain::Candle;

pub use adx::Adx;
pub use atr::{true_range, wilder_smooth, Atr};
pub use ema::Ema;
pub use mean::Mean;
pub use price::{Close, Constant};
pub use rsi::Rsi;

/// Single-series indicator over 1-minute candles.
///
/// No value at index t may depend on candles after t.
pub trait Indicator: Debug + Send + Sync {
    /// Identity of the series, e.g. "ema_20" or "mean_5(rsi_14)". Two
    /// indicators with the same name compute the same values.
    fn name(&self) -> &str;

    /// Number of leading NaN values on clean input.
    fn lookback(&self) -> usize;

    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Last non-NaN value of a series, if its final value is defined.
pub fn last_value(values: &[f64]) -> Option<f64> {
    values.last().copied().filter(|v| !v.is_nan())
}

/// Candles from close prices: open is the previous close, high/low pad the
/// body by 0.0010.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                start: base + Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.0010,
                low: open.min(close) - 0.0010,
                close,
                tick_count: 10,
                usable: true,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
