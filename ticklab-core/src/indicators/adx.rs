//! Average Directional Index (Wilder).
//!
//! +DM/-DM from consecutive candles, Wilder-smoothed together with the true
//! range into +DI/-DI. DX = 100 * |+DI - -DI| / (+DI + -DI), and ADX is DX
//! smoothed again. Lookback: 2 * period - 1.

use crate::domain::Candle;
use crate::indicators::atr::{true_range, wilder_smooth};
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];
        for i in 1..n {
            let up = candles[i].high - candles[i - 1].high;
            let down = candles[i - 1].low - candles[i].low;
            plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
            minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        }

        let tr = wilder_smooth(&true_range(candles), self.period);
        let plus = wilder_smooth(&plus_dm, self.period);
        let minus = wilder_smooth(&minus_dm, self.period);

        let dx: Vec<f64> = (0..n)
            .map(|i| {
                if tr[i].is_nan() || tr[i] == 0.0 {
                    return f64::NAN;
                }
                let plus_di = 100.0 * plus[i] / tr[i];
                let minus_di = 100.0 * minus[i] / tr[i];
                let sum = plus_di + minus_di;
                if sum == 0.0 {
                    0.0
                } else {
                    100.0 * (plus_di - minus_di).abs() / sum
                }
            })
            .collect();

        wilder_smooth(&dx, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles};

    #[test]
    fn steady_trend_reads_100() {
        // Every candle makes a higher high and a higher low: -DM is always 0.
        let closes: Vec<f64> = (0..20).map(|i| 1.0 + 0.001 * i as f64).collect();
        let adx = Adx::new(3).compute(&make_candles(&closes));
        assert!(adx[4].is_nan());
        assert_approx(adx[5], 100.0, 1e-9);
        assert_approx(adx[19], 100.0, 1e-9);
    }

    #[test]
    fn bounded_on_choppy_data() {
        let closes: Vec<f64> = (0..40)
            .map(|i| {
                let swing = if i % 3 == 0 { 1.0 } else { -0.5 };
                1.0 + 0.002 * swing * (i % 5) as f64
            })
            .collect();
        for v in Adx::new(5).compute(&make_candles(&closes)).into_iter().filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
