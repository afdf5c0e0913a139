//! Candle aggregation over a tick slice.
//!
//! Stateless: a bucket closes at tick `i` when tick `i + 1` falls in a
//! different bucket or `i` is the last tick. The closing tick's candle is
//! rebuilt by scanning backward while the bucket matches.

use crate::domain::{Candle, Tick, Timeframe};

/// Candle completed at `index`, if `index` closes its bucket.
pub fn candle_closing_at(ticks: &[Tick], index: usize, timeframe: Timeframe) -> Option<Candle> {
    let current = ticks.get(index)?;
    let bucket = timeframe.bucket_of(current.timestamp);

    if let Some(next) = ticks.get(index + 1) {
        if timeframe.bucket_of(next.timestamp) == bucket {
            return None;
        }
    }

    let mut first = index;
    while first > 0 && timeframe.bucket_of(ticks[first - 1].timestamp) == bucket {
        first -= 1;
    }

    Some(build_candle(&ticks[first..=index], timeframe))
}

/// Every candle in the slice, in time order.
pub fn aggregate(ticks: &[Tick], timeframe: Timeframe) -> Vec<Candle> {
    (0..ticks.len())
        .filter_map(|i| candle_closing_at(ticks, i, timeframe))
        .collect()
}

fn build_candle(bucket: &[Tick], timeframe: Timeframe) -> Candle {
    let open = bucket[0].price();
    let mut high = open;
    let mut low = open;
    let mut usable = true;

    for tick in bucket {
        let price = tick.price();
        high = high.max(price);
        low = low.min(price);
        if tick.is_gap {
            usable = false;
        }
    }

    Candle {
        start: timeframe.bucket_start(bucket[0].timestamp),
        open,
        high,
        low,
        close: bucket[bucket.len() - 1].price(),
        tick_count: bucket.len(),
        usable,
    }
}
