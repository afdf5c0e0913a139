//! Candle timeframes and bucket arithmetic.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed candle duration, in seconds.
///
/// Ordering follows duration, so a `BTreeMap<Timeframe, _>` iterates from the
/// shortest timeframe to the longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timeframe {
    seconds: u32,
}

impl Timeframe {
    pub const ONE_MINUTE: Timeframe = Timeframe { seconds: 60 };
    pub const FIVE_MINUTES: Timeframe = Timeframe { seconds: 5 * 60 };
    pub const FIFTEEN_MINUTES: Timeframe = Timeframe { seconds: 15 * 60 };
    pub const ONE_HOUR: Timeframe = Timeframe { seconds: 60 * 60 };
    pub const ONE_DAY: Timeframe = Timeframe { seconds: 24 * 60 * 60 };

    /// Returns `None` for a zero duration.
    pub fn from_seconds(seconds: u32) -> Option<Self> {
        (seconds > 0).then_some(Self { seconds })
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    pub fn millis(&self) -> i64 {
        i64::from(self.seconds) * 1000
    }

    /// Start of the bucket containing `ts`: `floor(ts / d) * d`.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let d = self.millis();
        let start = ts.timestamp_millis().div_euclid(d) * d;
        Utc.timestamp_millis_opt(start)
            .single()
            .unwrap_or(ts)
    }

    /// Bucket index used for equality checks in the aggregator.
    pub fn bucket_of(&self, ts: DateTime<Utc>) -> i64 {
        ts.timestamp_millis().div_euclid(self.millis())
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3600 == 0 {
            write!(f, "{}h", s / 3600)
        } else if s % 60 == 0 {
            write!(f, "{}m", s / 60)
        } else {
            write!(f, "{s}s")
        }
    }
}
