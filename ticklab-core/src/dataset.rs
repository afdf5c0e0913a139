//! Tick dataset: the ordered, gap-flagged input of a run.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::Tick;

/// Default gap threshold, in seconds.
pub const DEFAULT_MAX_GAP_SECS: i64 = 60;

/// Default spacing above which adjacent ticks are flagged as a gap.
pub fn default_max_gap() -> Duration {
    Duration::seconds(DEFAULT_MAX_GAP_SECS)
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DatasetError {
    #[error("dataset for {0} has no ticks")]
    Empty(String),
    #[error("ticks out of order at index {index}")]
    Unsorted { index: usize },
    #[error("cannot concatenate datasets for different symbols: {0} and {1}")]
    SymbolMismatch(String, String),
}

/// Flag both ticks of every adjacent pair spaced more than `max_gap` apart.
///
/// Existing flags are kept.
pub fn mark_gaps(ticks: &mut [Tick], max_gap: Duration) -> usize {
    let mut gaps = 0;
    for i in 1..ticks.len() {
        if ticks[i].timestamp - ticks[i - 1].timestamp > max_gap {
            ticks[i - 1].is_gap = true;
            ticks[i].is_gap = true;
            gaps += 1;
        }
    }
    gaps
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    symbol: String,
    begin_date: NaiveDate,
    end_date: NaiveDate,
    ticks: Vec<Tick>,
}

impl Dataset {
    /// Validate ordering and mark gaps.
    pub fn new(
        symbol: impl Into<String>,
        begin_date: NaiveDate,
        end_date: NaiveDate,
        mut ticks: Vec<Tick>,
        max_gap: Duration,
    ) -> Result<Self, DatasetError> {
        let symbol = symbol.into();
        if ticks.is_empty() {
            return Err(DatasetError::Empty(symbol));
        }
        if let Some(index) = ticks
            .windows(2)
            .position(|w| w[1].timestamp < w[0].timestamp)
        {
            return Err(DatasetError::Unsorted { index: index + 1 });
        }

        mark_gaps(&mut ticks, max_gap);

        Ok(Self {
            symbol,
            begin_date,
            end_date,
            ticks,
        })
    }

    /// Join consecutive slices (e.g. months) and re-mark gaps at the seams.
    pub fn concat(parts: Vec<Dataset>, max_gap: Duration) -> Result<Self, DatasetError> {
        let mut iter = parts.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| DatasetError::Empty(String::new()))?;

        let symbol = first.symbol;
        let begin_date = first.begin_date;
        let mut end_date = first.end_date;
        let mut ticks = first.ticks;

        for part in iter {
            if part.symbol != symbol {
                return Err(DatasetError::SymbolMismatch(symbol, part.symbol));
            }
            end_date = end_date.max(part.end_date);
            ticks.extend(part.ticks);
        }

        Self::new(symbol, begin_date, end_date, ticks, max_gap)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn begin_date(&self) -> NaiveDate {
        self.begin_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn gap_count(&self) -> usize {
        self.ticks.iter().filter(|t| t.is_gap).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn tick_at(secs: i64) -> Tick {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        Tick::new(base + Duration::seconds(secs), 1.0, 1.0002)
    }

    #[test]
    fn marks_both_sides_of_a_jump() {
        let ticks = vec![tick_at(0), tick_at(30), tick_at(200), tick_at(210)];
        let ds = Dataset::new("EURUSD", day(1), day(31), ticks, default_max_gap()).unwrap();
        let flags: Vec<bool> = ds.ticks().iter().map(|t| t.is_gap).collect();
        assert_eq!(flags, vec![false, true, true, false]);
        assert_eq!(ds.gap_count(), 2);
    }

    #[test]
    fn last_pair_is_checked() {
        let mut ticks = vec![tick_at(0), tick_at(10), tick_at(500)];
        assert_eq!(mark_gaps(&mut ticks, default_max_gap()), 1);
        assert!(ticks[1].is_gap && ticks[2].is_gap);
    }

    #[test]
    fn exact_threshold_is_not_a_gap() {
        let mut ticks = vec![tick_at(0), tick_at(60)];
        assert_eq!(mark_gaps(&mut ticks, default_max_gap()), 0);
    }

    #[test]
    fn empty_rejected() {
        let err = Dataset::new("EURUSD", day(1), day(31), vec![], default_max_gap()).unwrap_err();
        assert_eq!(err, DatasetError::Empty("EURUSD".into()));
    }

    #[test]
    fn unsorted_rejected() {
        let ticks = vec![tick_at(0), tick_at(20), tick_at(10)];
        let err = Dataset::new("EURUSD", day(1), day(31), ticks, default_max_gap()).unwrap_err();
        assert_eq!(err, DatasetError::Unsorted { index: 2 });
    }

    #[test]
    fn concat_remarks_seams() {
        let a = Dataset::new("EURUSD", day(1), day(15), vec![tick_at(0), tick_at(10)], default_max_gap())
            .unwrap();
        let b = Dataset::new(
            "EURUSD",
            day(16),
            day(31),
            vec![tick_at(1000), tick_at(1010)],
            default_max_gap(),
        )
        .unwrap();
        let joined = Dataset::concat(vec![a, b], default_max_gap()).unwrap();
        assert_eq!(joined.tick_count(), 4);
        assert_eq!(joined.begin_date(), day(1));
        assert_eq!(joined.end_date(), day(31));
        assert!(joined.ticks()[1].is_gap && joined.ticks()[2].is_gap);
        assert!(!joined.ticks()[0].is_gap);
    }

    #[test]
    fn concat_rejects_mixed_symbols() {
        let a = Dataset::new("EURUSD", day(1), day(2), vec![tick_at(0)], default_max_gap()).unwrap();
        let b = Dataset::new("GBPUSD", day(3), day(4), vec![tick_at(10)], default_max_gap()).unwrap();
        assert!(matches!(
            Dataset::concat(vec![a, b], default_max_gap()),
            Err(DatasetError::SymbolMismatch(_, _))
        ));
    }
}
