//! Calendar month (UTC), the unit of dataset slicing and metrics grouping.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MonthParseError {
    #[error("expected YYYY-MM, got '{0}'")]
    Format(String),
    #[error("month out of range: {0}")]
    OutOfRange(u32),
}

/// A calendar month. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_datetime(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    /// Midnight UTC on the first day.
    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.first_day().and_hms_opt(0, 0, 0).unwrap_or_default())
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Inclusive range of months. Empty when `end < begin`.
    pub fn range(begin: Month, end: Month) -> Vec<Month> {
        let mut months = Vec::new();
        let mut m = begin;
        while m <= end {
            months.push(m);
            m = m.next();
        }
        months
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        Self::from_datetime(ts) == *self
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| MonthParseError::Format(s.to_string()))?;
        let year: i32 = y.parse().map_err(|_| MonthParseError::Format(s.to_string()))?;
        let month: u32 = m.parse().map_err(|_| MonthParseError::Format(s.to_string()))?;
        Month::new(year, month).ok_or(MonthParseError::OutOfRange(month))
    }
}

impl TryFrom<String> for Month {
    type Error = MonthParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Month> for String {
    fn from(m: Month) -> Self {
        m.to_string()
    }
}
