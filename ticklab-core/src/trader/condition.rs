//! Boolean conditions used as filters and entry triggers.

use std::fmt::Debug;

use chrono::{Datelike, Timelike, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::{HolidayCalendar, Session};
use crate::indicators::{last_value, Indicator};
use crate::trader::TraderContext;

pub trait Condition: Debug + Send + Sync {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool;
}

/// History window is full and contains no gap-affected candle.
#[derive(Debug, Clone, Copy)]
pub struct HistoryUsable;

impl Condition for HistoryUsable {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        ctx.history.is_usable()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NoOpenPositions;

impl Condition for NoOpenPositions {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        ctx.open_positions == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleKind {
    Bullish,
    Bearish,
}

/// The candle `lookback` steps back (0 = latest) closed up or down.
#[derive(Debug, Clone, Copy)]
pub struct CandleDirection {
    pub lookback: usize,
    pub kind: CandleKind,
}

impl Condition for CandleDirection {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        match ctx.history.get(self.lookback) {
            Some(c) => match self.kind {
                CandleKind::Bullish => c.is_bullish(),
                CandleKind::Bearish => c.is_bearish(),
            },
            None => false,
        }
    }
}

/// Current simulated day, in `tz`, is one of `days`.
#[derive(Debug, Clone)]
pub struct Weekdays {
    pub days: Vec<Weekday>,
    pub tz: Tz,
}

impl Condition for Weekdays {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        let local = ctx.timestamp().with_timezone(&self.tz);
        self.days.contains(&local.weekday())
    }
}

/// Current hour, in `tz`, within `[start, end)`.
#[derive(Debug, Clone, Copy)]
pub struct Hours {
    pub start: u32,
    pub end: u32,
    pub tz: Tz,
}

impl Condition for Hours {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        let hour = ctx.timestamp().with_timezone(&self.tz).hour();
        hour >= self.start && hour < self.end
    }
}

/// The market session is open.
#[derive(Debug, Clone, Copy)]
pub struct InSession(pub Session);

impl Condition for InSession {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        self.0.is_open(ctx.timestamp())
    }
}

/// The current local date is not a public holiday of the calendar.
#[derive(Debug, Clone, Copy)]
pub struct NotHoliday(pub HolidayCalendar);

impl Condition for NotHoliday {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        !self.0.is_holiday(ctx.timestamp())
    }
}

// ─── Indicator conditions ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Above,
    Below,
}

impl Relation {
    /// `value` at or beyond `level` on this side.
    fn reaches(self, value: f64, level: f64) -> bool {
        match self {
            Relation::Above => value >= level,
            Relation::Below => value <= level,
        }
    }

    /// `value` strictly beyond `level` on this side.
    fn exceeds(self, value: f64, level: f64) -> bool {
        match self {
            Relation::Above => value > level,
            Relation::Below => value < level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cross {
    Up,
    Down,
}

/// `test` crossed `reference` on the latest candle: strictly on one side
/// before, strictly on the other now.
#[derive(Debug)]
pub struct CrossOver {
    pub reference: Box<dyn Indicator>,
    pub test: Box<dyn Indicator>,
    pub direction: Cross,
}

impl Condition for CrossOver {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        let refs = ctx.indicator(self.reference.as_ref());
        let tests = ctx.indicator(self.test.as_ref());
        let (n, m) = (refs.len(), tests.len());
        if n < 2 || m < 2 {
            return false;
        }
        let (prev_ref, curr_ref) = (refs[n - 2], refs[n - 1]);
        let (prev_test, curr_test) = (tests[m - 2], tests[m - 1]);
        match self.direction {
            Cross::Up => prev_test < prev_ref && curr_test > curr_ref,
            Cross::Down => prev_test > prev_ref && curr_test < curr_ref,
        }
    }
}

/// Latest indicator value at or beyond a fixed level.
#[derive(Debug)]
pub struct Threshold {
    pub indicator: Box<dyn Indicator>,
    pub level: f64,
    pub relation: Relation,
}

impl Condition for Threshold {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        last_value(&ctx.indicator(self.indicator.as_ref()))
            .is_some_and(|v| self.relation.reaches(v, self.level))
    }
}

/// Entry price at or beyond the latest indicator value.
#[derive(Debug)]
pub struct PriceThreshold {
    pub indicator: Box<dyn Indicator>,
    pub relation: Relation,
}

impl Condition for PriceThreshold {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        let Some(price) = ctx.entry_price() else {
            return false;
        };
        last_value(&ctx.indicator(self.indicator.as_ref()))
            .is_some_and(|v| self.relation.reaches(price, v))
    }
}

/// Latest indicator value within `[min, max]`.
#[derive(Debug)]
pub struct IndicatorRange {
    pub indicator: Box<dyn Indicator>,
    pub min: f64,
    pub max: f64,
}

impl Condition for IndicatorRange {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        last_value(&ctx.indicator(self.indicator.as_ref()))
            .is_some_and(|v| v >= self.min && v <= self.max)
    }
}

/// Distance between close and indicator now compared with the same distance
/// `period` candles ago. `Above` means the price moved away from the
/// indicator. Needs a usable history.
#[derive(Debug)]
pub struct DistanceToPrevious {
    pub indicator: Box<dyn Indicator>,
    pub period: usize,
    pub relation: Relation,
}

impl Condition for DistanceToPrevious {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        if !ctx.history.is_usable() {
            return false;
        }
        let values = ctx.indicator(self.indicator.as_ref());
        let n = values.len();
        if n < self.period + 1 {
            return false;
        }
        let (Some(now), Some(then)) = (ctx.history.get(0), ctx.history.get(self.period)) else {
            return false;
        };
        let current = (now.close - values[n - 1]).abs();
        let previous = (then.close - values[n - 1 - self.period]).abs();
        self.relation.exceeds(current, previous)
    }
}

/// Logical and. Empty is true.
#[derive(Debug)]
pub struct All(pub Vec<Box<dyn Condition>>);

impl Condition for All {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        self.0.iter().all(|c| c.evaluate(ctx))
    }
}

/// Logical or. Empty is false.
#[derive(Debug)]
pub struct Any(pub Vec<Box<dyn Condition>>);

impl Condition for Any {
    fn evaluate(&self, ctx: &TraderContext<'_>) -> bool {
        self.0.iter().any(|c| c.evaluate(ctx))
    }
}
