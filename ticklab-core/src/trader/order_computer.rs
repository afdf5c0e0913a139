//! Order computers: fill in stop-loss, take-profit and size of an order draft.
//!
//! The trader runs them in that order, so take-profit and sizing can rely on
//! the stop-loss already being set.

use std::fmt::Debug;

use crate::domain::{Direction, Order};
use crate::indicators::{last_value, Atr, Indicator};
use crate::trader::TraderContext;

/// Price distance of one pip for the supported FX quotes.
pub const PIP_SIZE: f64 = 0.0001;

/// Lots shaved off the leverage cap so rounding never tips an order over
/// the available margin.
const SIZE_SAFETY_LOTS: f64 = 2.0;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum OrderError {
    #[error("invalid stop loss price: entry={entry:.5}, stop_loss={stop_loss:.5}")]
    InvalidStopLoss { entry: f64, stop_loss: f64 },
    #[error("invalid risk parameters: {0}")]
    InvalidRiskParameters(String),
    #[error("not enough history: need {needed} candles, have {available}")]
    InsufficientHistory { needed: usize, available: usize },
    #[error("order draft missing {0}")]
    Incomplete(&'static str),
}

/// An order being assembled by the computers.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub direction: Direction,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub quantity: Option<u64>,
}

impl OrderDraft {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            stop_loss: None,
            take_profit: None,
            quantity: None,
        }
    }

    pub fn into_order(self) -> Result<Order, OrderError> {
        Ok(Order::new(
            self.direction,
            self.quantity.ok_or(OrderError::Incomplete("quantity"))?,
            self.stop_loss.ok_or(OrderError::Incomplete("stop loss"))?,
            self.take_profit.ok_or(OrderError::Incomplete("take profit"))?,
        ))
    }

    fn require_stop_loss(&self) -> Result<f64, OrderError> {
        self.stop_loss.ok_or(OrderError::Incomplete("stop loss"))
    }
}

pub trait OrderComputer: Debug + Send + Sync {
    fn compute(&self, ctx: &TraderContext<'_>, draft: &mut OrderDraft) -> Result<(), OrderError>;
}

fn entry_price(ctx: &TraderContext<'_>) -> Result<f64, OrderError> {
    ctx.entry_price().ok_or(OrderError::InsufficientHistory {
        needed: 1,
        available: 0,
    })
}

// ─── Stop loss ──────────────────────────────────────────────────────

/// Extreme of the last `lookback` candles, pushed out by `pip_buffer` pips:
/// below the lowest low for Long, above the highest high for Short.
#[derive(Debug, Clone, Copy)]
pub struct StopLossLookback {
    pub lookback: usize,
    pub pip_buffer: f64,
}

impl OrderComputer for StopLossLookback {
    fn compute(&self, ctx: &TraderContext<'_>, draft: &mut OrderDraft) -> Result<(), OrderError> {
        let insufficient = || OrderError::InsufficientHistory {
            needed: self.lookback,
            available: ctx.history.len(),
        };
        let buffer = self.pip_buffer * PIP_SIZE;
        let stop = match draft.direction {
            Direction::Long => ctx.history.lowest_low(self.lookback).ok_or_else(insufficient)? - buffer,
            Direction::Short => {
                ctx.history.highest_high(self.lookback).ok_or_else(insufficient)? + buffer
            }
        };
        draft.stop_loss = Some(stop);
        Ok(())
    }
}

/// `multiplier` ATRs away from the entry price.
#[derive(Debug, Clone)]
pub struct StopLossAtr {
    pub atr: Atr,
    pub multiplier: f64,
}

impl OrderComputer for StopLossAtr {
    fn compute(&self, ctx: &TraderContext<'_>, draft: &mut OrderDraft) -> Result<(), OrderError> {
        let entry = entry_price(ctx)?;
        let atr = last_value(&ctx.indicator(&self.atr)).ok_or(OrderError::InsufficientHistory {
            needed: self.atr.lookback() + 1,
            available: ctx.history.len(),
        })?;
        draft.stop_loss = Some(entry - draft.direction.sign() * self.multiplier * atr);
        Ok(())
    }
}

// ─── Take profit ────────────────────────────────────────────────────

/// Take-profit at `ratio` times the entry-to-stop risk.
#[derive(Debug, Clone, Copy)]
pub struct TakeProfitRatio(pub f64);

impl OrderComputer for TakeProfitRatio {
    fn compute(&self, ctx: &TraderContext<'_>, draft: &mut OrderDraft) -> Result<(), OrderError> {
        let entry = entry_price(ctx)?;
        let stop_loss = draft.require_stop_loss()?;

        let risk = match draft.direction {
            Direction::Long => entry - stop_loss,
            Direction::Short => stop_loss - entry,
        };
        if risk <= 0.0 {
            return Err(OrderError::InvalidRiskParameters(format!(
                "stop loss on the wrong side for {}: entry={entry:.5}, stop_loss={stop_loss:.5}",
                draft.direction
            )));
        }

        draft.take_profit = Some(entry + draft.direction.sign() * self.0 * risk);
        Ok(())
    }
}

// ─── Capital allocation ─────────────────────────────────────────────

/// Risk a fixed amount of capital per trade.
#[derive(Debug, Clone, Copy)]
pub struct CapitalFixed(pub f64);

impl OrderComputer for CapitalFixed {
    fn compute(&self, ctx: &TraderContext<'_>, draft: &mut OrderDraft) -> Result<(), OrderError> {
        size_for_risk(ctx, draft, self.0)
    }
}

/// Risk a percentage of current capital per trade.
#[derive(Debug, Clone, Copy)]
pub struct CapitalRiskPercent(pub f64);

impl OrderComputer for CapitalRiskPercent {
    fn compute(&self, ctx: &TraderContext<'_>, draft: &mut OrderDraft) -> Result<(), OrderError> {
        let risk = ctx.broker.capital() * self.0 / 100.0;
        size_for_risk(ctx, draft, risk)
    }
}

/// Lots such that hitting the stop loses `account_risk`, capped by what the
/// leverage allows.
fn size_for_risk(
    ctx: &TraderContext<'_>,
    draft: &mut OrderDraft,
    account_risk: f64,
) -> Result<(), OrderError> {
    let entry = entry_price(ctx)?;
    let stop_loss = draft.require_stop_loss()?;

    let distance = (entry - stop_loss).abs();
    if distance.is_nan() || distance <= 0.0 {
        return Err(OrderError::InvalidStopLoss { entry, stop_loss });
    }

    let lot_size = f64::from(ctx.broker.lot_size());
    let mut size = account_risk / (lot_size * distance);

    let max_size = ctx.broker.capital() * ctx.broker.leverage() / (lot_size * entry) - SIZE_SAFETY_LOTS;
    if size > max_size {
        size = max_size;
    }

    let lots = size.floor();
    if lots.is_nan() || lots < 1.0 {
        return Err(OrderError::InvalidRiskParameters(format!(
            "position size {size:.2} rounds to zero lots"
        )));
    }

    draft.quantity = Some(lots as u64);
    Ok(())
}
