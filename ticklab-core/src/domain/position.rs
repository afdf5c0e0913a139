//! Simulated positions and the close-trigger state machine.
//!
//! `Open -> Closed(StopLoss | TakeProfit | EndOfRun) | Canceled`. Terminal
//! states absorb: closing or canceling a settled position is a no-op.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Direction, Order, Tick};

/// Stable handle into the broker's position arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub usize);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    EndOfRun,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::StopLoss => write!(f, "stop loss"),
            CloseReason::TakeProfit => write!(f, "take profit"),
            CloseReason::EndOfRun => write!(f, "end of run"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closed(CloseReason),
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub direction: Direction,
    pub quantity: u64,
    pub open_price: f64,
    pub open_time: DateTime<Utc>,
    /// Broker capital just before the margin was debited.
    pub capital_at_open: f64,
    /// Margin reserved at open: `quantity * open_price / leverage`.
    pub margin: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reason: Option<String>,
    pub close_price: Option<f64>,
    pub close_time: Option<DateTime<Utc>>,
    pub status: PositionStatus,
}

impl Position {
    /// Open a position from an order at the tick's entry price.
    pub fn open(id: PositionId, order: &Order, tick: &Tick, leverage: f64, capital: f64) -> Self {
        let open_price = order.direction.entry_price(tick);
        Self {
            id,
            direction: order.direction,
            quantity: order.quantity,
            open_price,
            open_time: tick.timestamp,
            capital_at_open: capital,
            margin: order.quantity as f64 * open_price / leverage,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            reason: order.reason.clone(),
            close_price: None,
            close_time: None,
            status: PositionStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, PositionStatus::Closed(_))
    }

    pub fn is_canceled(&self) -> bool {
        self.status == PositionStatus::Canceled
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        match self.status {
            PositionStatus::Closed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Realized PnL. Zero unless closed.
    pub fn pnl(&self) -> f64 {
        match (self.status, self.close_price) {
            (PositionStatus::Closed(_), Some(close)) => {
                self.direction.sign() * self.quantity as f64 * (close - self.open_price)
            }
            _ => 0.0,
        }
    }

    /// Initial risk per unit: `|open - stop_loss|`.
    pub fn risk_distance(&self) -> f64 {
        (self.open_price - self.stop_loss).abs()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.close_time.map(|t| t - self.open_time)
    }

    /// Evaluate the close trigger at the tick's exit price.
    /// Stop-loss is checked first and wins when both would fire.
    pub fn check_trigger(&self, tick: &Tick) -> Option<CloseReason> {
        if !self.is_open() {
            return None;
        }
        let exit = self.direction.exit_price(tick);
        match self.direction {
            Direction::Long => {
                if exit <= self.stop_loss {
                    Some(CloseReason::StopLoss)
                } else if exit >= self.take_profit {
                    Some(CloseReason::TakeProfit)
                } else {
                    None
                }
            }
            Direction::Short => {
                if exit >= self.stop_loss {
                    Some(CloseReason::StopLoss)
                } else if exit <= self.take_profit {
                    Some(CloseReason::TakeProfit)
                } else {
                    None
                }
            }
        }
    }

    /// Close at the tick's exit price. Returns false if already settled.
    pub(crate) fn close(&mut self, tick: &Tick, reason: CloseReason) -> bool {
        if !self.is_open() {
            return false;
        }
        self.close_price = Some(self.direction.exit_price(tick));
        self.close_time = Some(tick.timestamp);
        self.status = PositionStatus::Closed(reason);
        true
    }

    /// Cancel without realizing PnL. Returns false if already settled.
    pub(crate) fn cancel(&mut self, at: DateTime<Utc>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.close_time = Some(at);
        self.status = PositionStatus::Canceled;
        true
    }
}
