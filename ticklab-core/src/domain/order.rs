use serde::{Deserialize, Serialize};
use std::fmt;

use super::Tick;

/// Trade direction. Closed set: anything else is rejected when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Long buys at the ask, Short sells at the bid.
    pub fn entry_price(&self, tick: &Tick) -> f64 {
        match self {
            Direction::Long => tick.ask,
            Direction::Short => tick.bid,
        }
    }

    /// Exit is on the opposite side from entry.
    pub fn exit_price(&self, tick: &Tick) -> f64 {
        match self {
            Direction::Long => tick.bid,
            Direction::Short => tick.ask,
        }
    }

    /// +1 for Long, -1 for Short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Order request. Consumed once by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub direction: Direction,
    /// Integer lots.
    pub quantity: u64,
    pub stop_loss: f64,
    pub take_profit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Order {
    pub fn new(direction: Direction, quantity: u64, stop_loss: f64, take_profit: f64) -> Self {
        Self {
            direction,
            quantity,
            stop_loss,
            take_profit,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
