//! Position ledger: the arena of every position a run has opened.
//!
//! Positions are never removed from the arena, so a `PositionId` stays valid
//! for the life of the ledger. A separate ordered set tracks which handles are
//! still open. Settling positions during a scan is two-phase: collect the
//! handles first, then settle and drop them from the open set.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{CloseReason, Order, Position, PositionId, Tick};
use crate::engine::broker::BrokerError;

#[derive(Debug, Clone)]
pub struct PositionLedger {
    positions: Vec<Position>,
    open: BTreeSet<PositionId>,
    capital: f64,
    leverage: f64,
}

impl PositionLedger {
    pub fn new(initial_capital: f64, leverage: f64) -> Self {
        Self {
            positions: Vec::new(),
            open: BTreeSet::new(),
            capital: initial_capital,
            leverage,
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(id.0)
    }

    /// Full history, in opening order.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn open_ids(&self) -> impl Iterator<Item = PositionId> + '_ {
        self.open.iter().copied()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Margin currently reserved by open positions.
    pub fn reserved_margin(&self) -> f64 {
        self.open.iter().map(|id| self.positions[id.0].margin).sum()
    }

    /// Open a position at the tick's entry price. Atomic: on error nothing
    /// is mutated.
    pub fn open(&mut self, order: &Order, tick: &Tick) -> Result<PositionId, BrokerError> {
        if order.quantity == 0 {
            return Err(BrokerError::ZeroQuantity);
        }

        let id = PositionId(self.positions.len());
        let position = Position::open(id, order, tick, self.leverage, self.capital);

        if position.margin > self.capital {
            return Err(BrokerError::InsufficientCapital {
                quantity: order.quantity,
                price: position.open_price,
                margin: position.margin,
                capital: self.capital,
            });
        }

        self.capital -= position.margin;
        debug!(
            id = id.0,
            direction = %position.direction,
            quantity = position.quantity,
            price = position.open_price,
            stop_loss = position.stop_loss,
            take_profit = position.take_profit,
            margin = position.margin,
            "position opened"
        );
        self.positions.push(position);
        self.open.insert(id);
        Ok(id)
    }

    /// Close every open position whose trigger fires on this tick.
    ///
    /// Each position is evaluated once; the reason found is the one recorded.
    pub fn close_triggered(&mut self, tick: &Tick) -> Vec<(PositionId, CloseReason)> {
        let triggered: Vec<(PositionId, CloseReason)> = self
            .open
            .iter()
            .filter_map(|&id| self.positions[id.0].check_trigger(tick).map(|r| (id, r)))
            .collect();

        for &(id, reason) in &triggered {
            self.settle_close(id, tick, reason);
        }
        triggered
    }

    /// Close every open position at the tick's exit price.
    pub fn close_all(&mut self, tick: &Tick, reason: CloseReason) -> Vec<PositionId> {
        let ids: Vec<PositionId> = self.open.iter().copied().collect();
        for &id in &ids {
            self.settle_close(id, tick, reason);
        }
        ids
    }

    /// Cancel every open position: margin back, no PnL.
    pub fn cancel_all(&mut self, at: DateTime<Utc>) -> Vec<PositionId> {
        let ids: Vec<PositionId> = self.open.iter().copied().collect();
        for &id in &ids {
            let pos = &mut self.positions[id.0];
            if pos.cancel(at) {
                self.capital += pos.margin;
                debug!(
                    id = id.0,
                    direction = %pos.direction,
                    quantity = pos.quantity,
                    open_price = pos.open_price,
                    "position canceled"
                );
            }
            self.open.remove(&id);
        }
        ids
    }

    fn settle_close(&mut self, id: PositionId, tick: &Tick, reason: CloseReason) {
        let pos = &mut self.positions[id.0];
        if pos.close(tick, reason) {
            self.capital += pos.margin + pos.pnl();
            debug!(
                id = id.0,
                %reason,
                direction = %pos.direction,
                quantity = pos.quantity,
                open_price = pos.open_price,
                close_price = pos.close_price.unwrap_or_default(),
                pnl = pos.pnl(),
                "position closed"
            );
        }
        self.open.remove(&id);
    }

    pub fn into_positions(self) -> Vec<Position> {
        self.positions
    }
}
