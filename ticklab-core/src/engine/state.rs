//! Run counters and the summary returned by `BacktestBroker::run`.

use serde::{Deserialize, Serialize};

/// Counters accumulated during the tick loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCounters {
    pub ticks_processed: usize,
    pub gap_ticks: usize,
    pub candles_dispatched: usize,
    pub orders_placed: usize,
    pub orders_rejected: usize,
}

/// Result of a complete tick run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub symbol: String,
    pub counters: RunCounters,
    pub positions_closed: usize,
    pub positions_canceled: usize,
    pub initial_capital: f64,
    pub final_capital: f64,
}

impl RunSummary {
    pub fn net_pnl(&self) -> f64 {
        self.final_capital - self.initial_capital
    }

    /// Net PnL as a percentage of initial capital. Zero when there was no capital.
    pub fn return_pct(&self) -> f64 {
        if self.initial_capital > 0.0 {
            self.net_pnl() / self.initial_capital * 100.0
        } else {
            0.0
        }
    }
}
