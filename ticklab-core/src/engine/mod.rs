//! Backtesting engine: tick loop and supporting infrastructure.
//!
//! The engine consumes a gap-flagged tick dataset and runs the per-tick loop:
//!
//! 1. Gap handling: cancel open positions
//! 2. Close triggers: stop-loss, then take-profit, at the exit side
//! 3. Candle completion and strategy callbacks
//!
//! then force-closes whatever is left on the final tick.

pub mod aggregator;
pub mod backtest;
pub mod broker;
pub mod ledger;
pub mod state;

pub use aggregator::{aggregate, candle_closing_at};
pub use backtest::TickBroker;
pub use broker::{
    BacktestBroker, Broker, BrokerConfig, BrokerError, CallbackHandle, MarketDataCallback,
};
pub use ledger::PositionLedger;
pub use state::{RunCounters, RunSummary};
