//! TickLab Core: tick-driven backtest engine, domain types, metrics, modular trader.
//!
//! This crate contains the heart of the simulator:
//! - Domain types (ticks, candles, timeframes, orders, positions, months)
//! - Gap-flagged tick datasets
//! - Candle aggregator and position ledger
//! - `Broker` trait and the tick-driven `TickBroker`
//! - Monthly performance metrics
//! - Candle indicators, market sessions and holiday calendars
//! - Modular trader (filter + triggers + order computers)

pub mod calendar;
pub mod dataset;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod metrics;
pub mod trader;

pub use dataset::{Dataset, DatasetError};
pub use engine::{BacktestBroker, Broker, BrokerConfig, BrokerError, TickBroker};
pub use metrics::{compute_monthly, compute_period, MonthlyMetrics};
