//! Strategy-facing broker contract.
//!
//! Strategies only ever see `&mut dyn Broker`. The backtesting variant adds
//! `run()`, which drives the tick loop to completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Candle, Order, Position, PositionId, Timeframe};
use crate::engine::state::RunSummary;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum BrokerError {
    #[error(
        "insufficient capital: cannot place order for {quantity} lots at {price:.5} \
         (margin {margin:.2}, capital {capital:.2})"
    )]
    InsufficientCapital {
        quantity: u64,
        price: f64,
        margin: f64,
        capital: f64,
    },
    #[error("order quantity must be positive")]
    ZeroQuantity,
    #[error("run has finished; no further orders are accepted")]
    RunFinished,
    #[error("invalid broker config: {0}")]
    InvalidConfig(String),
}

/// Broker settings shared by every run of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub lot_size: u32,
    pub leverage: f64,
    pub initial_capital: f64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            lot_size: 1,
            leverage: 30.0,
            initial_capital: 100_000.0,
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.lot_size == 0 {
            return Err(BrokerError::InvalidConfig("lot_size must be positive".into()));
        }
        if !(self.leverage.is_finite() && self.leverage > 0.0) {
            return Err(BrokerError::InvalidConfig(format!(
                "leverage must be positive, got {}",
                self.leverage
            )));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital >= 0.0) {
            return Err(BrokerError::InvalidConfig(format!(
                "initial_capital must be non-negative, got {}",
                self.initial_capital
            )));
        }
        Ok(())
    }
}

/// Stable handle returned by callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackHandle(pub usize);

/// Receives every completed candle of the timeframe it was registered for.
///
/// Invoked synchronously from inside the tick loop; `place_order` calls made
/// here complete before the loop moves on.
pub trait MarketDataCallback: Send {
    fn on_candle(&mut self, broker: &mut dyn Broker, candle: &Candle);
}

impl<F> MarketDataCallback for F
where
    F: FnMut(&mut dyn Broker, &Candle) + Send,
{
    fn on_candle(&mut self, broker: &mut dyn Broker, candle: &Candle) {
        self(broker, candle)
    }
}

pub trait Broker {
    fn lot_size(&self) -> u32;
    fn leverage(&self) -> f64;
    fn capital(&self) -> f64;
    /// Timestamp of the tick being processed.
    fn current_time(&self) -> DateTime<Utc>;

    fn register_market_data_callback(
        &mut self,
        timeframe: Timeframe,
        callback: Box<dyn MarketDataCallback>,
    ) -> CallbackHandle;

    fn place_order(&mut self, order: Order) -> Result<PositionId, BrokerError>;

    fn position(&self, id: PositionId) -> Option<&Position>;
}

pub trait BacktestBroker: Broker {
    /// Process every tick, then force-close whatever is still open.
    fn run(&mut self) -> RunSummary;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BrokerConfig::default();
        assert_eq!(config.lot_size, 1);
        assert_eq!(config.leverage, 30.0);
        assert_eq!(config.initial_capital, 100_000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_configs_rejected() {
        let bad = [
            BrokerConfig { lot_size: 0, ..Default::default() },
            BrokerConfig { leverage: 0.0, ..Default::default() },
            BrokerConfig { leverage: f64::NAN, ..Default::default() },
            BrokerConfig { initial_capital: -1.0, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(BrokerError::InvalidConfig(_))));
        }
    }

    #[test]
    fn insufficient_capital_message() {
        let err = BrokerError::InsufficientCapital {
            quantity: 10,
            price: 1.1,
            margin: 500.0,
            capital: 100.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("10 lots"));
        assert!(msg.contains("500.00"));
    }

    #[test]
    fn config_partial_json_uses_defaults() {
        let config: BrokerConfig = serde_json::from_str(r#"{"leverage": 50.0}"#).unwrap();
        assert_eq!(config.leverage, 50.0);
        assert_eq!(config.lot_size, 1);
    }
}
