//! Modular trader: filter + long/short triggers + order computers.
//!
//! On every completed 1-minute candle:
//! 1. Push the candle into history, drop last candle's indicator values,
//!    forget positions that are no longer open
//! 2. Evaluate the filter; stop if false
//! 3. Evaluate both triggers; ignore the candle if both fire
//! 4. Stop-loss, take-profit, sizing, then `place_order`
//!
//! Errors in step 4 abandon the order for this candle only.

use tracing::{debug, warn};

use crate::domain::{Candle, Direction, PositionId, Timeframe};
use crate::engine::{Broker, CallbackHandle, MarketDataCallback};
use crate::trader::condition::Condition;
use crate::trader::order_computer::{OrderComputer, OrderDraft, OrderError};
use crate::trader::{History, IndicatorCache, TraderContext};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("history size must be greater than 0")]
    NonPositiveHistory,
    #[error("filter must be set")]
    MissingFilter,
    #[error("either long or short trigger must be set")]
    MissingTrigger,
    #[error("stop loss computer must be set")]
    MissingStopLoss,
    #[error("take profit computer must be set")]
    MissingTakeProfit,
    #[error("capital allocator must be set")]
    MissingCapitalAllocation,
    #[error("invalid strategy parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug, Default)]
pub struct TraderBuilder {
    name: Option<String>,
    history_size: usize,
    filter: Option<Box<dyn Condition>>,
    long_trigger: Option<Box<dyn Condition>>,
    short_trigger: Option<Box<dyn Condition>>,
    stop_loss: Option<Box<dyn OrderComputer>>,
    take_profit: Option<Box<dyn OrderComputer>>,
    capital: Option<Box<dyn OrderComputer>>,
}

impl TraderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    pub fn filter(mut self, condition: impl Condition + 'static) -> Self {
        self.filter = Some(Box::new(condition));
        self
    }

    pub fn long_trigger(mut self, condition: impl Condition + 'static) -> Self {
        self.long_trigger = Some(Box::new(condition));
        self
    }

    pub fn short_trigger(mut self, condition: impl Condition + 'static) -> Self {
        self.short_trigger = Some(Box::new(condition));
        self
    }

    pub fn stop_loss(mut self, computer: impl OrderComputer + 'static) -> Self {
        self.stop_loss = Some(Box::new(computer));
        self
    }

    pub fn take_profit(mut self, computer: impl OrderComputer + 'static) -> Self {
        self.take_profit = Some(Box::new(computer));
        self
    }

    pub fn capital_allocation(mut self, computer: impl OrderComputer + 'static) -> Self {
        self.capital = Some(Box::new(computer));
        self
    }

    pub(crate) fn boxed_filter(mut self, condition: Option<Box<dyn Condition>>) -> Self {
        self.filter = condition;
        self
    }

    pub(crate) fn boxed_triggers(
        mut self,
        long: Option<Box<dyn Condition>>,
        short: Option<Box<dyn Condition>>,
    ) -> Self {
        self.long_trigger = long;
        self.short_trigger = short;
        self
    }

    pub(crate) fn boxed_computers(
        mut self,
        stop_loss: Option<Box<dyn OrderComputer>>,
        take_profit: Option<Box<dyn OrderComputer>>,
        capital: Option<Box<dyn OrderComputer>>,
    ) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self.capital = capital;
        self
    }

    /// Validate the wiring. Nothing is registered with a broker yet.
    pub fn build(self) -> Result<ModularTrader, SetupError> {
        if self.history_size == 0 {
            return Err(SetupError::NonPositiveHistory);
        }
        let filter = self.filter.ok_or(SetupError::MissingFilter)?;
        if self.long_trigger.is_none() && self.short_trigger.is_none() {
            return Err(SetupError::MissingTrigger);
        }
        let stop_loss = self.stop_loss.ok_or(SetupError::MissingStopLoss)?;
        let take_profit = self.take_profit.ok_or(SetupError::MissingTakeProfit)?;
        let capital = self.capital.ok_or(SetupError::MissingCapitalAllocation)?;

        Ok(ModularTrader {
            name: self.name.unwrap_or_else(|| "modular".to_string()),
            history: History::new(self.history_size),
            indicators: IndicatorCache::new(),
            open_positions: Vec::new(),
            filter,
            long_trigger: self.long_trigger,
            short_trigger: self.short_trigger,
            stop_loss,
            take_profit,
            capital,
            stats: TraderStats::default(),
        })
    }

    /// Build and register on the broker's 1-minute feed.
    pub fn install(self, broker: &mut dyn Broker) -> Result<CallbackHandle, SetupError> {
        let trader = self.build()?;
        Ok(trader.install(broker))
    }
}

/// Per-trader decision counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraderStats {
    pub candles_seen: usize,
    pub filtered_out: usize,
    pub conflicting_triggers: usize,
    pub orders_attempted: usize,
    pub orders_placed: usize,
}

#[derive(Debug)]
pub struct ModularTrader {
    name: String,
    history: History,
    indicators: IndicatorCache,
    open_positions: Vec<PositionId>,
    filter: Box<dyn Condition>,
    long_trigger: Option<Box<dyn Condition>>,
    short_trigger: Option<Box<dyn Condition>>,
    stop_loss: Box<dyn OrderComputer>,
    take_profit: Box<dyn OrderComputer>,
    capital: Box<dyn OrderComputer>,
    stats: TraderStats,
}

impl ModularTrader {
    pub const TIMEFRAME: Timeframe = Timeframe::ONE_MINUTE;

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn stats(&self) -> TraderStats {
        self.stats
    }

    pub fn install(self, broker: &mut dyn Broker) -> CallbackHandle {
        debug!(trader = %self.name, history = self.history.capacity(), "trader installed");
        broker.register_market_data_callback(Self::TIMEFRAME, Box::new(self))
    }

    fn context<'a>(&'a self, broker: &'a dyn Broker) -> TraderContext<'a> {
        TraderContext {
            broker,
            history: &self.history,
            indicators: &self.indicators,
            open_positions: self.open_positions.len(),
        }
    }

    fn triggered(&self, ctx: &TraderContext<'_>, trigger: &Option<Box<dyn Condition>>) -> bool {
        trigger.as_ref().is_some_and(|c| c.evaluate(ctx))
    }

    fn compute_order(
        &self,
        ctx: &TraderContext<'_>,
        direction: Direction,
    ) -> Result<crate::domain::Order, OrderError> {
        let mut draft = OrderDraft::new(direction);
        self.stop_loss.compute(ctx, &mut draft)?;
        self.take_profit.compute(ctx, &mut draft)?;
        self.capital.compute(ctx, &mut draft)?;
        Ok(draft.into_order()?.with_reason(self.name.clone()))
    }

    fn take_position(&mut self, broker: &mut dyn Broker, direction: Direction) {
        self.stats.orders_attempted += 1;
        let order = {
            let ctx = self.context(&*broker);
            self.compute_order(&ctx, direction)
        };
        let order = match order {
            Ok(order) => order,
            Err(err) => {
                debug!(error = %err, %direction, "order abandoned");
                return;
            }
        };

        if let Ok(id) = broker.place_order(order) {
            self.stats.orders_placed += 1;
            self.open_positions.push(id);
        }
    }
}

impl MarketDataCallback for ModularTrader {
    fn on_candle(&mut self, broker: &mut dyn Broker, candle: &Candle) {
        self.history.push(*candle);
        self.indicators.clear();
        self.stats.candles_seen += 1;
        self.open_positions
            .retain(|&id| broker.position(id).is_some_and(|p| p.is_open()));

        let decision = {
            let ctx = self.context(&*broker);
            self.filter.evaluate(&ctx).then(|| {
                (
                    self.triggered(&ctx, &self.long_trigger),
                    self.triggered(&ctx, &self.short_trigger),
                )
            })
        };
        let Some((take_long, take_short)) = decision else {
            self.stats.filtered_out += 1;
            return;
        };

        match (take_long, take_short) {
            (true, true) => {
                self.stats.conflicting_triggers += 1;
                warn!(at = %candle.start, "both long and short triggers fired, ignoring candle");
            }
            (true, false) => self.take_position(broker, Direction::Long),
            (false, true) => self.take_position(broker, Direction::Short),
            (false, false) => {}
        }
    }
}
