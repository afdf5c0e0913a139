//! Strategy layer built purely on the `Broker` trait.
//!
//! A modular trader is assembled from a filter, long/short triggers and three
//! order computers (stop-loss, take-profit, capital allocation), either in
//! code through `TraderBuilder` or from JSON through `StrategyConfig`.
//! Conditions read candle history, indicator series (memoized per candle in
//! `IndicatorCache`) and the simulated clock in a market's local time.

pub mod cache;
pub mod condition;
pub mod config;
pub mod context;
pub mod history;
pub mod modular;
pub mod order_computer;

pub use cache::IndicatorCache;
pub use condition::{
    All, Any, CandleDirection, CandleKind, Condition, Cross, CrossOver, DistanceToPrevious,
    HistoryUsable, Hours, InSession, IndicatorRange, NoOpenPositions, NotHoliday, PriceThreshold,
    Relation, Threshold, Weekdays,
};
pub use config::{
    CapitalConfig, ConditionConfig, IndicatorConfig, StopLossConfig, StrategyConfig,
    TakeProfitConfig,
};
pub use context::TraderContext;
pub use history::History;
pub use modular::{ModularTrader, SetupError, TraderBuilder, TraderStats};
pub use order_computer::{
    CapitalFixed, CapitalRiskPercent, OrderComputer, OrderDraft, OrderError, StopLossAtr,
    StopLossLookback, TakeProfitRatio, PIP_SIZE,
};
