//! Serializable strategy description.
//!
//! A `StrategyConfig` is the JSON form of a modular trader. Its canonical
//! serialization feeds the run key, so field order here is part of the cache
//! identity.

use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::{HolidayCalendar, Session};
use crate::engine::{Broker, CallbackHandle};
use crate::indicators::{Adx, Atr, Close, Constant, Ema, Indicator, Mean, Rsi};
use crate::trader::condition::{
    All, Any, CandleDirection, CandleKind, Condition, Cross, CrossOver, DistanceToPrevious,
    HistoryUsable, Hours, InSession, IndicatorRange, NoOpenPositions, NotHoliday, PriceThreshold,
    Relation, Threshold, Weekdays,
};
use crate::trader::modular::{SetupError, TraderBuilder};
use crate::trader::order_computer::{
    CapitalFixed, CapitalRiskPercent, OrderComputer, StopLossAtr, StopLossLookback,
    TakeProfitRatio,
};

fn utc() -> Tz {
    Tz::UTC
}

fn is_utc(tz: &Tz) -> bool {
    *tz == Tz::UTC
}

fn positive_period(what: &str, period: usize) -> Result<usize, SetupError> {
    if period == 0 {
        return Err(SetupError::InvalidParameter(format!("{what} period must be positive")));
    }
    Ok(period)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum IndicatorConfig {
    Close,
    Constant { value: f64 },
    Ema { period: usize },
    Rsi { period: usize },
    Atr { period: usize },
    Adx { period: usize },
    Mean {
        indicator: Box<IndicatorConfig>,
        period: usize,
    },
}

impl IndicatorConfig {
    pub fn build(&self) -> Result<Box<dyn Indicator>, SetupError> {
        Ok(match self {
            IndicatorConfig::Close => Box::new(Close),
            IndicatorConfig::Constant { value } => {
                if !value.is_finite() {
                    return Err(SetupError::InvalidParameter(format!(
                        "constant must be finite, got {value}"
                    )));
                }
                Box::new(Constant::new(*value))
            }
            IndicatorConfig::Ema { period } => Box::new(Ema::new(positive_period("EMA", *period)?)),
            IndicatorConfig::Rsi { period } => Box::new(Rsi::new(positive_period("RSI", *period)?)),
            IndicatorConfig::Atr { period } => Box::new(Atr::new(positive_period("ATR", *period)?)),
            IndicatorConfig::Adx { period } => Box::new(Adx::new(positive_period("ADX", *period)?)),
            IndicatorConfig::Mean { indicator, period } => {
                let period = positive_period("mean", *period)?;
                Box::new(Mean::new(indicator.build()?, period))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ConditionConfig {
    HistoryUsable,
    NoOpenPositions,
    Candle {
        #[serde(default)]
        lookback: usize,
        kind: CandleKind,
    },
    Weekdays {
        days: Vec<Weekday>,
        #[serde(default = "utc", skip_serializing_if = "is_utc")]
        tz: Tz,
    },
    Hours {
        start: u32,
        end: u32,
        #[serde(default = "utc", skip_serializing_if = "is_utc")]
        tz: Tz,
    },
    Session {
        session: Session,
    },
    ExcludeHolidays {
        calendar: HolidayCalendar,
    },
    Crossover {
        reference: IndicatorConfig,
        test: IndicatorConfig,
        direction: Cross,
    },
    Threshold {
        indicator: IndicatorConfig,
        level: f64,
        relation: Relation,
    },
    PriceThreshold {
        indicator: IndicatorConfig,
        relation: Relation,
    },
    IndicatorRange {
        indicator: IndicatorConfig,
        min: f64,
        max: f64,
    },
    DistanceToPrevious {
        indicator: IndicatorConfig,
        period: usize,
        relation: Relation,
    },
    All {
        conditions: Vec<ConditionConfig>,
    },
    Any {
        conditions: Vec<ConditionConfig>,
    },
}

impl ConditionConfig {
    pub fn build(&self) -> Result<Box<dyn Condition>, SetupError> {
        Ok(match self {
            ConditionConfig::HistoryUsable => Box::new(HistoryUsable),
            ConditionConfig::NoOpenPositions => Box::new(NoOpenPositions),
            ConditionConfig::Candle { lookback, kind } => Box::new(CandleDirection {
                lookback: *lookback,
                kind: *kind,
            }),
            ConditionConfig::Weekdays { days, tz } => Box::new(Weekdays {
                days: days.clone(),
                tz: *tz,
            }),
            ConditionConfig::Hours { start, end, tz } => {
                if *start >= *end || *end > 24 {
                    return Err(SetupError::InvalidParameter(format!(
                        "hours must satisfy start < end <= 24, got {start}..{end}"
                    )));
                }
                Box::new(Hours {
                    start: *start,
                    end: *end,
                    tz: *tz,
                })
            }
            ConditionConfig::Session { session } => Box::new(InSession(*session)),
            ConditionConfig::ExcludeHolidays { calendar } => Box::new(NotHoliday(*calendar)),
            ConditionConfig::Crossover {
                reference,
                test,
                direction,
            } => Box::new(CrossOver {
                reference: reference.build()?,
                test: test.build()?,
                direction: *direction,
            }),
            ConditionConfig::Threshold {
                indicator,
                level,
                relation,
            } => Box::new(Threshold {
                indicator: indicator.build()?,
                level: *level,
                relation: *relation,
            }),
            ConditionConfig::PriceThreshold {
                indicator,
                relation,
            } => Box::new(PriceThreshold {
                indicator: indicator.build()?,
                relation: *relation,
            }),
            ConditionConfig::IndicatorRange {
                indicator,
                min,
                max,
            } => {
                if min.is_nan() || max.is_nan() || min > max {
                    return Err(SetupError::InvalidParameter(format!(
                        "indicator range must satisfy min <= max, got {min}..{max}"
                    )));
                }
                Box::new(IndicatorRange {
                    indicator: indicator.build()?,
                    min: *min,
                    max: *max,
                })
            }
            ConditionConfig::DistanceToPrevious {
                indicator,
                period,
                relation,
            } => Box::new(DistanceToPrevious {
                indicator: indicator.build()?,
                period: positive_period("distance", *period)?,
                relation: *relation,
            }),
            ConditionConfig::All { conditions } => Box::new(All(
                conditions
                    .iter()
                    .map(ConditionConfig::build)
                    .collect::<Result<_, _>>()?,
            )),
            ConditionConfig::Any { conditions } => Box::new(Any(
                conditions
                    .iter()
                    .map(ConditionConfig::build)
                    .collect::<Result<_, _>>()?,
            )),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum StopLossConfig {
    Lookback { lookback: usize, pip_buffer: f64 },
    Atr { period: usize, multiplier: f64 },
}

impl StopLossConfig {
    pub fn build(&self) -> Result<Box<dyn OrderComputer>, SetupError> {
        match *self {
            StopLossConfig::Lookback {
                lookback,
                pip_buffer,
            } => {
                if lookback == 0 {
                    return Err(SetupError::InvalidParameter(
                        "stop loss lookback must be positive".into(),
                    ));
                }
                Ok(Box::new(StopLossLookback {
                    lookback,
                    pip_buffer,
                }))
            }
            StopLossConfig::Atr { period, multiplier } => {
                if !(multiplier.is_finite() && multiplier > 0.0) {
                    return Err(SetupError::InvalidParameter(format!(
                        "ATR multiplier must be positive, got {multiplier}"
                    )));
                }
                Ok(Box::new(StopLossAtr {
                    atr: Atr::new(positive_period("ATR", period)?),
                    multiplier,
                }))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TakeProfitConfig {
    Ratio { ratio: f64 },
}

impl TakeProfitConfig {
    pub fn build(&self) -> Result<Box<dyn OrderComputer>, SetupError> {
        match *self {
            TakeProfitConfig::Ratio { ratio } => {
                if !(ratio.is_finite() && ratio > 0.0) {
                    return Err(SetupError::InvalidParameter(format!(
                        "take profit ratio must be positive, got {ratio}"
                    )));
                }
                Ok(Box::new(TakeProfitRatio(ratio)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum CapitalConfig {
    Fixed { amount: f64 },
    RiskPercent { percent: f64 },
}

impl CapitalConfig {
    pub fn build(&self) -> Result<Box<dyn OrderComputer>, SetupError> {
        match *self {
            CapitalConfig::Fixed { amount } if amount > 0.0 => Ok(Box::new(CapitalFixed(amount))),
            CapitalConfig::RiskPercent { percent } if percent > 0.0 && percent <= 100.0 => {
                Ok(Box::new(CapitalRiskPercent(percent)))
            }
            ref other => Err(SetupError::InvalidParameter(format!(
                "capital allocation out of range: {other:?}"
            ))),
        }
    }
}

/// JSON description of a modular trader.
///
/// Every component is optional at parse time so that an incomplete
/// description surfaces as a `SetupError` from `builder()` rather than a
/// parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub name: String,
    pub history_size: usize,
    #[serde(default)]
    pub filter: Option<ConditionConfig>,
    #[serde(default)]
    pub long_trigger: Option<ConditionConfig>,
    #[serde(default)]
    pub short_trigger: Option<ConditionConfig>,
    #[serde(default)]
    pub stop_loss: Option<StopLossConfig>,
    #[serde(default)]
    pub take_profit: Option<TakeProfitConfig>,
    #[serde(default)]
    pub capital: Option<CapitalConfig>,
}

impl Default for StrategyConfig {
    /// Candle-direction strategy: follow the latest candle's direction when
    /// flat, stop behind the last three candles, 2R target, 1% risk.
    fn default() -> Self {
        Self {
            name: "candle-direction".into(),
            history_size: 5,
            filter: Some(ConditionConfig::All {
                conditions: vec![ConditionConfig::HistoryUsable, ConditionConfig::NoOpenPositions],
            }),
            long_trigger: Some(ConditionConfig::Candle {
                lookback: 0,
                kind: CandleKind::Bullish,
            }),
            short_trigger: Some(ConditionConfig::Candle {
                lookback: 0,
                kind: CandleKind::Bearish,
            }),
            stop_loss: Some(StopLossConfig::Lookback {
                lookback: 3,
                pip_buffer: 1.0,
            }),
            take_profit: Some(TakeProfitConfig::Ratio { ratio: 2.0 }),
            capital: Some(CapitalConfig::RiskPercent { percent: 1.0 }),
        }
    }
}

impl StrategyConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Compact serialization used for hashing.
    pub fn canonical_json(&self) -> String {
        // Plain data with string keys: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn builder(&self) -> Result<TraderBuilder, SetupError> {
        fn opt<T, U>(
            value: &Option<T>,
            build: impl Fn(&T) -> Result<U, SetupError>,
        ) -> Result<Option<U>, SetupError> {
            value.as_ref().map(build).transpose()
        }

        Ok(TraderBuilder::new()
            .name(self.name.clone())
            .history_size(self.history_size)
            .boxed_filter(opt(&self.filter, ConditionConfig::build)?)
            .boxed_triggers(
                opt(&self.long_trigger, ConditionConfig::build)?,
                opt(&self.short_trigger, ConditionConfig::build)?,
            )
            .boxed_computers(
                opt(&self.stop_loss, StopLossConfig::build)?,
                opt(&self.take_profit, TakeProfitConfig::build)?,
                opt(&self.capital, CapitalConfig::build)?,
            ))
    }

    /// Build the trader and register it on the broker.
    pub fn install(&self, broker: &mut dyn Broker) -> Result<CallbackHandle, SetupError> {
        self.builder()?.install(broker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builds() {
        let config = StrategyConfig::default();
        assert!(config.builder().unwrap().build().is_ok());
    }

    #[test]
    fn json_round_trip_is_stable() {
        let config = StrategyConfig::default();
        let json = config.canonical_json();
        let back = StrategyConfig::from_json(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.canonical_json(), json);
    }

    #[test]
    fn parses_hand_written_config() {
        let json = r#"{
            "name": "tuesday-longs",
            "history_size": 10,
            "filter": {"type": "all", "conditions": [
                {"type": "history_usable"},
                {"type": "weekdays", "days": ["Tue"]},
                {"type": "hours", "start": 8, "end": 16}
            ]},
            "long_trigger": {"type": "candle", "kind": "bullish"},
            "stop_loss": {"type": "lookback", "lookback": 5, "pip_buffer": 2.0},
            "take_profit": {"type": "ratio", "ratio": 1.5},
            "capital": {"type": "fixed", "amount": 250.0}
        }"#;
        let config = StrategyConfig::from_json(json).unwrap();
        assert_eq!(config.history_size, 10);
        assert!(config.short_trigger.is_none());
        assert!(config.builder().unwrap().build().is_ok());
    }

    #[test]
    fn unknown_condition_rejected_at_parse() {
        let json = r#"{"name": "x", "history_size": 1, "filter": {"type": "moon_phase"}}"#;
        assert!(StrategyConfig::from_json(json).is_err());
    }

    #[test]
    fn missing_parts_surface_as_setup_errors() {
        let mut config = StrategyConfig::default();
        config.filter = None;
        assert_eq!(config.builder().unwrap().build().unwrap_err(), SetupError::MissingFilter);

        let mut config = StrategyConfig::default();
        config.long_trigger = None;
        config.short_trigger = None;
        assert_eq!(config.builder().unwrap().build().unwrap_err(), SetupError::MissingTrigger);

        let mut config = StrategyConfig::default();
        config.capital = None;
        assert_eq!(
            config.builder().unwrap().build().unwrap_err(),
            SetupError::MissingCapitalAllocation
        );

        let mut config = StrategyConfig::default();
        config.history_size = 0;
        assert_eq!(
            config.builder().unwrap().build().unwrap_err(),
            SetupError::NonPositiveHistory
        );
    }

    #[test]
    fn out_of_range_parameters_rejected() {
        let mut config = StrategyConfig::default();
        config.take_profit = Some(TakeProfitConfig::Ratio { ratio: 0.0 });
        assert!(matches!(config.builder(), Err(SetupError::InvalidParameter(_))));

        let mut config = StrategyConfig::default();
        config.capital = Some(CapitalConfig::RiskPercent { percent: 150.0 });
        assert!(matches!(config.builder(), Err(SetupError::InvalidParameter(_))));

        let mut config = StrategyConfig::default();
        config.filter = Some(ConditionConfig::Hours { start: 10, end: 9, tz: Tz::UTC });
        assert!(matches!(config.builder(), Err(SetupError::InvalidParameter(_))));

        let mut config = StrategyConfig::default();
        config.long_trigger = Some(ConditionConfig::Threshold {
            indicator: IndicatorConfig::Mean {
                indicator: Box::new(IndicatorConfig::Rsi { period: 0 }),
                period: 3,
            },
            level: 70.0,
            relation: Relation::Above,
        });
        assert!(matches!(config.builder(), Err(SetupError::InvalidParameter(_))));

        let mut config = StrategyConfig::default();
        config.filter = Some(ConditionConfig::IndicatorRange {
            indicator: IndicatorConfig::Adx { period: 14 },
            min: 40.0,
            max: 20.0,
        });
        assert!(matches!(config.builder(), Err(SetupError::InvalidParameter(_))));

        let mut config = StrategyConfig::default();
        config.stop_loss = Some(StopLossConfig::Atr { period: 14, multiplier: 0.0 });
        assert!(matches!(config.builder(), Err(SetupError::InvalidParameter(_))));
    }

    #[test]
    fn parses_indicator_strategy() {
        let json = r#"{
            "name": "ema-cross-london",
            "history_size": 60,
            "filter": {"type": "all", "conditions": [
                {"type": "history_usable"},
                {"type": "no_open_positions"},
                {"type": "session", "session": "london"},
                {"type": "exclude_holidays", "calendar": "uk"},
                {"type": "hours", "start": 8, "end": 16, "tz": "Europe/London"},
                {"type": "indicator_range", "indicator": {"type": "adx", "period": 14}, "min": 20.0, "max": 100.0}
            ]},
            "long_trigger": {"type": "crossover",
                "reference": {"type": "ema", "period": 21},
                "test": {"type": "ema", "period": 8},
                "direction": "up"},
            "short_trigger": {"type": "any", "conditions": [
                {"type": "threshold", "indicator": {"type": "rsi", "period": 14}, "level": 70.0, "relation": "above"},
                {"type": "price_threshold", "indicator": {"type": "mean", "indicator": {"type": "close"}, "period": 20}, "relation": "below"},
                {"type": "distance_to_previous", "indicator": {"type": "constant", "value": 1.1}, "period": 5, "relation": "above"}
            ]},
            "stop_loss": {"type": "atr", "period": 14, "multiplier": 1.5},
            "take_profit": {"type": "ratio", "ratio": 2.0},
            "capital": {"type": "risk_percent", "percent": 1.0}
        }"#;
        let config = StrategyConfig::from_json(json).unwrap();
        assert!(config.builder().unwrap().build().is_ok());
        let Some(ConditionConfig::All { conditions }) = &config.filter else {
            panic!("filter should be a conjunction");
        };
        assert!(conditions.contains(&ConditionConfig::Hours {
            start: 8,
            end: 16,
            tz: chrono_tz::Europe::London,
        }));

        let back = StrategyConfig::from_json(&config.canonical_json()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn utc_default_keeps_canonical_form() {
        let json = r#"{"type": "weekdays", "days": ["Mon"]}"#;
        let condition: ConditionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            condition,
            ConditionConfig::Weekdays { days: vec![Weekday::Mon], tz: Tz::UTC }
        );
        assert_eq!(serde_json::to_string(&condition).unwrap(), r#"{"type":"weekdays","days":["Mon"]}"#);

        let unknown_tz = r#"{"type": "hours", "start": 8, "end": 9, "tz": "Mars/Olympus"}"#;
        assert!(serde_json::from_str::<ConditionConfig>(unknown_tz).is_err());
    }
}
