//! Modular trader driven by the tick broker.
//!
//! Tests:
//! 1. Default strategy trades, one position at a time, with sane brackets
//! 2. Monthly metrics agree with the position history
//! 3. A filter that never passes places no orders
//! 4. Indicator strategies from JSON: EMA crossover inside a market session

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use ticklab_core::dataset::{default_max_gap, Dataset};
use ticklab_core::domain::{Direction, Month, Tick};
use ticklab_core::engine::{BacktestBroker, BrokerConfig, TickBroker};
use ticklab_core::metrics::compute_monthly;
use ticklab_core::trader::{ConditionConfig, StrategyConfig};

/// Helper: two hours of ticks every 10s, trending up and down in 10-minute legs.
fn zigzag() -> Arc<Dataset> {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
    let mut mid = 1.1000;
    let ticks: Vec<Tick> = (0..720)
        .map(|i| {
            let leg_up = (i / 60) % 2 == 0;
            mid += if leg_up { 0.00005 } else { -0.00005 };
            Tick::new(start + Duration::seconds(i * 10), mid - 0.00005, mid + 0.00005)
        })
        .collect();
    let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    Arc::new(Dataset::new("EURUSD", day, day, ticks, default_max_gap()).unwrap())
}

fn run(strategy: &StrategyConfig) -> TickBroker {
    let mut broker = TickBroker::new(zigzag(), BrokerConfig::default()).unwrap();
    strategy.install(&mut broker).unwrap();
    broker.run();
    broker
}

// ── 1. Default strategy ──────────────────────────────────────────────

#[test]
fn default_strategy_trades_one_position_at_a_time() {
    let broker = run(&StrategyConfig::default());
    let positions = broker.positions();
    assert!(!positions.is_empty());

    for pair in positions.windows(2) {
        let prev_close = pair[0].close_time.expect("settled");
        assert!(pair[1].open_time >= prev_close);
    }

    for p in positions {
        assert_eq!(p.reason.as_deref(), Some("candle-direction"));
        assert!(p.quantity > 0);
        match p.direction {
            Direction::Long => assert!(p.stop_loss < p.open_price && p.open_price < p.take_profit),
            Direction::Short => assert!(p.take_profit < p.open_price && p.open_price < p.stop_loss),
        }
        // History needs five candles first.
        assert!(p.open_time >= Utc.with_ymd_and_hms(2024, 3, 4, 8, 4, 50).unwrap());
    }
}

// ── 2. Metrics ───────────────────────────────────────────────────────

#[test]
fn monthly_metrics_match_positions() {
    let broker = run(&StrategyConfig::default());
    let monthly = compute_monthly(broker.positions());
    assert_eq!(monthly.len(), 1);

    let march = &monthly[&Month::new(2024, 3).unwrap()];
    let closed: Vec<_> = broker.positions().iter().filter(|p| p.is_closed()).collect();
    assert_eq!(march.total_trades, closed.len());
    assert_eq!(march.long_trades + march.short_trades, march.total_trades);

    let net: f64 = closed.iter().map(|p| p.pnl()).sum();
    assert!((march.net_pnl - net).abs() < 1e-6);
    let capital_change = broker.ledger().capital() - BrokerConfig::default().initial_capital;
    assert!((capital_change - net).abs() < 1e-6);
}

// ── 3. Filter ────────────────────────────────────────────────────────

#[test]
fn closed_filter_places_no_orders() {
    // 2024-03-04 is a Monday.
    let strategy = StrategyConfig {
        filter: Some(ConditionConfig::Weekdays {
            days: vec![Weekday::Tue],
            tz: Tz::UTC,
        }),
        ..StrategyConfig::default()
    };
    let mut broker = TickBroker::new(zigzag(), BrokerConfig::default()).unwrap();
    strategy.install(&mut broker).unwrap();
    let summary = broker.run();

    assert!(broker.positions().is_empty());
    assert_eq!(summary.counters.orders_placed, 0);
    assert_eq!(summary.counters.candles_dispatched, 120);
    assert_eq!(summary.final_capital, summary.initial_capital);
}

// ── 4. Indicator strategies ──────────────────────────────────────────

fn ema_cross(session: &str) -> StrategyConfig {
    let json = format!(
        r#"{{
            "name": "ema-cross",
            "history_size": 20,
            "filter": {{"type": "all", "conditions": [
                {{"type": "history_usable"}},
                {{"type": "no_open_positions"}},
                {{"type": "session", "session": "{session}"}},
                {{"type": "exclude_holidays", "calendar": "uk"}}
            ]}},
            "long_trigger": {{"type": "crossover",
                "reference": {{"type": "ema", "period": 8}},
                "test": {{"type": "ema", "period": 3}},
                "direction": "up"}},
            "short_trigger": {{"type": "crossover",
                "reference": {{"type": "ema", "period": 8}},
                "test": {{"type": "ema", "period": 3}},
                "direction": "down"}},
            "stop_loss": {{"type": "atr", "period": 5, "multiplier": 2.0}},
            "take_profit": {{"type": "ratio", "ratio": 1.5}},
            "capital": {{"type": "risk_percent", "percent": 1.0}}
        }}"#
    );
    StrategyConfig::from_json(&json).unwrap()
}

#[test]
fn ema_crossover_trades_inside_london_session() {
    // 08:00-10:00 UTC in March is 08:00-10:00 in London.
    let broker = run(&ema_cross("london"));
    let positions = broker.positions();
    assert!(!positions.is_empty());

    for p in positions {
        assert_eq!(p.reason.as_deref(), Some("ema-cross"));
        // Twenty candles of history first.
        assert!(p.open_time >= Utc.with_ymd_and_hms(2024, 3, 4, 8, 19, 50).unwrap());
        assert!(p.open_time.hour() < 10);
        match p.direction {
            Direction::Long => assert!(p.stop_loss < p.open_price && p.open_price < p.take_profit),
            Direction::Short => assert!(p.take_profit < p.open_price && p.open_price < p.stop_loss),
        }
    }
}

#[test]
fn new_york_session_filter_keeps_london_morning_flat() {
    // 08:00-10:00 UTC is 03:00-05:00 in New York.
    let broker = run(&ema_cross("new_york"));
    assert!(broker.positions().is_empty());
}
