//! Criterion benchmarks for TickLab hot paths.
//!
//! Benchmarks:
//! 1. Tick loop (full run with the default modular trader)
//! 2. Candle aggregation (per timeframe)
//! 3. Monthly metrics over a large position history

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ticklab_core::dataset::{default_max_gap, Dataset};
use ticklab_core::domain::{CloseReason, Direction, Order, Position, PositionId, Tick, Timeframe};
use ticklab_core::engine::{aggregate, BacktestBroker, BrokerConfig, TickBroker};
use ticklab_core::metrics::compute_monthly;
use ticklab_core::trader::StrategyConfig;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_ticks(n: usize) -> Vec<Tick> {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let mid = 1.1 + (i as f64 * 0.001).sin() * 0.01;
            Tick::new(start + Duration::seconds(i as i64 * 5), mid - 0.00005, mid + 0.00005)
        })
        .collect()
}

fn make_dataset(n: usize) -> Arc<Dataset> {
    let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    Arc::new(Dataset::new("EURUSD", day, day, make_ticks(n), default_max_gap()).unwrap())
}

fn make_positions(n: usize) -> Vec<Position> {
    let ticks = make_ticks(n * 2 + 1);
    (0..n)
        .map(|i| {
            let direction = if i % 2 == 0 { Direction::Long } else { Direction::Short };
            let order = Order::new(direction, 10_000, 0.0, 10.0);
            let mut p = Position::open(PositionId(i), &order, &ticks[i * 2], 30.0, 100_000.0);
            // Positions are settled through the ledger; fake a close here.
            p.close_price = Some(direction.exit_price(&ticks[i * 2 + 1]));
            p.close_time = Some(ticks[i * 2 + 1].timestamp);
            p.status = ticklab_core::domain::PositionStatus::Closed(CloseReason::TakeProfit);
            p
        })
        .collect()
}

// ── 1. Tick Loop ─────────────────────────────────────────────────────

fn bench_tick_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_loop");
    group.sample_size(20);

    for &tick_count in &[10_000, 100_000] {
        let dataset = make_dataset(tick_count);
        let strategy = StrategyConfig::default();

        group.bench_with_input(
            BenchmarkId::new("default_strategy", tick_count),
            &tick_count,
            |b, _| {
                b.iter(|| {
                    let mut broker =
                        TickBroker::new(Arc::clone(&dataset), BrokerConfig::default()).unwrap();
                    strategy.install(&mut broker).unwrap();
                    black_box(broker.run())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("no_callbacks", tick_count),
            &tick_count,
            |b, _| {
                b.iter(|| {
                    let mut broker =
                        TickBroker::new(Arc::clone(&dataset), BrokerConfig::default()).unwrap();
                    black_box(broker.run())
                });
            },
        );
    }

    group.finish();
}

// ── 2. Candle Aggregation ────────────────────────────────────────────

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let dataset = make_dataset(100_000);

    for tf in [Timeframe::ONE_MINUTE, Timeframe::ONE_HOUR] {
        group.bench_with_input(BenchmarkId::from_parameter(tf), &tf, |b, &tf| {
            b.iter(|| aggregate(black_box(dataset.ticks()), tf));
        });
    }

    group.finish();
}

// ── 3. Monthly Metrics ───────────────────────────────────────────────

fn bench_metrics(c: &mut Criterion) {
    let positions = make_positions(10_000);
    c.bench_function("compute_monthly_10k", |b| {
        b.iter(|| compute_monthly(black_box(&positions)));
    });
}

criterion_group!(benches, bench_tick_loop, bench_aggregate, bench_metrics);
criterion_main!(benches);
