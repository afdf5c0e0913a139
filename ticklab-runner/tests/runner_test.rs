//! Integration tests for the runner: loading, running, caching, batching.
//!
//! Data comes from synthetic months or small histdata CSV files written into
//! a temporary data directory.

use std::fs;
use std::path::Path;

use ticklab_core::domain::Month;
use ticklab_core::trader::StrategyConfig;
use ticklab_runner::data_loader::month_file;
use ticklab_runner::{RunConfig, RunError, Runner, RunnerConfig, TickSource};

/// Helper: runner over temporary data and cache directories.
fn make_runner(root: &Path, synthetic: bool) -> Runner {
    let config = RunnerConfig {
        data_dir: root.join("data"),
        cache_dir: root.join("runs"),
        workers: 2,
        synthetic,
        ..RunnerConfig::default()
    };
    fs::create_dir_all(&config.data_dir).unwrap();
    Runner::new(config).unwrap()
}

fn feb() -> Month {
    Month::new(2024, 2).unwrap()
}

/// Helper: a 2-hour histdata file with 10-minute trend legs, starting at
/// `start_hour` (EST) on `day` and stored under `month`.
fn write_csv_month(data_dir: &Path, month: Month, day: &str, start_hour: u32) {
    let mut rows = String::new();
    let mut mid = 1.08_f64;
    for i in 0..720u32 {
        mid += if (i / 60) % 2 == 0 { 0.00005 } else { -0.00005 };
        let secs = i * 10;
        rows.push_str(&format!(
            "{day} {:02}{:02}{:02}000,{:.5},{:.5},0\n",
            start_hour + secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            mid - 0.00005,
            mid + 0.00005,
        ));
    }
    fs::write(month_file(data_dir, "EURUSD", month, "csv"), rows).unwrap();
}

// ── 1. Single run ────────────────────────────────────────────────────

#[test]
fn synthetic_run_persists_and_is_served_from_cache() {
    let root = tempfile::tempdir().unwrap();
    let runner = make_runner(root.path(), true);
    let run = RunConfig::new("EURUSD", feb(), StrategyConfig::default());

    let first = runner.run(&run).unwrap();
    assert!(first.computed);
    let record = &first.record;
    assert_eq!(record.key, run.run_key());
    assert_eq!(record.instrument, "EURUSD");
    assert_eq!(record.period, feb());
    assert_eq!(record.source, TickSource::Synthetic);
    assert_eq!(record.metrics.total_trades, record.summary.positions_closed);
    assert!(root.path().join("runs").join(format!("{}.json", run.run_key())).exists());

    let second = runner.run(&run).unwrap();
    assert!(!second.computed);
    assert_eq!(*second.record, *first.record);

    // A new runner over the same cache directory never touches data.
    let reopened = make_runner(root.path(), false);
    let third = reopened.run(&run).unwrap();
    assert!(!third.computed);
    assert_eq!(third.record.key, first.record.key);
    assert_eq!(third.record.metrics.total_trades, first.record.metrics.total_trades);
    assert!((third.record.metrics.net_pnl - first.record.metrics.net_pnl).abs() < 1e-6);
    assert!(reopened.datasets().is_empty());
}

#[test]
fn csv_month_runs_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let runner = make_runner(root.path(), false);
    let march = Month::new(2024, 3).unwrap();
    write_csv_month(&root.path().join("data"), march, "20240305", 8);

    let run = RunConfig::new("EURUSD", march, StrategyConfig::default());
    let outcome = runner.run(&run).unwrap();
    let record = &outcome.record;

    assert_eq!(record.source, TickSource::Csv);
    assert_eq!(record.summary.counters.ticks_processed, 720);
    assert_eq!(record.summary.counters.gap_ticks, 0);
    assert!(record.metrics.total_trades > 0);
    assert_eq!(
        record.metrics.long_trades + record.metrics.short_trades,
        record.metrics.total_trades
    );
    let net = record.summary.final_capital - record.summary.initial_capital;
    assert!((record.metrics.net_pnl - net).abs() < 1e-6);
}

#[test]
fn month_end_evening_trades_count_toward_the_file_month() {
    // 20:00-22:00 EST on Jan 31 is already Feb 1 in UTC.
    let root = tempfile::tempdir().unwrap();
    let runner = make_runner(root.path(), false);
    let january = Month::new(2024, 1).unwrap();
    write_csv_month(&root.path().join("data"), january, "20240131", 20);

    let run = RunConfig::new("EURUSD", january, StrategyConfig::default());
    let outcome = runner.run(&run).unwrap();
    let record = &outcome.record;

    assert_eq!(record.period, january);
    assert_eq!(record.summary.counters.ticks_processed, 720);
    assert!(record.metrics.total_trades > 0);
    assert_eq!(record.metrics.total_trades, record.summary.positions_closed);
    assert!(runner.results().contains(&run.run_key()));

    let again = runner.run(&run).unwrap();
    assert!(!again.computed);
}

// ── 2. Errors ────────────────────────────────────────────────────────

#[test]
fn setup_errors_surface_before_loading() {
    let root = tempfile::tempdir().unwrap();
    let runner = make_runner(root.path(), false);
    let mut strategy = StrategyConfig::default();
    strategy.stop_loss = None;

    let err = runner
        .run(&RunConfig::new("EURUSD", feb(), strategy))
        .unwrap_err();
    assert!(matches!(err, RunError::Setup(_)), "got {err:?}");
    assert!(runner.results().is_empty().unwrap());
}

#[test]
fn missing_data_is_reported_and_not_cached() {
    let root = tempfile::tempdir().unwrap();
    let runner = make_runner(root.path(), false);
    let run = RunConfig::new("EURUSD", feb(), StrategyConfig::default());

    assert!(matches!(runner.run(&run), Err(RunError::Data(_))));
    assert!(!runner.results().contains(&run.run_key()));
}

// ── 3. Batch ─────────────────────────────────────────────────────────

#[test]
fn batch_keeps_order_and_deduplicates() {
    let root = tempfile::tempdir().unwrap();
    let runner = make_runner(root.path(), true);
    let jan = Month::new(2024, 1).unwrap();
    let runs = vec![
        RunConfig::new("EURUSD", jan, StrategyConfig::default()),
        RunConfig::new("EURUSD", feb(), StrategyConfig::default()),
        RunConfig::new("EURUSD", jan, StrategyConfig::default()),
    ];

    let outcomes: Vec<_> = runner
        .run_batch(&runs)
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(outcomes.len(), 3);
    for (run, outcome) in runs.iter().zip(&outcomes) {
        assert_eq!(outcome.record.period, run.month);
    }
    assert_eq!(outcomes.iter().filter(|o| o.computed).count(), 2);
    assert_eq!(outcomes[0].record, outcomes[2].record);
    assert_eq!(runner.datasets().len(), 2);
    assert_eq!(runner.results().len().unwrap(), 2);
}
