//! TickLab CLI: single and batch backtest commands.
//!
//! Commands:
//! - `run`: one strategy over one instrument-month, printing the monthly summary
//! - `batch`: the same strategy over a range of months on the worker pool

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ticklab_core::domain::Month;
use ticklab_core::trader::StrategyConfig;
use ticklab_runner::{RunConfig, RunOutcome, RunRecord, Runner, RunnerConfig};

#[derive(Parser)]
#[command(name = "ticklab", about = "TickLab CLI: tick-driven FX backtesting")]
struct Cli {
    /// Log level, used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a strategy over one month.
    Run {
        /// Runner TOML config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instrument, e.g. EURUSD.
        #[arg(long)]
        symbol: String,

        /// Month as YYYY-MM.
        #[arg(long)]
        month: Month,

        /// Strategy JSON file. Defaults to the candle-direction strategy.
        #[arg(long)]
        strategy: Option<PathBuf>,

        /// Generate synthetic ticks when the month has no data file.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Print the full run record as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run a strategy over every month in a range, in parallel.
    Batch {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        symbol: String,

        /// First month (YYYY-MM), inclusive.
        #[arg(long)]
        from: Month,

        /// Last month (YYYY-MM), inclusive.
        #[arg(long)]
        to: Month,

        #[arg(long)]
        strategy: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            config,
            symbol,
            month,
            strategy,
            synthetic,
            json,
        } => run_cmd(config.as_deref(), symbol, month, strategy.as_deref(), synthetic, json),
        Commands::Batch {
            config,
            symbol,
            from,
            to,
            strategy,
            synthetic,
        } => batch_cmd(config.as_deref(), symbol, from, to, strategy.as_deref(), synthetic),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn load_runner(config: Option<&Path>, synthetic: bool) -> Result<Runner> {
    let mut runner_config = match config {
        Some(path) => RunnerConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => RunnerConfig::default(),
    };
    runner_config.synthetic |= synthetic;
    Runner::new(runner_config).context("failed to start runner")
}

fn load_strategy(path: Option<&Path>) -> Result<StrategyConfig> {
    let Some(path) = path else {
        return Ok(StrategyConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read strategy '{}'", path.display()))?;
    StrategyConfig::from_json(&json)
        .with_context(|| format!("failed to parse strategy '{}'", path.display()))
}

fn run_cmd(
    config: Option<&Path>,
    symbol: String,
    month: Month,
    strategy: Option<&Path>,
    synthetic: bool,
    json: bool,
) -> Result<()> {
    let runner = load_runner(config, synthetic)?;
    let run = RunConfig::new(symbol, month, load_strategy(strategy)?);

    let outcome = runner
        .run(&run)
        .with_context(|| format!("run failed for {} {}", run.instrument, run.month))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*outcome.record)?);
    } else {
        print_summary(&outcome);
    }
    Ok(())
}

fn batch_cmd(
    config: Option<&Path>,
    symbol: String,
    from: Month,
    to: Month,
    strategy: Option<&Path>,
    synthetic: bool,
) -> Result<()> {
    if from > to {
        bail!("--from {from} is after --to {to}");
    }
    let runner = load_runner(config, synthetic)?;
    let strategy = load_strategy(strategy)?;

    let runs: Vec<RunConfig> = Month::range(from, to)
        .into_iter()
        .map(|month| RunConfig::new(symbol.clone(), month, strategy.clone()))
        .collect();
    info!(symbol = %symbol, runs = runs.len(), workers = runner.config().workers, "batch started");

    let mut failures = 0;
    for (run, result) in runs.iter().zip(runner.run_batch(&runs)) {
        match result {
            Ok(outcome) => println!("{}", summary_line(&outcome.record)),
            Err(err) => {
                failures += 1;
                eprintln!("{} {}: {err}", run.instrument, run.month);
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} runs failed", runs.len());
    }
    Ok(())
}

fn summary_line(record: &RunRecord) -> String {
    let m = &record.metrics;
    format!(
        "{} {}  trades {:>4}  win {:>5.1}%  pnl {:>10.2}  pf {:>5.2}  dd {:>5.2}%  EV {:>5.2}R",
        record.instrument,
        record.period,
        m.total_trades,
        m.win_rate,
        m.net_pnl,
        m.profit_factor,
        m.max_drawdown_pct,
        m.expected_value_r,
    )
}

fn print_summary(outcome: &RunOutcome) {
    let record = &outcome.record;
    let m = &record.metrics;
    let s = &record.summary;

    println!();
    println!("=== Run Result ===");
    println!("Instrument:     {}", record.instrument);
    println!("Period:         {}", record.period);
    println!("Data:           {}", record.source);
    println!("Ticks:          {} ({} gap)", s.counters.ticks_processed, s.counters.gap_ticks);
    println!("Key:            {}", record.key);
    if !outcome.computed {
        println!("                (from cache)");
    }
    println!();
    println!("--- Trades ---");
    println!("Total:          {} ({} long, {} short)", m.total_trades, m.long_trades, m.short_trades);
    println!("Canceled:       {}", s.positions_canceled);
    println!("Avg Duration:   {:.0}s", m.avg_trade_duration_secs);
    println!();
    println!("--- Performance ---");
    println!("Net PnL:        {:.2}", m.net_pnl);
    println!("Win Rate:       {:.1}%", m.win_rate);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Max Drawdown:   {:.2} ({:.2}%)", m.max_drawdown, m.max_drawdown_pct);
    println!("Expected Value: {:.2}R (max {:.2}R)", m.expected_value_r, m.max_r);
    println!("Final Capital:  {:.2}", s.final_capital);
    if record.source == ticklab_runner::TickSource::Synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}
