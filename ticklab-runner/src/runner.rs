//! Run orchestration: wires together datasets, broker, trader and metrics.
//!
//! Two entry points:
//! - `Runner::run()`: one (instrument, month, strategy) run, served from the
//!   result cache when possible.
//! - `Runner::run_batch()`: many runs on the worker pool.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span};

use ticklab_core::domain::Month;
use ticklab_core::engine::{BacktestBroker, BrokerError, RunSummary, TickBroker};
use ticklab_core::metrics::{compute_period, MonthlyMetrics};
use ticklab_core::trader::{SetupError, StrategyConfig};

use crate::cache::ResultCache;
use crate::config::{ConfigError, RunnerConfig};
use crate::data_loader::{LoadError, LoadOptions, TickSource};
use crate::datasets::DatasetCache;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("strategy setup error: {0}")]
    Setup(#[from] SetupError),
    #[error("result cache error: {0}")]
    Cache(#[from] anyhow::Error),
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

/// Current schema version for persisted records.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// One unit of work: a strategy over one instrument-month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub instrument: String,
    pub month: Month,
    pub strategy: StrategyConfig,
}

impl RunConfig {
    pub fn new(instrument: impl Into<String>, month: Month, strategy: StrategyConfig) -> Self {
        Self {
            instrument: instrument.into(),
            month,
            strategy,
        }
    }

    /// Deterministic content hash of `instrument:period:strategy-json`.
    ///
    /// Two runs with identical inputs share the key and the cached record.
    pub fn run_key(&self) -> String {
        let input = format!(
            "{}:{}:{}",
            self.instrument,
            self.month,
            self.strategy.canonical_json()
        );
        blake3::hash(input.as_bytes()).to_hex().to_string()
    }
}

/// Persisted result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub key: String,
    pub instrument: String,
    pub period: Month,
    /// Canonical strategy JSON, as hashed into `key`.
    pub strategy: String,
    pub source: TickSource,
    pub metrics: MonthlyMetrics,
    pub summary: RunSummary,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub record: Arc<RunRecord>,
    /// False when the record came from the cache.
    pub computed: bool,
}

pub struct Runner {
    config: RunnerConfig,
    datasets: DatasetCache,
    results: ResultCache,
    pool: rayon::ThreadPool,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Result<Self, RunError> {
        config.validate()?;
        let results = ResultCache::new(&config.cache_dir)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("ticklab-worker-{i}"))
            .build()
            .map_err(|e| RunError::Pool(e.to_string()))?;

        Ok(Self {
            datasets: DatasetCache::new(LoadOptions::from_config(&config)),
            results,
            pool,
            config,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn datasets(&self) -> &DatasetCache {
        &self.datasets
    }

    pub fn results(&self) -> &ResultCache {
        &self.results
    }

    /// Run one configuration, or return its cached record.
    ///
    /// Strategy setup is validated before any data is touched.
    pub fn run(&self, run: &RunConfig) -> Result<RunOutcome, RunError> {
        run.strategy.builder()?.build()?;

        let key = run.run_key();
        let (record, computed) = self
            .results
            .get_or_compute(&key, || self.execute(run, &key))?;
        if !computed {
            info!(instrument = %run.instrument, month = %run.month, %key, "run already cached");
        }
        Ok(RunOutcome { record, computed })
    }

    /// Run every configuration on the worker pool. Results keep input order.
    pub fn run_batch(&self, runs: &[RunConfig]) -> Vec<Result<RunOutcome, RunError>> {
        self.pool
            .install(|| runs.par_iter().map(|run| self.run(run)).collect())
    }

    fn execute(&self, run: &RunConfig, key: &str) -> Result<RunRecord, RunError> {
        let span = info_span!("run", instrument = %run.instrument, month = %run.month);
        let _guard = span.enter();
        info!(strategy = %run.strategy.name, "run started");

        let cached = self.datasets.get(&run.instrument, run.month)?;
        let mut broker = TickBroker::new(Arc::clone(&cached.dataset), self.config.broker)?;
        run.strategy.install(&mut broker)?;
        let summary = broker.run();

        // Every trade belongs to the run's month, wherever UTC puts it.
        let metrics = compute_period(broker.positions());
        info!(
            trades = metrics.total_trades,
            net_pnl = metrics.net_pnl,
            win_rate = metrics.win_rate,
            "run completed"
        );

        Ok(RunRecord {
            schema_version: SCHEMA_VERSION,
            key: key.to_string(),
            instrument: run.instrument.clone(),
            period: run.month,
            strategy: run.strategy.canonical_json(),
            source: cached.source,
            metrics,
            summary,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ticklab_core::engine::RunCounters;

    pub(crate) fn sample_record(key: &str) -> RunRecord {
        RunRecord {
            schema_version: SCHEMA_VERSION,
            key: key.to_string(),
            instrument: "EURUSD".into(),
            period: Month::new(2024, 3).unwrap(),
            strategy: StrategyConfig::default().canonical_json(),
            source: TickSource::Synthetic,
            metrics: MonthlyMetrics {
                total_trades: 3,
                net_pnl: 80.0,
                ..MonthlyMetrics::default()
            },
            summary: RunSummary {
                symbol: "EURUSD".into(),
                counters: RunCounters::default(),
                positions_closed: 3,
                positions_canceled: 0,
                initial_capital: 100_000.0,
                final_capital: 100_080.0,
            },
        }
    }

    fn march() -> Month {
        Month::new(2024, 3).unwrap()
    }

    #[test]
    fn run_key_deterministic_and_sensitive() {
        let base = RunConfig::new("EURUSD", march(), StrategyConfig::default());
        assert_eq!(base.run_key(), base.clone().run_key());
        assert_eq!(base.run_key().len(), 64);

        let other_month = RunConfig::new("EURUSD", march().next(), StrategyConfig::default());
        let other_symbol = RunConfig::new("GBPUSD", march(), StrategyConfig::default());
        let mut strategy = StrategyConfig::default();
        strategy.history_size = 7;
        let other_strategy = RunConfig::new("EURUSD", march(), strategy);

        assert_ne!(base.run_key(), other_month.run_key());
        assert_ne!(base.run_key(), other_symbol.run_key());
        assert_ne!(base.run_key(), other_strategy.run_key());
    }

    #[test]
    fn record_without_schema_version_defaults() {
        let mut json = serde_json::to_value(sample_record("k")).unwrap();
        json.as_object_mut().unwrap().remove("schema_version");
        let record: RunRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.schema_version, SCHEMA_VERSION);
    }
}
