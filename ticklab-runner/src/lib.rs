//! TickLab Runner: tick loading, caching and parallel run orchestration.
//!
//! This crate builds on `ticklab-core` to provide:
//! - Monthly tick loading from Parquet or histdata CSV, with a synthetic fallback
//! - A dataset cache shared by concurrent runs
//! - A persistent result cache keyed by a content hash of the run inputs
//! - A worker pool for batches of (instrument, month, strategy) runs

pub mod cache;
pub mod config;
pub mod data_loader;
pub mod datasets;
pub mod memo;
pub mod runner;

pub use cache::ResultCache;
pub use config::{ConfigError, RunnerConfig};
pub use data_loader::{load_month, LoadError, LoadOptions, LoadedMonth, TickSource};
pub use datasets::{CachedDataset, DatasetCache};
pub use memo::KeyedCache;
pub use runner::{RunConfig, RunError, RunOutcome, RunRecord, Runner};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn runner_is_send_sync() {
        assert_send::<Runner>();
        assert_sync::<Runner>();
    }

    #[test]
    fn caches_are_send_sync() {
        assert_send::<DatasetCache>();
        assert_sync::<DatasetCache>();
        assert_send::<ResultCache>();
        assert_sync::<ResultCache>();
    }

    #[test]
    fn records_are_send_sync() {
        assert_send::<RunRecord>();
        assert_sync::<RunRecord>();
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunnerConfig>();
        assert_sync::<RunnerConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }
}
