//! Shared datasets, loaded once per (instrument, month).

use std::sync::Arc;

use ticklab_core::dataset::Dataset;
use ticklab_core::domain::Month;

use crate::data_loader::{load_month, LoadError, LoadOptions, TickSource};
use crate::memo::KeyedCache;

#[derive(Debug)]
pub struct CachedDataset {
    pub dataset: Arc<Dataset>,
    pub source: TickSource,
}

pub struct DatasetCache {
    opts: LoadOptions,
    entries: KeyedCache<(String, Month), CachedDataset>,
}

impl DatasetCache {
    pub fn new(opts: LoadOptions) -> Self {
        Self {
            opts,
            entries: KeyedCache::new(),
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.opts
    }

    pub fn get(&self, instrument: &str, month: Month) -> Result<Arc<CachedDataset>, LoadError> {
        self.entries
            .get_or_try_insert_with(&(instrument.to_string(), month), || {
                let loaded = load_month(instrument, month, &self.opts)?;
                Ok(CachedDataset {
                    dataset: Arc::new(loaded.dataset),
                    source: loaded.source,
                })
            })
    }

    /// Number of datasets held in memory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn loads_each_month_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(LoadOptions {
            data_dir: dir.path().to_path_buf(),
            max_gap: Duration::seconds(60),
            synthetic: true,
        });
        let feb = Month::new(2024, 2).unwrap();

        let a = cache.get("EURUSD", feb).unwrap();
        let b = cache.get("EURUSD", feb).unwrap();
        assert!(Arc::ptr_eq(&a.dataset, &b.dataset));
        assert_eq!(a.source, TickSource::Synthetic);
        assert_eq!(cache.len(), 1);

        cache.get("GBPUSD", feb).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn load_failure_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(LoadOptions {
            data_dir: dir.path().to_path_buf(),
            max_gap: Duration::seconds(60),
            synthetic: false,
        });
        let feb = Month::new(2024, 2).unwrap();
        assert!(cache.get("EURUSD", feb).is_err());
        assert!(cache.is_empty());
    }
}
