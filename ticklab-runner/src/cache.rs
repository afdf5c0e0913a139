//! Result cache: one JSON file per run key, deduplicated in memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::memo::KeyedCache;
use crate::runner::RunRecord;

/// Cache for run records.
///
/// Records are stored as `{cache_dir}/{key}.json`, where the key is the
/// content hash of instrument, period and strategy. Concurrent requests for
/// the same key share one computation.
pub struct ResultCache {
    cache_dir: PathBuf,
    memo: KeyedCache<String, RunRecord>,
}

impl ResultCache {
    /// Creates the cache directory if it doesn't exist.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).with_context(|| {
            format!("failed to create cache directory '{}'", cache_dir.display())
        })?;

        Ok(Self {
            cache_dir,
            memo: KeyedCache::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn contains(&self, key: &str) -> bool {
        self.memo.get(&key.to_string()).is_some() || self.record_path(key).exists()
    }

    /// Cached record for `key`, from memory or disk.
    pub fn get(&self, key: &str) -> Result<Option<Arc<RunRecord>>> {
        let key = key.to_string();
        if let Some(record) = self.memo.get(&key) {
            return Ok(Some(record));
        }
        match self.read(&key)? {
            Some(record) => Ok(Some(self.memo.insert(key, record))),
            None => Ok(None),
        }
    }

    /// Cached record for `key`, or the result of `compute`, persisted.
    ///
    /// The flag is true when `compute` ran.
    pub fn get_or_compute<E>(
        &self,
        key: &str,
        compute: impl FnOnce() -> std::result::Result<RunRecord, E>,
    ) -> std::result::Result<(Arc<RunRecord>, bool), E>
    where
        E: From<anyhow::Error>,
    {
        let mut computed = false;
        let load = || -> std::result::Result<RunRecord, E> {
            if let Some(record) = self.read(key)? {
                return Ok(record);
            }
            let record = compute()?;
            self.write(&record)?;
            computed = true;
            Ok(record)
        };
        let record = self.memo.get_or_try_insert_with(&key.to_string(), load)?;
        Ok((record, computed))
    }

    /// Stores a record, replacing any previous one with the same key.
    pub fn put(&self, record: RunRecord) -> Result<Arc<RunRecord>> {
        self.write(&record)?;
        Ok(self.memo.insert(record.key.clone(), record))
    }

    /// Number of records on disk.
    pub fn len(&self) -> Result<usize> {
        let count = std::fs::read_dir(&self.cache_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.path().is_file()
                    && entry.path().extension().and_then(|s| s.to_str()) == Some("json")
            })
            .count();

        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self, key: &str) -> Result<Option<RunRecord>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read cached run '{}'", path.display()))?;
        let record: RunRecord = serde_json::from_str(&json)
            .with_context(|| format!("failed to deserialize cached run '{}'", path.display()))?;

        Ok(Some(record))
    }

    fn write(&self, record: &RunRecord) -> Result<()> {
        let path = self.record_path(&record.key);
        let json = serde_json::to_string_pretty(record).context("failed to serialize run")?;

        // Write then rename so readers never see a partial file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move run into '{}'", path.display()))?;

        Ok(())
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }
}
