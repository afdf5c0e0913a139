//! Tick loading for one instrument-month.
//!
//! Resolution order for `{data_dir}/HISTDATA_COM_{SYMBOL}_T{YYYYMM}`:
//! 1. `.parquet` with `timestamp`, `bid`, `ask` columns
//! 2. `.csv` in histdata ASCII form (`YYYYMMDD HHMMSSmmm,bid,ask[,volume]`, EST)
//! 3. Synthetic ticks, only when enabled
//! 4. Otherwise fail with `LoadError::NotFound`
//!
//! Synthetic data is a developer-only mode, seeded per symbol and month so
//! repeated loads are identical.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use ticklab_core::dataset::{Dataset, DatasetError};
use ticklab_core::domain::{Month, Tick};

use crate::config::RunnerConfig;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no tick data for {symbol} {month} in '{dir}' (enable synthetic data to generate some)")]
    NotFound {
        symbol: String,
        month: Month,
        dir: PathBuf,
    },
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parquet error in '{path}': {message}")]
    Parquet { path: PathBuf, message: String },
    #[error("csv error in '{path}' at record {record}: {message}")]
    Csv {
        path: PathBuf,
        record: u64,
        message: String,
    },
    #[error("invalid dataset: {0}")]
    Dataset(#[from] DatasetError),
}

/// Where a month's ticks came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickSource {
    Parquet,
    Csv,
    Synthetic,
}

impl std::fmt::Display for TickSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TickSource::Parquet => "parquet",
            TickSource::Csv => "csv",
            TickSource::Synthetic => "synthetic",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub data_dir: PathBuf,
    pub max_gap: Duration,
    pub synthetic: bool,
}

impl LoadOptions {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            max_gap: config.max_gap(),
            synthetic: config.synthetic,
        }
    }
}

#[derive(Debug)]
pub struct LoadedMonth {
    pub dataset: Dataset,
    pub source: TickSource,
}

/// `{data_dir}/HISTDATA_COM_{SYMBOL}_T{YYYYMM}.{ext}`
pub fn month_file(data_dir: &Path, symbol: &str, month: Month, ext: &str) -> PathBuf {
    data_dir.join(format!(
        "HISTDATA_COM_{symbol}_T{:04}{:02}.{ext}",
        month.year(),
        month.month()
    ))
}

/// Load and gap-mark one month of ticks.
pub fn load_month(symbol: &str, month: Month, opts: &LoadOptions) -> Result<LoadedMonth, LoadError> {
    let started = Instant::now();
    let parquet = month_file(&opts.data_dir, symbol, month, "parquet");
    let csv = month_file(&opts.data_dir, symbol, month, "csv");

    let (ticks, source) = if parquet.is_file() {
        (read_parquet_ticks(&parquet)?, TickSource::Parquet)
    } else if csv.is_file() {
        (read_histdata_csv(&csv)?, TickSource::Csv)
    } else if opts.synthetic {
        warn!(%symbol, %month, "generating synthetic ticks");
        (synthetic_ticks(symbol, month), TickSource::Synthetic)
    } else {
        return Err(LoadError::NotFound {
            symbol: symbol.to_string(),
            month,
            dir: opts.data_dir.clone(),
        });
    };

    let tick_count = ticks.len();
    let dataset = Dataset::new(
        symbol,
        month.first_day(),
        month.last_day(),
        ticks,
        opts.max_gap,
    )?;
    debug!(
        ticks = tick_count,
        %source,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ticks read"
    );
    info!(%symbol, %month, gaps = dataset.gap_count(), "dataset loaded");

    Ok(LoadedMonth { dataset, source })
}

// ── Parquet ──────────────────────────────────────────────────────────

/// Read ticks from a Parquet file. `timestamp` may be Int64 milliseconds
/// since the epoch or a Datetime column of any unit.
pub fn read_parquet_ticks(path: &Path) -> Result<Vec<Tick>, LoadError> {
    let parquet_err = |message: String| LoadError::Parquet {
        path: path.to_path_buf(),
        message,
    };

    let file = fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| parquet_err(format!("read: {e}")))?;

    for name in ["timestamp", "bid", "ask"] {
        if df.column(name).is_err() {
            return Err(parquet_err(format!("missing column '{name}'")));
        }
    }

    let map_err = |e: PolarsError| parquet_err(format!("column read: {e}"));
    let timestamps = df.column("timestamp").map_err(map_err)?;
    let divisor = match timestamps.dtype() {
        DataType::Datetime(TimeUnit::Nanoseconds, _) => 1_000_000,
        DataType::Datetime(TimeUnit::Microseconds, _) => 1_000,
        _ => 1,
    };
    let timestamps = timestamps
        .cast(&DataType::Int64)
        .map_err(|e| parquet_err(format!("timestamp cast: {e}")))?;
    let ts_ca = timestamps
        .i64()
        .map_err(|e| parquet_err(format!("timestamp column type: {e}")))?;
    let bids = df.column("bid").map_err(map_err)?;
    let bid_ca = bids
        .f64()
        .map_err(|e| parquet_err(format!("bid column type: {e}")))?;
    let asks = df.column("ask").map_err(map_err)?;
    let ask_ca = asks
        .f64()
        .map_err(|e| parquet_err(format!("ask column type: {e}")))?;

    let n = df.height();
    let mut ticks = Vec::with_capacity(n);
    for i in 0..n {
        let raw = ts_ca
            .get(i)
            .ok_or_else(|| parquet_err(format!("null timestamp at row {i}")))?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(raw.div_euclid(divisor))
            .ok_or_else(|| parquet_err(format!("timestamp out of range at row {i}")))?;
        let (Some(bid), Some(ask)) = (bid_ca.get(i), ask_ca.get(i)) else {
            return Err(parquet_err(format!("null quote at row {i}")));
        };
        ticks.push(Tick::new(timestamp, bid, ask));
    }
    Ok(ticks)
}

/// Write ticks as `timestamp` (Datetime ms), `bid`, `ask`.
pub fn write_parquet_ticks(path: &Path, ticks: &[Tick]) -> Result<(), LoadError> {
    let parquet_err = |message: String| LoadError::Parquet {
        path: path.to_path_buf(),
        message,
    };

    let timestamps: Vec<i64> = ticks.iter().map(|t| t.timestamp.timestamp_millis()).collect();
    let bids: Vec<f64> = ticks.iter().map(|t| t.bid).collect();
    let asks: Vec<f64> = ticks.iter().map(|t| t.ask).collect();

    let mut df = DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(|e| parquet_err(format!("timestamp cast: {e}")))?,
        Column::new("bid".into(), bids),
        Column::new("ask".into(), asks),
    ])
    .map_err(|e| parquet_err(format!("dataframe creation: {e}")))?;

    let file = fs::File::create(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| parquet_err(format!("write: {e}")))?;
    Ok(())
}

// ── Histdata CSV ─────────────────────────────────────────────────────

/// Histdata timestamps are EST without daylight saving.
fn histdata_offset() -> Option<FixedOffset> {
    FixedOffset::west_opt(5 * 3600)
}

/// Parse `YYYYMMDD HHMMSSmmm` (EST) into UTC.
pub fn parse_histdata_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let (date, time) = s.trim().split_once(' ')?;
    if date.len() != 8 || time.len() != 9 {
        return None;
    }
    let num = |s: &str, range: std::ops::Range<usize>| s.get(range)?.parse::<u32>().ok();

    let date = NaiveDate::from_ymd_opt(
        date.get(0..4)?.parse().ok()?,
        num(date, 4..6)?,
        num(date, 6..8)?,
    )?;
    let time = NaiveTime::from_hms_milli_opt(
        num(time, 0..2)?,
        num(time, 2..4)?,
        num(time, 4..6)?,
        num(time, 6..9)?,
    )?;
    let local = histdata_offset()?
        .from_local_datetime(&date.and_time(time))
        .single()?;
    Some(local.with_timezone(&Utc))
}

/// Read a histdata ASCII tick file. Extra columns (volume) are ignored.
pub fn read_histdata_csv(path: &Path) -> Result<Vec<Tick>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| LoadError::Csv {
            path: path.to_path_buf(),
            record: 0,
            message: e.to_string(),
        })?;

    let mut ticks = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record_no = i as u64 + 1;
        let csv_err = |message: String| LoadError::Csv {
            path: path.to_path_buf(),
            record: record_no,
            message,
        };

        let record = record.map_err(|e| csv_err(e.to_string()))?;
        if record.len() < 3 {
            return Err(csv_err(format!("expected at least 3 fields, got {}", record.len())));
        }
        let timestamp = parse_histdata_timestamp(&record[0])
            .ok_or_else(|| csv_err(format!("bad timestamp '{}'", &record[0])))?;
        let bid: f64 = record[1]
            .parse()
            .map_err(|_| csv_err(format!("bad bid '{}'", &record[1])))?;
        let ask: f64 = record[2]
            .parse()
            .map_err(|_| csv_err(format!("bad ask '{}'", &record[2])))?;
        ticks.push(Tick::new(timestamp, bid, ask));
    }
    Ok(ticks)
}

// ── Synthetic ────────────────────────────────────────────────────────

/// Random-walk quotes every 1-20 seconds on weekdays of `month`.
///
/// Deterministic per (symbol, month). Weekends are left empty so the
/// dataset shows the same gaps real FX data does.
pub fn synthetic_ticks(symbol: &str, month: Month) -> Vec<Tick> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed = blake3::hash(format!("{symbol}:{month}").as_bytes());
    let mut rng = StdRng::from_seed(*seed.as_bytes());

    let mut ticks = Vec::new();
    let mut mid = 1.1000_f64;
    let mut day = month.first_day();
    let last = month.last_day();

    while day <= last {
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            day += Duration::days(1);
            continue;
        }

        let mut ts = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
        let day_end = ts + Duration::days(1);
        while ts < day_end {
            mid = (mid + rng.gen_range(-0.00005..0.00005)).max(0.1);
            let half_spread = rng.gen_range(0.00002..0.0001);
            ticks.push(Tick::new(ts, mid - half_spread, mid + half_spread));
            ts += Duration::seconds(rng.gen_range(1..=20));
        }
        day += Duration::days(1);
    }

    ticks
}
