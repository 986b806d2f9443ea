//! Bar loading — the named interface to the external market-data collaborator.
//!
//! The engine never performs I/O during the bar loop; everything it consumes
//! comes through a `BarSource` up front. The shipped implementation reads
//! cached hourly OHLCV CSV files (`<data_dir>/<ticker>.csv`); acquisition and
//! cache maintenance belong to the collaborator that writes those files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use thiserror::Error;

use proplab_core::domain::Bar;

/// Errors from bar loading. Each is a per-ticker failure; the batch driver
/// reports it and keeps going.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data file for '{ticker}' at {path}")]
    NotFound { ticker: String, path: PathBuf },
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("bad row {row} in {path}: {reason}")]
    BadRow {
        path: PathBuf,
        row: usize,
        reason: String,
    },
    #[error("'{ticker}' series is not strictly increasing at row {row}")]
    Unsorted { ticker: String, row: usize },
    #[error("'{ticker}' has no bars")]
    Empty { ticker: String },
}

/// Something that can produce the hourly bar series for a ticker.
pub trait BarSource: Sync {
    fn load(&self, ticker: &str) -> Result<Vec<Bar>, LoadError>;
}

/// CSV-backed source: one `<ticker>.csv` per instrument under a data
/// directory, columns `ts,open,high,low,close,volume` with RFC 3339
/// timestamps already in project-local time.
pub struct CsvBarSource {
    data_dir: PathBuf,
}

impl CsvBarSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path_for(&self, ticker: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", sanitize_ticker(ticker)))
    }
}

/// File-system safe rendition of a ticker (`EURUSD=X` → `EURUSD_X`).
pub fn sanitize_ticker(ticker: &str) -> String {
    ticker
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl BarSource for CsvBarSource {
    fn load(&self, ticker: &str) -> Result<Vec<Bar>, LoadError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Err(LoadError::NotFound {
                ticker: ticker.to_string(),
                path,
            });
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|source| LoadError::Csv {
            path: path.clone(),
            source,
        })?;

        let mut bars = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|source| LoadError::Csv {
                path: path.clone(),
                source,
            })?;
            let row = i + 2; // 1-based, after the header

            if record.len() < 6 {
                return Err(LoadError::BadRow {
                    path: path.clone(),
                    row,
                    reason: format!("expected 6 columns, got {}", record.len()),
                });
            }

            let number = |idx: usize| -> Result<f64, LoadError> {
                record[idx].trim().parse().map_err(|_| LoadError::BadRow {
                    path: path.clone(),
                    row,
                    reason: format!("bad number '{}'", &record[idx]),
                })
            };

            let ts = DateTime::parse_from_rfc3339(record[0].trim()).map_err(|e| {
                LoadError::BadRow {
                    path: path.clone(),
                    row,
                    reason: format!("bad timestamp: {e}"),
                }
            })?;

            bars.push(Bar {
                ts,
                open: number(1)?,
                high: number(2)?,
                low: number(3)?,
                close: number(4)?,
                volume: number(5)?,
            });
        }

        validate_series(ticker, &bars)?;
        Ok(bars)
    }
}

/// In-memory source for tests and demos.
#[derive(Default)]
pub struct StaticBarSource {
    series: HashMap<String, Vec<Bar>>,
}

impl StaticBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: &str, bars: Vec<Bar>) {
        self.series.insert(ticker.to_string(), bars);
    }
}

impl BarSource for StaticBarSource {
    fn load(&self, ticker: &str) -> Result<Vec<Bar>, LoadError> {
        let bars = self
            .series
            .get(ticker)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                ticker: ticker.to_string(),
                path: Path::new("<memory>").into(),
            })?;
        validate_series(ticker, &bars)?;
        Ok(bars)
    }
}

/// The index must be strictly monotonically increasing and non-empty.
fn validate_series(ticker: &str, bars: &[Bar]) -> Result<(), LoadError> {
    if bars.is_empty() {
        return Err(LoadError::Empty {
            ticker: ticker.to_string(),
        });
    }
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].ts <= pair[0].ts {
            return Err(LoadError::Unsorted {
                ticker: ticker.to_string(),
                row: i + 1,
            });
        }
    }
    Ok(())
}
