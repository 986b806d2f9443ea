//! Batch driver — the cartesian sweep over tickers × penalties.
//!
//! Bars are loaded once per ticker; the `(ticker, penalty)` product then
//! fans out over rayon workers, each owning its engine state exclusively.
//! Workers share only the read-only config and the loaded bar series.
//! A failed run keeps its slot in the results with ticker/penalty context
//! and never poisons the rest of the batch.

use std::collections::HashMap;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use proplab_core::config::Config;
use proplab_core::domain::Bar;
use proplab_core::engine::{BacktestEngine, RunOutput};
use proplab_core::resample::resample;
use proplab_core::split::apply_split;
use proplab_core::strategy::{DonchianBreakout, Strategy};

use crate::data::{BarSource, LoadError};
use crate::summary::RunSummary;

/// One cell of the sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub ticker: String,
    pub penalty_atr: f64,
}

/// Per-run failure, carrying its ticker/penalty context in the batch result.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("'{ticker}': {bars} bars after split, warm-up needs at least {required}")]
    ShortHistory {
        ticker: String,
        bars: usize,
        required: usize,
    },
}

/// Outcome of one sweep cell.
#[derive(Debug)]
pub struct BatchEntry {
    pub spec: RunSpec,
    pub result: Result<RunOutput, RunError>,
}

impl BatchEntry {
    pub fn to_summary(&self) -> RunSummary {
        match &self.result {
            Ok(out) => RunSummary::from_output(out),
            Err(err) => RunSummary::failed(&self.spec.ticker, self.spec.penalty_atr, err),
        }
    }
}

/// Coarse bars the strategy needs before any signal can fire.
fn warmup_bars(cfg: &Config) -> usize {
    cfg.ema_period
        .max(cfg.atr_period + 1)
        .max(cfg.donchian_n + 1)
}

/// Run one `(ticker, penalty)` cell over a pre-loaded hourly series with
/// the production strategy.
pub fn run_single(
    cfg: &Config,
    ticker: &str,
    penalty_atr: f64,
    bars_1h: &[Bar],
) -> Result<RunOutput, RunError> {
    let strategy = DonchianBreakout::proactive(cfg);
    run_single_with_strategy(cfg, &strategy, ticker, penalty_atr, bars_1h)
}

/// Run one cell with a caller-supplied strategy (diagnostic variants).
pub fn run_single_with_strategy(
    cfg: &Config,
    strategy: &dyn Strategy,
    ticker: &str,
    penalty_atr: f64,
    bars_1h: &[Bar],
) -> Result<RunOutput, RunError> {
    let coarse_full = resample(bars_1h, cfg.timeframe);
    let (window, split_info) = apply_split(&coarse_full, cfg);

    let required = warmup_bars(cfg);
    if window.len() < required {
        return Err(RunError::ShortHistory {
            ticker: ticker.to_string(),
            bars: window.len(),
            required,
        });
    }

    let engine = BacktestEngine::new(cfg, strategy, ticker, penalty_atr);
    Ok(engine.run(window.to_vec(), Some(bars_1h), split_info))
}

/// Run the full cartesian product. Bars load once per ticker up front; load
/// failures fan out into one failed entry per penalty.
pub fn run_batch(
    cfg: &Config,
    source: &dyn BarSource,
    tickers: &[String],
    penalties: &[f64],
) -> Vec<BatchEntry> {
    info!(
        tickers = tickers.len(),
        penalties = penalties.len(),
        timeframe = %cfg.timeframe,
        "starting batch"
    );

    let mut loaded: HashMap<&str, Result<Vec<Bar>, LoadError>> = HashMap::new();
    for ticker in tickers {
        loaded.insert(ticker.as_str(), source.load(ticker));
    }

    let specs: Vec<RunSpec> = tickers
        .iter()
        .flat_map(|ticker| {
            penalties.iter().map(move |&penalty_atr| RunSpec {
                ticker: ticker.clone(),
                penalty_atr,
            })
        })
        .collect();

    let entries: Vec<BatchEntry> = specs
        .into_par_iter()
        .map(|spec| {
            let result = match &loaded[spec.ticker.as_str()] {
                Ok(bars) => run_single(cfg, &spec.ticker, spec.penalty_atr, bars),
                Err(load_err) => Err(RunError::Load(clone_load_error(load_err))),
            };
            if let Err(err) = &result {
                warn!(ticker = %spec.ticker, penalty = spec.penalty_atr, %err, "run failed");
            }
            BatchEntry { spec, result }
        })
        .collect();

    let ok = entries.iter().filter(|e| e.result.is_ok()).count();
    info!(ok, failed = entries.len() - ok, "batch complete");
    entries
}

/// `LoadError` holds `io::Error` and is not `Clone`; re-render it so one bad
/// ticker can fail several sweep cells.
fn clone_load_error(err: &LoadError) -> LoadError {
    match err {
        LoadError::NotFound { ticker, path } => LoadError::NotFound {
            ticker: ticker.clone(),
            path: path.clone(),
        },
        LoadError::Unsorted { ticker, row } => LoadError::Unsorted {
            ticker: ticker.clone(),
            row: *row,
        },
        LoadError::Empty { ticker } => LoadError::Empty {
            ticker: ticker.clone(),
        },
        LoadError::Io { path, source } => LoadError::Io {
            path: path.clone(),
            source: std::io::Error::new(source.kind(), source.to_string()),
        },
        LoadError::Csv { path, source } => LoadError::BadRow {
            path: path.clone(),
            row: 0,
            reason: source.to_string(),
        },
        LoadError::BadRow { path, row, reason } => LoadError::BadRow {
            path: path.clone(),
            row: *row,
            reason: reason.clone(),
        },
    }
}
