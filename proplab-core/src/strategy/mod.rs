//! Strategy seam — the three-operation capability the engine depends on.
//!
//! A strategy prepares its indicator columns once, is asked for at most one
//! signal per bar, and turns an accepted signal into concrete entry/SL/TP
//! levels under an execution penalty. The engine never sees a concrete
//! strategy type.

pub mod donchian_breakout;

pub use donchian_breakout::{DonchianBreakout, SignalRule};

use crate::domain::{Bar, Signal};

/// A bar series enriched with precomputed indicator columns.
///
/// Columns are index-aligned with `bars`; the warm-up region carries NaN and
/// `vol_ok` is false wherever the gate quantile is undefined.
#[derive(Debug, Clone)]
pub struct EnrichedSeries {
    pub bars: Vec<Bar>,
    pub ema: Vec<f64>,
    pub atr: Vec<f64>,
    pub atr_rel: Vec<f64>,
    pub d_high: Vec<f64>,
    pub d_low: Vec<f64>,
    pub atr_rel_q: Vec<f64>,
    pub vol_ok: Vec<bool>,
}

impl EnrichedSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// All indicators the signal rule reads are out of their warm-up region.
    pub fn indicators_ready(&self, idx: usize) -> bool {
        !self.ema[idx].is_nan()
            && !self.atr[idx].is_nan()
            && !self.d_high[idx].is_nan()
            && !self.d_low[idx].is_nan()
            && !self.atr_rel_q[idx].is_nan()
    }
}

/// Entry, stop-loss and take-profit levels for an accepted signal.
/// `tp` is 0.0 when the take-profit leg is disabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryLevels {
    pub entry: f64,
    pub sl: f64,
    pub tp: f64,
}

/// The capability the engine drives. Implementations must be pure over their
/// inputs: same series and index, same answer.
pub trait Strategy {
    /// Compute indicator columns for the full series, once, before the loop.
    fn prepare_indicators(&self, bars: Vec<Bar>) -> EnrichedSeries;

    /// Emit at most one signal for the bar at `bar_idx`, or None.
    fn generate_signal(&self, series: &EnrichedSeries, bar_idx: usize) -> Option<Signal>;

    /// Entry/SL/TP for `signal` under an execution penalty of
    /// `penalty_atr` ATR multiples.
    fn compute_entry_sl_tp(&self, signal: &Signal, penalty_atr: f64) -> EntryLevels;
}
