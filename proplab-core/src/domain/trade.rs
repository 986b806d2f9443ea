//! TradeRecord — one append-only ledger row per closed trade.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::position::ExitReason;
use super::signal::Direction;

/// A completed trade: signal → entry → exit, with the P&L expressed both in
/// R-multiples and in account cash. Rows are appended in exit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ticker: String,
    pub penalty_atr: f64,
    pub direction: Direction,
    pub ts_signal: DateTime<FixedOffset>,
    pub ts_entry: DateTime<FixedOffset>,
    pub ts_exit: DateTime<FixedOffset>,
    pub entry: f64,
    pub sl: f64,
    pub tp: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub atr_signal: f64,
    pub result_r: f64,
    pub result_cash: f64,
    pub balance_after: f64,
    pub duration_bars: usize,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.result_r > 0.0
    }
}
