//! Engine output rows — the equity curve, per-day stats and the run bundle.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::TradeRecord;
use crate::prop::ViolationCounters;
use crate::split::SplitInfo;

/// One mark-to-market sample per coarse bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: DateTime<FixedOffset>,
    pub balance: f64,
    pub equity: f64,
    pub dd_global: f64,
    pub dd_daily: f64,
    pub halted: bool,
}

/// One row per local calendar day, flushed at each day transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub start_equity: f64,
    pub min_equity: f64,
    pub max_daily_dd_pct: f64,
    pub losses_closed: usize,
    pub halted: bool,
}

/// Everything one engine run produces. Ledger rows are in exit order;
/// the equity curve has exactly one point per coarse bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub ticker: String,
    pub penalty_atr: f64,
    pub bars: usize,
    pub end_balance: f64,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub daily_stats: Vec<DailyRow>,
    pub violations: ViolationCounters,
    pub split: Option<SplitInfo>,
}
