//! Pairwise IS ↔ OOS evaluation.
//!
//! Each `(ticker, penalty)` pair of summary rows is gated on OOS trade
//! count, checked against absolute OOS floors, and checked for degradation
//! relative to IS. The verdict is a typed status, not a string; the notes
//! explain which gates failed.

use serde::{Deserialize, Serialize};

use crate::summary::RunSummary;

/// OOS eligibility thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OosEligibility {
    pub min_trades: usize,
    pub min_expectancy: f64,
    pub min_pf: f64,
    pub max_dd: f64,
    /// Acceptable IS → OOS expectancy contraction (fraction).
    pub max_expectancy_drop: f64,
    /// Acceptable IS → OOS profit-factor contraction (fraction of PF - 1).
    pub max_pf_drop: f64,
}

impl Default for OosEligibility {
    fn default() -> Self {
        Self {
            min_trades: 15,
            min_expectancy: 0.0,
            min_pf: 1.2,
            max_dd: 0.05,
            max_expectancy_drop: 0.50,
            max_pf_drop: 0.40,
        }
    }
}

/// Verdict of the OOS evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OosStatus {
    Valid,
    InsufficientTrades,
    Degraded,
    Failed,
}

impl std::fmt::Display for OosStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OosStatus::Valid => write!(f, "valid"),
            OosStatus::InsufficientTrades => write!(f, "insufficient_trades"),
            OosStatus::Degraded => write!(f, "degraded"),
            OosStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One row of the comparison table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRow {
    pub ticker: String,
    pub penalty: f64,

    pub is_trades: usize,
    pub is_expectancy: f64,
    pub is_pf: f64,
    pub is_wr: f64,
    pub is_dd: f64,
    pub is_bars: usize,

    pub oos_trades: usize,
    pub oos_expectancy: f64,
    pub oos_pf: f64,
    pub oos_wr: f64,
    pub oos_dd: f64,
    pub oos_bars: usize,

    pub exp_delta: f64,
    pub pf_delta: f64,
    pub oos_status: OosStatus,
    pub oos_notes: String,
}

/// Evaluate one IS/OOS pair. Returns the status and the failed-gate notes.
pub fn evaluate_oos(
    is_row: &RunSummary,
    oos_row: &RunSummary,
    criteria: &OosEligibility,
) -> (OosStatus, Vec<String>) {
    if oos_row.n_trades < criteria.min_trades {
        return (
            OosStatus::InsufficientTrades,
            vec![format!(
                "OOS trades ({}) < {}",
                oos_row.n_trades, criteria.min_trades
            )],
        );
    }

    let mut notes = Vec::new();

    if oos_row.expectancy_r <= criteria.min_expectancy {
        notes.push(format!(
            "ExpR {:.3} <= {:.2}",
            oos_row.expectancy_r, criteria.min_expectancy
        ));
    }
    if oos_row.profit_factor < criteria.min_pf {
        notes.push(format!(
            "PF {:.2} < {:.2}",
            oos_row.profit_factor, criteria.min_pf
        ));
    }
    if oos_row.max_daily_dd_pct > criteria.max_dd {
        notes.push(format!(
            "DD {:.1}% > {:.1}%",
            oos_row.max_daily_dd_pct * 100.0,
            criteria.max_dd * 100.0
        ));
    }

    if is_row.expectancy_r > 0.0 {
        let exp_drop = 1.0 - oos_row.expectancy_r / is_row.expectancy_r;
        if exp_drop > criteria.max_expectancy_drop {
            notes.push(format!(
                "ExpR drop {:.0}% > {:.0}%",
                exp_drop * 100.0,
                criteria.max_expectancy_drop * 100.0
            ));
        }
    }
    if is_row.profit_factor > 1.0 && is_row.profit_factor.is_finite() {
        let pf_drop = 1.0 - (oos_row.profit_factor - 1.0) / (is_row.profit_factor - 1.0);
        if pf_drop > criteria.max_pf_drop && oos_row.profit_factor < is_row.profit_factor {
            notes.push("PF contraction significant".to_string());
        }
    }

    if notes.is_empty() {
        return (OosStatus::Valid, notes);
    }

    let critical = oos_row.expectancy_r < 0.0 || oos_row.profit_factor < 1.0;
    if critical || notes.len() >= 3 {
        (OosStatus::Failed, notes)
    } else {
        (OosStatus::Degraded, notes)
    }
}

/// Join IS and OOS summaries on `(ticker, penalty)` and evaluate each pair.
/// Error rows and unmatched IS rows are skipped; `penalty_filter` restricts
/// the join to a single penalty level.
pub fn compare_pairs(
    is_rows: &[RunSummary],
    oos_rows: &[RunSummary],
    criteria: &OosEligibility,
    penalty_filter: Option<f64>,
) -> Vec<PairRow> {
    let mut out = Vec::new();

    for is_row in is_rows.iter().filter(|r| r.is_ok()) {
        if let Some(penalty) = penalty_filter {
            if is_row.penalty_atr != penalty {
                continue;
            }
        }
        let oos_row = oos_rows.iter().find(|r| {
            r.is_ok() && r.ticker == is_row.ticker && r.penalty_atr == is_row.penalty_atr
        });
        let Some(oos_row) = oos_row else {
            continue;
        };

        let (status, notes) = evaluate_oos(is_row, oos_row, criteria);
        out.push(PairRow {
            ticker: is_row.ticker.clone(),
            penalty: is_row.penalty_atr,
            is_trades: is_row.n_trades,
            is_expectancy: is_row.expectancy_r,
            is_pf: is_row.profit_factor,
            is_wr: is_row.win_rate,
            is_dd: is_row.max_daily_dd_pct,
            is_bars: is_row.bars,
            oos_trades: oos_row.n_trades,
            oos_expectancy: oos_row.expectancy_r,
            oos_pf: oos_row.profit_factor,
            oos_wr: oos_row.win_rate,
            oos_dd: oos_row.max_daily_dd_pct,
            oos_bars: oos_row.bars,
            exp_delta: oos_row.expectancy_r - is_row.expectancy_r,
            pf_delta: oos_row.profit_factor - is_row.profit_factor,
            oos_status: status,
            oos_notes: notes.join("; "),
        });
    }

    out
}
