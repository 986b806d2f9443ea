//! Per-run aggregation — pure functions from a trade ledger and daily stats
//! to the metrics the comparison and shortlist layers consume.

use serde::{Deserialize, Serialize};

use proplab_core::config::Config;
use proplab_core::engine::RunOutput;
use proplab_core::fingerprint::config_fingerprint;
use proplab_core::indicators::quantile_sorted;
use proplab_core::split::SplitInfo;

/// One row of `results.csv`: the aggregate view of a single
/// `(ticker, penalty)` run, or the error that prevented it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticker: String,
    pub penalty_atr: f64,
    pub bars: usize,
    pub n_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy_r: f64,
    pub end_balance: f64,
    pub max_daily_dd_pct: f64,
    pub p99_daily_dd_pct: f64,
    pub viol_ftmo_bars: usize,
    pub viol_gft_bars: usize,
    pub viol_total_bars: usize,
    pub status: RunStatus,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Error,
}

impl RunSummary {
    pub fn from_output(out: &RunOutput) -> Self {
        let metrics = ledger_metrics(out);
        Self {
            ticker: out.ticker.clone(),
            penalty_atr: out.penalty_atr,
            bars: out.bars,
            n_trades: metrics.n_trades,
            win_rate: metrics.win_rate,
            profit_factor: metrics.profit_factor,
            expectancy_r: metrics.expectancy_r,
            end_balance: out.end_balance,
            max_daily_dd_pct: metrics.max_daily_dd_pct,
            p99_daily_dd_pct: metrics.p99_daily_dd_pct,
            viol_ftmo_bars: out.violations.ftmo_bars,
            viol_gft_bars: out.violations.gft_bars,
            viol_total_bars: out.violations.total_bars,
            status: RunStatus::Ok,
            error: String::new(),
        }
    }

    /// A failed run keeps its slot in the results table.
    pub fn failed(ticker: &str, penalty_atr: f64, error: impl std::fmt::Display) -> Self {
        Self {
            ticker: ticker.to_string(),
            penalty_atr,
            bars: 0,
            n_trades: 0,
            win_rate: 0.0,
            profit_factor: 0.0,
            expectancy_r: 0.0,
            end_balance: 0.0,
            max_daily_dd_pct: 0.0,
            p99_daily_dd_pct: 0.0,
            viol_ftmo_bars: 0,
            viol_gft_bars: 0,
            viol_total_bars: 0,
            status: RunStatus::Error,
            error: error.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }
}

/// Ledger-level metrics shared by the summary row and the summary document.
#[derive(Debug, Clone, Copy)]
pub struct LedgerMetrics {
    pub n_trades: usize,
    pub win_rate: f64,
    pub expectancy_r: f64,
    pub profit_factor: f64,
    pub max_daily_dd_pct: f64,
    pub p99_daily_dd_pct: f64,
}

/// Aggregate a run's ledger and daily stats.
///
/// Profit factor conventions: infinite with at least one win and no losses,
/// zero with no wins at all.
pub fn ledger_metrics(out: &RunOutput) -> LedgerMetrics {
    let n_trades = out.trades.len();

    let (win_rate, expectancy_r, profit_factor) = if n_trades > 0 {
        let wins = out.trades.iter().filter(|t| t.result_r > 0.0).count();
        let mean_r: f64 =
            out.trades.iter().map(|t| t.result_r).sum::<f64>() / n_trades as f64;
        let gross_win: f64 = out
            .trades
            .iter()
            .map(|t| t.result_r.max(0.0))
            .sum();
        let gross_loss: f64 = out
            .trades
            .iter()
            .map(|t| (-t.result_r).max(0.0))
            .sum();
        let pf = if gross_loss > 0.0 {
            gross_win / gross_loss
        } else if gross_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        (wins as f64 / n_trades as f64, mean_r, pf)
    } else {
        (0.0, 0.0, 0.0)
    };

    let mut daily_dds: Vec<f64> = out.daily_stats.iter().map(|d| d.max_daily_dd_pct).collect();
    daily_dds.sort_by(|a, b| a.partial_cmp(b).expect("daily dd is never NaN"));
    let max_daily_dd_pct = daily_dds.last().copied().unwrap_or(0.0);
    let p99_daily_dd_pct = if daily_dds.is_empty() {
        0.0
    } else {
        quantile_sorted(&daily_dds, 0.99)
    };

    LedgerMetrics {
        n_trades,
        win_rate,
        expectancy_r,
        profit_factor,
        max_daily_dd_pct,
        p99_daily_dd_pct,
    }
}

/// The `summary.json` document: aggregated metrics, prop counters, the full
/// config echo and its fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryDoc {
    pub ticker: String,
    pub penalty_atr: f64,
    pub bars: usize,
    pub timeframe: String,
    pub start_balance: f64,
    pub end_balance: f64,
    pub risk_per_trade: f64,
    pub n_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy_r: f64,
    pub prop: PropBlock,
    pub split: Option<SplitInfo>,
    pub config: Config,
    pub config_fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropBlock {
    pub daily_equity_mode: String,
    pub max_daily_dd_pct: f64,
    pub p99_daily_dd_pct: f64,
    pub n_daily_violate_ftmo_bars: usize,
    pub n_daily_violate_gft_bars: usize,
    pub n_total_violate_bars: usize,
}

impl SummaryDoc {
    pub fn build(out: &RunOutput, cfg: &Config) -> Self {
        let metrics = ledger_metrics(out);
        Self {
            ticker: out.ticker.clone(),
            penalty_atr: out.penalty_atr,
            bars: out.bars,
            timeframe: cfg.timeframe.to_string(),
            start_balance: cfg.start_balance,
            end_balance: out.end_balance,
            risk_per_trade: cfg.risk_per_trade,
            n_trades: metrics.n_trades,
            win_rate: metrics.win_rate,
            profit_factor: metrics.profit_factor,
            expectancy_r: metrics.expectancy_r,
            prop: PropBlock {
                daily_equity_mode: format!("{:?}", cfg.daily_equity_mode).to_lowercase(),
                max_daily_dd_pct: metrics.max_daily_dd_pct,
                p99_daily_dd_pct: metrics.p99_daily_dd_pct,
                n_daily_violate_ftmo_bars: out.violations.ftmo_bars,
                n_daily_violate_gft_bars: out.violations.gft_bars,
                n_total_violate_bars: out.violations.total_bars,
            },
            split: out.split.clone(),
            config: cfg.clone(),
            config_fingerprint: config_fingerprint(cfg),
        }
    }
}
