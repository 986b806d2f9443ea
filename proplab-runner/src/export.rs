//! Artifact export — the CSV tables and `summary.json` documents a batch
//! leaves on disk.
//!
//! Layout per `(ticker, penalty)`: `out/<ticker>/PEN_<p>/` with `trades.csv`,
//! `equity_curve.csv`, `daily_stats.csv` and `summary.json`. The batch root
//! gets `results.csv`; a comparison adds `comparison_full.csv`,
//! `comparison_ref.csv`, the three shortlist CSVs and `rejections.csv`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use proplab_core::config::Config;
use proplab_core::domain::TradeRecord;
use proplab_core::engine::{DailyRow, EquityPoint, RunOutput};

use crate::compare::PairRow;
use crate::data::sanitize_ticker;
use crate::shortlist::{Rejection, ScoredRow, TieredShortlists};
use crate::summary::{RunSummary, SummaryDoc};

// ─── CSV renderers ──────────────────────────────────────────────────

fn into_csv_string(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Trade ledger in chronological exit order.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "penalty_atr",
        "direction",
        "ts_signal",
        "ts_entry",
        "ts_exit",
        "entry",
        "sl",
        "tp",
        "exit",
        "exit_reason",
        "atr_signal",
        "result_r",
        "result_cash",
        "balance_after",
        "duration_bars",
    ])?;

    for t in trades {
        wtr.write_record([
            t.ticker.as_str(),
            &format!("{:.2}", t.penalty_atr),
            &t.direction.to_string(),
            &t.ts_signal.to_rfc3339(),
            &t.ts_entry.to_rfc3339(),
            &t.ts_exit.to_rfc3339(),
            &format!("{:.6}", t.entry),
            &format!("{:.6}", t.sl),
            &format!("{:.6}", t.tp),
            &format!("{:.6}", t.exit_price),
            &t.exit_reason.to_string(),
            &format!("{:.6}", t.atr_signal),
            &format!("{:.4}", t.result_r),
            &format!("{:.2}", t.result_cash),
            &format!("{:.2}", t.balance_after),
            &t.duration_bars.to_string(),
        ])?;
    }

    into_csv_string(wtr)
}

/// Per-coarse-bar mark-to-market series.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "balance", "equity", "dd_global", "dd_daily", "halt_today"])?;
    for p in equity_curve {
        wtr.write_record([
            p.ts.to_rfc3339(),
            format!("{:.2}", p.balance),
            format!("{:.2}", p.equity),
            format!("{:.6}", p.dd_global),
            format!("{:.6}", p.dd_daily),
            p.halted.to_string(),
        ])?;
    }
    into_csv_string(wtr)
}

/// Per-day summary rows.
pub fn export_daily_csv(daily_stats: &[DailyRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "start_equity",
        "min_equity",
        "max_daily_dd_pct",
        "losses_closed",
        "halted",
    ])?;
    for d in daily_stats {
        wtr.write_record([
            d.date.to_string(),
            format!("{:.2}", d.start_equity),
            format!("{:.2}", d.min_equity),
            format!("{:.6}", d.max_daily_dd_pct),
            d.losses_closed.to_string(),
            d.halted.to_string(),
        ])?;
    }
    into_csv_string(wtr)
}

/// One row per `(ticker, penalty)` summary, failures included.
pub fn export_results_csv(rows: &[RunSummary]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "penalty_atr",
        "bars",
        "n_trades",
        "win_rate",
        "profit_factor",
        "expectancy_r",
        "end_balance",
        "max_daily_dd_pct",
        "p99_daily_dd_pct",
        "viol_ftmo_bars",
        "viol_gft_bars",
        "viol_total_bars",
        "status",
        "error",
    ])?;
    for r in rows {
        wtr.write_record([
            r.ticker.as_str(),
            &format!("{:.2}", r.penalty_atr),
            &r.bars.to_string(),
            &r.n_trades.to_string(),
            &format!("{:.4}", r.win_rate),
            &format!("{:.4}", r.profit_factor),
            &format!("{:.4}", r.expectancy_r),
            &format!("{:.2}", r.end_balance),
            &format!("{:.6}", r.max_daily_dd_pct),
            &format!("{:.6}", r.p99_daily_dd_pct),
            &r.viol_ftmo_bars.to_string(),
            &r.viol_gft_bars.to_string(),
            &r.viol_total_bars.to_string(),
            if r.is_ok() { "ok" } else { "error" },
            r.error.as_str(),
        ])?;
    }
    into_csv_string(wtr)
}

/// IS/OOS comparison table.
pub fn export_comparison_csv(pairs: &[PairRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "penalty",
        "is_trades",
        "is_expectancy",
        "is_pf",
        "is_wr",
        "is_dd",
        "is_bars",
        "oos_trades",
        "oos_expectancy",
        "oos_pf",
        "oos_wr",
        "oos_dd",
        "oos_bars",
        "exp_delta",
        "pf_delta",
        "oos_status",
        "oos_notes",
    ])?;
    for p in pairs {
        wtr.write_record([
            p.ticker.as_str(),
            &format!("{:.2}", p.penalty),
            &p.is_trades.to_string(),
            &format!("{:.4}", p.is_expectancy),
            &format!("{:.4}", p.is_pf),
            &format!("{:.4}", p.is_wr),
            &format!("{:.6}", p.is_dd),
            &p.is_bars.to_string(),
            &p.oos_trades.to_string(),
            &format!("{:.4}", p.oos_expectancy),
            &format!("{:.4}", p.oos_pf),
            &format!("{:.4}", p.oos_wr),
            &format!("{:.6}", p.oos_dd),
            &p.oos_bars.to_string(),
            &format!("{:.4}", p.exp_delta),
            &format!("{:.4}", p.pf_delta),
            &p.oos_status.to_string(),
            p.oos_notes.as_str(),
        ])?;
    }
    into_csv_string(wtr)
}

/// One shortlist tier (or the combined tradable list).
pub fn export_shortlist_csv(rows: &[ScoredRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "penalty",
        "oos_score",
        "oos_trades",
        "oos_expectancy",
        "oos_pf",
        "oos_wr",
        "oos_dd",
        "is_trades",
        "is_expectancy",
        "is_pf",
    ])?;
    for s in rows {
        let p = &s.pair;
        wtr.write_record([
            p.ticker.as_str(),
            &format!("{:.2}", p.penalty),
            &format!("{:.4}", s.oos_score),
            &p.oos_trades.to_string(),
            &format!("{:.4}", p.oos_expectancy),
            &format!("{:.4}", p.oos_pf),
            &format!("{:.4}", p.oos_wr),
            &format!("{:.6}", p.oos_dd),
            &p.is_trades.to_string(),
            &format!("{:.4}", p.is_expectancy),
            &format!("{:.4}", p.is_pf),
        ])?;
    }
    into_csv_string(wtr)
}

/// Per-ticker rejection reasons for the shortlist pass.
pub fn export_rejections_csv(rows: &[Rejection]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ticker", "penalty", "reason"])?;
    for r in rows {
        wtr.write_record([
            r.ticker.as_str(),
            &format!("{:.2}", r.penalty),
            r.reason.as_str(),
        ])?;
    }
    into_csv_string(wtr)
}

// ─── Artifact bundles ───────────────────────────────────────────────

/// Save one run's artifact set under `out/<ticker>/PEN_<penalty>/`.
/// Returns the created directory.
pub fn save_run_artifacts(output_dir: &Path, out: &RunOutput, cfg: &Config) -> Result<PathBuf> {
    let run_dir = output_dir
        .join(sanitize_ticker(&out.ticker))
        .join(format!("PEN_{:.2}", out.penalty_atr));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&out.trades)?)?;
    std::fs::write(
        run_dir.join("equity_curve.csv"),
        export_equity_csv(&out.equity_curve)?,
    )?;
    std::fs::write(
        run_dir.join("daily_stats.csv"),
        export_daily_csv(&out.daily_stats)?,
    )?;

    let summary = SummaryDoc::build(out, cfg);
    let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
    std::fs::write(run_dir.join("summary.json"), json)?;

    Ok(run_dir)
}

/// Load a previously saved results table. The comparison command consumes
/// the IS and OOS batches through this.
pub fn load_results_csv(path: &Path) -> Result<Vec<RunSummary>> {
    use crate::summary::RunStatus;

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("bad record in {}", path.display()))?;
        let row = i + 2;

        anyhow::ensure!(
            record.len() >= 15,
            "{}: row {row} has {} columns, expected 15",
            path.display(),
            record.len()
        );

        let number = |idx: usize| -> Result<f64> {
            record[idx]
                .trim()
                .parse()
                .with_context(|| format!("{}: row {row} bad number in column {idx}", path.display()))
        };
        let count = |idx: usize| -> Result<usize> {
            record[idx]
                .trim()
                .parse()
                .with_context(|| format!("{}: row {row} bad count in column {idx}", path.display()))
        };

        rows.push(RunSummary {
            ticker: record[0].to_string(),
            penalty_atr: number(1)?,
            bars: count(2)?,
            n_trades: count(3)?,
            win_rate: number(4)?,
            profit_factor: number(5)?,
            expectancy_r: number(6)?,
            end_balance: number(7)?,
            max_daily_dd_pct: number(8)?,
            p99_daily_dd_pct: number(9)?,
            viol_ftmo_bars: count(10)?,
            viol_gft_bars: count(11)?,
            viol_total_bars: count(12)?,
            status: if &record[13] == "ok" {
                RunStatus::Ok
            } else {
                RunStatus::Error
            },
            error: record[14].to_string(),
        });
    }

    Ok(rows)
}

/// Save the batch-level results table.
pub fn save_results_csv(output_dir: &Path, rows: &[RunSummary]) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path = output_dir.join("results.csv");
    std::fs::write(&path, export_results_csv(rows)?)?;
    Ok(path)
}

/// Save the full comparison output set: both comparison tables, the three
/// shortlists and the rejection reasons.
pub fn save_comparison_artifacts(
    output_dir: &Path,
    full: &[PairRow],
    reference: &[PairRow],
    shortlists: &TieredShortlists,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    std::fs::write(
        output_dir.join("comparison_full.csv"),
        export_comparison_csv(full)?,
    )?;
    std::fs::write(
        output_dir.join("comparison_ref.csv"),
        export_comparison_csv(reference)?,
    )?;
    std::fs::write(
        output_dir.join("shortlist_tier1.csv"),
        export_shortlist_csv(&shortlists.tier1)?,
    )?;
    std::fs::write(
        output_dir.join("shortlist_tier2.csv"),
        export_shortlist_csv(&shortlists.tier2)?,
    )?;
    std::fs::write(
        output_dir.join("shortlist_tradable.csv"),
        export_shortlist_csv(&shortlists.tradable)?,
    )?;
    std::fs::write(
        output_dir.join("rejections.csv"),
        export_rejections_csv(&shortlists.rejections)?,
    )?;

    Ok(())
}
