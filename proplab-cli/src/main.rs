//! Proplab CLI — backtest sweeps under prop-firm constraints.
//!
//! Commands:
//! - `run` — sweep tickers × penalties, write per-run artifacts + results.csv
//! - `single` — one ticker at one penalty
//! - `compare` — pair IS/OOS results.csv files, emit tiered shortlists
//! - `config` — show the effective settings (and split boundaries for a ticker)
//!
//! Exit codes: 0 on success, 2 on configuration errors, 1 on aggregate
//! failure (no run in the batch succeeded).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use proplab_core::config::Config;
use proplab_core::fingerprint::config_fingerprint;
use proplab_core::resample::resample;
use proplab_core::split::split_boundaries;

use proplab_runner::batch::{run_batch, BatchEntry};
use proplab_runner::compare::{compare_pairs, OosEligibility, OosStatus};
use proplab_runner::data::{BarSource, CsvBarSource};
use proplab_runner::export::{
    load_results_csv, save_comparison_artifacts, save_results_csv, save_run_artifacts,
};
use proplab_runner::shortlist::{tiered_shortlists, TierConfig};
use proplab_runner::summary::RunSummary;

/// Default portfolio swept when no tickers are given.
const DEFAULT_TICKERS: &[&str] = &[
    "EURUSD=X", "GBPUSD=X", "USDJPY=X", "BTC-USD", "ETH-USD", "^GSPC", "^NDX", "GC=F", "CL=F",
    "BZ=F",
];

/// Default execution-penalty grid in ATR multiples.
const DEFAULT_PENALTIES: &[f64] = &[0.05, 0.10, 0.15, 0.20, 0.25];

#[derive(Parser)]
#[command(name = "proplab", about = "Breakout backtests under prop-firm risk constraints")]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of cached hourly OHLCV CSV files.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Output directory for artifacts.
    #[arg(long, global = true, default_value = "out")]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Backtest sweep over tickers x penalties.
    Run {
        /// Comma-separated tickers; the default portfolio when omitted.
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,
        /// Comma-separated penalties in ATR multiples.
        #[arg(long, value_delimiter = ',')]
        penalties: Vec<f64>,
    },
    /// One ticker at one penalty.
    Single {
        ticker: String,
        #[arg(long, default_value_t = 0.10)]
        penalty: f64,
    },
    /// Pair IS and OOS results and emit tiered shortlists.
    Compare {
        /// Directory holding the in-sample results.csv.
        #[arg(long)]
        is_dir: PathBuf,
        /// Directory holding the out-of-sample results.csv.
        #[arg(long)]
        oos_dir: PathBuf,
        /// Penalty level the shortlists are built at.
        #[arg(long, default_value_t = 0.25)]
        reference_penalty: f64,
    },
    /// Show the effective configuration.
    Config {
        /// Also preview the IS/OOS split boundaries for this ticker.
        #[arg(long)]
        ticker: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("configuration error: {err:#}");
            return ExitCode::from(2);
        }
    };

    match run_command(&cli, &cfg) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let cfg = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Config::from_toml_str(&text)?
        }
        None => Config::default(),
    };
    cfg.validate()?;
    Ok(cfg)
}

fn run_command(cli: &Cli, cfg: &Config) -> Result<ExitCode> {
    match &cli.command {
        Command::Run { tickers, penalties } => {
            let tickers = if tickers.is_empty() {
                DEFAULT_TICKERS.iter().map(|s| s.to_string()).collect()
            } else {
                tickers.clone()
            };
            let penalties = if penalties.is_empty() {
                DEFAULT_PENALTIES.to_vec()
            } else {
                penalties.clone()
            };

            let source = CsvBarSource::new(&cli.data_dir);
            let entries = run_batch(cfg, &source, &tickers, &penalties);
            finish_batch(cli, cfg, &entries)
        }

        Command::Single { ticker, penalty } => {
            let source = CsvBarSource::new(&cli.data_dir);
            let entries = run_batch(cfg, &source, &[ticker.clone()], &[*penalty]);
            finish_batch(cli, cfg, &entries)
        }

        Command::Compare {
            is_dir,
            oos_dir,
            reference_penalty,
        } => {
            let is_rows = load_results_csv(&is_dir.join("results.csv"))?;
            let oos_rows = load_results_csv(&oos_dir.join("results.csv"))?;

            let criteria = OosEligibility::default();
            let full = compare_pairs(&is_rows, &oos_rows, &criteria, None);
            let reference = compare_pairs(&is_rows, &oos_rows, &criteria, Some(*reference_penalty));
            let tiers = tiered_shortlists(&reference, &TierConfig::default());

            save_comparison_artifacts(&cli.output, &full, &reference, &tiers)?;
            print_comparison(&full);
            print_shortlists(&tiers);
            println!("\nReports written to {}", cli.output.display());
            Ok(ExitCode::SUCCESS)
        }

        Command::Config { ticker } => {
            println!("{}", toml::to_string_pretty(cfg)?);
            println!("fingerprint = \"{}\"", config_fingerprint(cfg));

            if let Some(ticker) = ticker {
                let source = CsvBarSource::new(&cli.data_dir);
                let bars = source.load(ticker)?;
                let coarse = resample(&bars, cfg.timeframe);
                let bounds = split_boundaries(&coarse, cfg.split_ratio);
                println!(
                    "\nsplit preview for {ticker} ({} {} bars, ratio {:.0}%):",
                    bounds.total_bars,
                    cfg.timeframe,
                    bounds.ratio * 100.0
                );
                println!(
                    "  IS : {} bars  {} -> {}",
                    bounds.is_window.bars,
                    bounds.is_window.start.as_deref().unwrap_or("-"),
                    bounds.is_window.end.as_deref().unwrap_or("-"),
                );
                println!(
                    "  OOS: {} bars  {} -> {}",
                    bounds.oos_window.bars,
                    bounds.oos_window.start.as_deref().unwrap_or("-"),
                    bounds.oos_window.end.as_deref().unwrap_or("-"),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Persist batch artifacts, print the summary table, pick the exit code.
fn finish_batch(cli: &Cli, cfg: &Config, entries: &[BatchEntry]) -> Result<ExitCode> {
    let summaries: Vec<RunSummary> = entries.iter().map(|e| e.to_summary()).collect();

    for entry in entries {
        if let Ok(out) = &entry.result {
            save_run_artifacts(&cli.output, out, cfg)?;
        }
    }
    save_results_csv(&cli.output, &summaries)?;

    for s in &summaries {
        if s.is_ok() {
            println!(
                "{:>12} | PEN {:.2} | trades {:>4} | WR {:.3} | PF {:>6.3} | ExpR {:>+.3} | DDmax {:.2}%",
                s.ticker,
                s.penalty_atr,
                s.n_trades,
                s.win_rate,
                s.profit_factor,
                s.expectancy_r,
                s.max_daily_dd_pct * 100.0
            );
        } else {
            println!("{:>12} | PEN {:.2} | FAILED: {}", s.ticker, s.penalty_atr, s.error);
        }
    }

    print_penalty_rollup(&summaries);
    println!("\nArtifacts written to {}", cli.output.display());

    let ok = summaries.iter().filter(|s| s.is_ok()).count();
    if ok == 0 && !summaries.is_empty() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Mean expectancy / PF / trade count per penalty level across the batch.
fn print_penalty_rollup(summaries: &[RunSummary]) {
    let mut penalties: Vec<f64> = summaries
        .iter()
        .filter(|s| s.is_ok())
        .map(|s| s.penalty_atr)
        .collect();
    penalties.sort_by(|a, b| a.partial_cmp(b).expect("penalty is never NaN"));
    penalties.dedup();
    if penalties.len() < 2 {
        return;
    }

    println!("\nPer-penalty rollup:");
    for penalty in penalties {
        let rows: Vec<&RunSummary> = summaries
            .iter()
            .filter(|s| s.is_ok() && s.penalty_atr == penalty)
            .collect();
        let n = rows.len() as f64;
        let mean_exp: f64 = rows.iter().map(|s| s.expectancy_r).sum::<f64>() / n;
        let finite_pf: Vec<f64> = rows
            .iter()
            .map(|s| s.profit_factor)
            .filter(|pf| pf.is_finite())
            .collect();
        let mean_pf = if finite_pf.is_empty() {
            0.0
        } else {
            finite_pf.iter().sum::<f64>() / finite_pf.len() as f64
        };
        let trades: usize = rows.iter().map(|s| s.n_trades).sum();
        println!(
            "  PEN {penalty:.2} | runs {:>3} | trades {trades:>5} | mean ExpR {mean_exp:>+.3} | mean PF {mean_pf:.3}",
            rows.len()
        );
    }
}

fn print_comparison(pairs: &[proplab_runner::compare::PairRow]) {
    let total = pairs.len();
    if total == 0 {
        println!("No comparable ticker x penalty pairs.");
        return;
    }
    let count = |status: OosStatus| pairs.iter().filter(|p| p.oos_status == status).count();

    println!("\nIS/OOS comparison - {total} ticker x penalty pairs");
    println!("  valid:               {}", count(OosStatus::Valid));
    println!("  insufficient trades: {}", count(OosStatus::InsufficientTrades));
    println!("  degraded:            {}", count(OosStatus::Degraded));
    println!("  failed:              {}", count(OosStatus::Failed));

    for p in pairs.iter().filter(|p| p.oos_status == OosStatus::Valid) {
        println!(
            "  + {:>12} PEN {:.2} | IS {:>3}t ExpR {:>+.3} | OOS {:>3}t ExpR {:>+.3}",
            p.ticker, p.penalty, p.is_trades, p.is_expectancy, p.oos_trades, p.oos_expectancy
        );
    }
}

fn print_shortlists(tiers: &proplab_runner::shortlist::TieredShortlists) {
    let print_tier = |label: &str, rows: &[proplab_runner::shortlist::ScoredRow]| {
        if rows.is_empty() {
            println!("\n{label}: no tickers");
            return;
        }
        println!("\n{label} ({} tickers):", rows.len());
        for s in rows {
            let p = &s.pair;
            println!(
                "  {:>12} | score {:>6.3} | OOS {:>2}t ExpR {:>+.3} PF {:.2} DD {:.2}%",
                p.ticker,
                s.oos_score,
                p.oos_trades,
                p.oos_expectancy,
                p.oos_pf,
                p.oos_dd * 100.0
            );
        }
    };

    print_tier("Tier 1 - funded (>=15 OOS trades)", &tiers.tier1);
    print_tier("Tier 2 - challenge bonus (>=10 OOS trades)", &tiers.tier2);
    println!(
        "\nTradable universe: {} instruments",
        tiers.tradable.len()
    );
}
