//! The bar-driven backtest engine.
//!
//! One engine instance owns all mutable state for exactly one
//! `(ticker, penalty)` run: balance, open positions, the single pending
//! order, the prop simulator and the output ledgers. The loop is strictly
//! synchronous and bar-sequential; given identical inputs the output is
//! bit-identical.
//!
//! Per coarse bar, in order: mark-to-market equity, day rollover, equity
//! bookkeeping (min/peak/violations/kill-switch), equity sample, fills and
//! exits (intrabar replay when the finer series is supplied, otherwise the
//! coarse fallback), then the signal recompute that places, replaces or
//! cancels the pending order.

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::config::{Config, DailyEquityMode, EntryFilter, ExitMode};
use crate::domain::{Bar, Direction, ExitReason, PendingOrder, Position, Signal, TradeRecord};
use crate::prop::PropSimulator;
use crate::split::SplitInfo;
use crate::strategy::{EnrichedSeries, Strategy};

use super::intrabar::IntrabarIndex;
use super::output::{DailyRow, EquityPoint, RunOutput};

/// Bar-loop engine for a single `(ticker, penalty)` run.
pub struct BacktestEngine<'a> {
    cfg: &'a Config,
    strategy: &'a dyn Strategy,
    ticker: String,
    penalty_atr: f64,

    balance: f64,
    open_positions: Vec<Position>,
    pending_order: Option<PendingOrder>,
    prop_sim: PropSimulator,

    trades: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,
    daily_stats: Vec<DailyRow>,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(cfg: &'a Config, strategy: &'a dyn Strategy, ticker: &str, penalty_atr: f64) -> Self {
        Self {
            cfg,
            strategy,
            ticker: ticker.to_string(),
            penalty_atr,
            balance: cfg.start_balance,
            open_positions: Vec::new(),
            pending_order: None,
            prop_sim: PropSimulator::new(cfg),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            daily_stats: Vec::new(),
        }
    }

    /// Run the backtest over the coarse series, replaying each coarse bar
    /// through its finer sub-bars when `fine` is supplied. Consumes the
    /// engine: one run per instance.
    ///
    /// Empty history is an empty result, not an error.
    pub fn run(mut self, coarse: Vec<Bar>, fine: Option<&[Bar]>, split: Option<SplitInfo>) -> RunOutput {
        let n_bars = coarse.len();
        self.equity_curve.reserve(n_bars);

        let intrabar = fine.map(|f| IntrabarIndex::build(&coarse, f, self.cfg.timeframe));
        let series = self.strategy.prepare_indicators(coarse);

        for bar_idx in 0..series.len() {
            let bar = &series.bars[bar_idx];
            let day = bar.day();

            // Mark-to-market before anything else touches state.
            let equity = self.compute_equity(bar);

            // Day rollover: flush yesterday, reset counters, new start equity.
            if self.prop_sim.daily.current_day != Some(day) {
                self.flush_day();
                self.prop_sim.on_new_day(day, equity);
            }

            // Min-equity, peak, violation counters, kill-switch.
            self.prop_sim.update_equity(equity, day);

            self.equity_curve.push(EquityPoint {
                ts: bar.ts,
                balance: self.balance,
                equity,
                dd_global: self.prop_sim.global_dd(equity),
                dd_daily: self.prop_sim.daily.daily_dd(),
                halted: self.prop_sim.is_halted(),
            });

            // Fills and exits.
            match (&intrabar, fine) {
                (Some(index), Some(fine_bars)) => {
                    for sub_idx in index.range(bar_idx) {
                        self.process_sub_bar(&fine_bars[sub_idx], bar_idx);
                    }
                }
                _ => self.process_coarse_bar(bar_idx, &series),
            }

            // Signal recompute: the channel moves, the stop follows.
            self.update_signal(&series, bar_idx);
        }

        if self.cfg.close_at_end {
            self.close_remaining_at_end(&series);
        }

        self.flush_day();

        debug!(
            ticker = %self.ticker,
            penalty = self.penalty_atr,
            bars = n_bars,
            trades = self.trades.len(),
            "run complete"
        );

        RunOutput {
            ticker: self.ticker,
            penalty_atr: self.penalty_atr,
            bars: n_bars,
            end_balance: self.balance,
            trades: self.trades,
            equity_curve: self.equity_curve,
            daily_stats: self.daily_stats,
            violations: self.prop_sim.violations,
            split,
        }
    }

    // ─── Equity ─────────────────────────────────────────────────────

    /// Balance plus the unrealized R of every open position, marked at the
    /// configured price reference.
    fn compute_equity(&self, bar: &Bar) -> f64 {
        if self.open_positions.is_empty() {
            return self.balance;
        }
        let unrealized: f64 = self
            .open_positions
            .iter()
            .map(|pos| {
                let ref_price = match self.cfg.daily_equity_mode {
                    DailyEquityMode::Close => bar.close,
                    DailyEquityMode::Worst => match pos.direction {
                        Direction::Long => bar.low,
                        Direction::Short => bar.high,
                    },
                };
                pos.unrealized_r(ref_price) * pos.risk_cash
            })
            .sum();
        self.balance + unrealized
    }

    // ─── Exits ──────────────────────────────────────────────────────

    /// Evaluate all open positions against one bar and close the ones that
    /// fired. `open_price` selects the coarse-path ambiguity heuristic.
    fn process_exits(
        &mut self,
        high: f64,
        low: f64,
        open_price: Option<f64>,
        ts: DateTime<FixedOffset>,
        bar_idx: usize,
    ) {
        let mut closed_any = false;
        let mut i = 0;
        while i < self.open_positions.len() {
            let fired = self.open_positions[i].check_exit(
                high,
                low,
                self.cfg.conservative_same_bar,
                open_price,
            );
            match fired {
                Some((reason, price)) => {
                    self.close_position(i, reason, price, ts, bar_idx);
                    closed_any = true;
                }
                None => i += 1,
            }
        }
        // Realized losses can push the day's minimum below any bar sample.
        if closed_any {
            self.prop_sim.daily.update_min_equity(self.balance);
        }
    }

    fn close_position(
        &mut self,
        pos_idx: usize,
        reason: ExitReason,
        raw_exit: f64,
        ts: DateTime<FixedOffset>,
        bar_idx: usize,
    ) {
        let pos = self.open_positions.remove(pos_idx);
        debug_assert!(pos.risk_points() > 0.0, "position opened with zero risk");
        let exit_price = self.apply_slip(raw_exit, reason, pos.direction);

        let result_r = pos.pnl_r(exit_price);
        let result_cash = result_r * pos.risk_cash;
        self.balance += result_cash;

        self.trades.push(TradeRecord {
            ticker: self.ticker.clone(),
            penalty_atr: self.penalty_atr,
            direction: pos.direction,
            ts_signal: pos.ts_signal,
            ts_entry: pos.ts_entry,
            ts_exit: ts,
            entry: pos.entry,
            sl: pos.sl,
            tp: pos.tp,
            exit_price,
            exit_reason: reason,
            atr_signal: pos.atr_signal,
            result_r,
            result_cash,
            balance_after: self.balance,
            duration_bars: bar_idx - pos.entry_bar_idx,
        });

        self.prop_sim.on_trade_closed(result_r, self.balance);
    }

    /// Worsen an SL/TP/TRAIL fill against the trade when slip_penalty is on.
    fn apply_slip(&self, price: f64, reason: ExitReason, direction: Direction) -> f64 {
        if self.cfg.slip_penalty <= 0.0 || reason == ExitReason::CloseEnd {
            return price;
        }
        price * (1.0 - self.cfg.slip_penalty * direction.sign())
    }

    // ─── Fills ──────────────────────────────────────────────────────

    /// Test the pending order against one bar's range. A trigger always
    /// consumes the order; halts, failed confirmation and degenerate risk
    /// all skip the fill silently.
    ///
    /// Returns the index of the newly opened position, if any.
    fn process_pending(&mut self, bar: &Bar, bar_idx: usize) -> Option<usize> {
        let pending = self.pending_order.as_ref()?;
        if !pending.is_triggered(bar.high, bar.low) {
            return None;
        }
        let pending = self.pending_order.take().expect("pending checked above");

        if self.prop_sim.is_halted() {
            return None;
        }
        if !self.entry_confirmed(&pending, bar) {
            return None;
        }

        let signal = Signal {
            direction: pending.direction,
            entry_level: pending.entry_level,
            atr_at_signal: pending.atr_signal,
            ts: pending.ts_signal,
            expiry_bars: self.cfg.order_valid_bars,
        };
        let levels = self.strategy.compute_entry_sl_tp(&signal, self.penalty_atr);

        let risk_points = (levels.entry - levels.sl).abs();
        if risk_points <= 0.0 {
            return None;
        }

        let trailing_distance = match self.cfg.exit_mode {
            ExitMode::TrailingAtr => self.cfg.trailing_atr * pending.atr_signal,
            ExitMode::Fixed => 0.0,
        };
        let trailing_activation_price = if trailing_distance > 0.0 && self.cfg.trailing_activation_r > 0.0
        {
            levels.entry + pending.direction.sign() * self.cfg.trailing_activation_r * risk_points
        } else {
            0.0
        };

        self.open_positions.push(Position {
            direction: pending.direction,
            entry: levels.entry,
            sl: levels.sl,
            tp: levels.tp,
            ts_signal: pending.ts_signal,
            ts_entry: bar.ts,
            atr_signal: pending.atr_signal,
            entry_bar_idx: bar_idx,
            risk_cash: self.balance * self.cfg.risk_per_trade,
            best_price: levels.entry,
            trailing_sl: None,
            trailing_distance,
            trailing_activation_price,
        });
        Some(self.open_positions.len() - 1)
    }

    /// Entry-refinement gate on the triggering bar.
    fn entry_confirmed(&self, pending: &PendingOrder, bar: &Bar) -> bool {
        match self.cfg.entry_filter {
            EntryFilter::None => true,
            EntryFilter::CloseConfirms => {
                let margin = self.cfg.entry_body_pct * pending.atr_signal;
                match pending.direction {
                    Direction::Long => bar.close >= pending.entry_level + margin,
                    Direction::Short => bar.close <= pending.entry_level - margin,
                }
            }
            EntryFilter::BodyRatio => {
                let range = bar.high - bar.low;
                if range <= 0.0 {
                    return false;
                }
                let body = match pending.direction {
                    Direction::Long => bar.close - bar.open,
                    Direction::Short => bar.open - bar.close,
                };
                body > 0.0 && body / range >= self.cfg.entry_body_pct
            }
        }
    }

    // ─── Per-bar execution paths ────────────────────────────────────

    /// Intrabar path: exits first, then the pending trigger, then an
    /// immediate exit re-check on the entry sub-bar — an hourly bar can
    /// touch the entry and then the stop before the next bar begins.
    fn process_sub_bar(&mut self, sub: &Bar, coarse_idx: usize) {
        self.process_exits(sub.high, sub.low, None, sub.ts, coarse_idx);

        if let Some(new_idx) = self.process_pending(sub, coarse_idx) {
            let fired = self.open_positions[new_idx].check_exit(
                sub.high,
                sub.low,
                self.cfg.conservative_same_bar,
                None,
            );
            if let Some((reason, price)) = fired {
                self.close_position(new_idx, reason, price, sub.ts, coarse_idx);
                self.prop_sim.daily.update_min_equity(self.balance);
            }
        }
    }

    /// Coarse fallback: the open price feeds the same-bar heuristic, and a
    /// position opened on the trigger bar survives it — the adverse dip of
    /// a breakout bar typically forms before the channel breaks.
    fn process_coarse_bar(&mut self, bar_idx: usize, series: &EnrichedSeries) {
        let bar = &series.bars[bar_idx];
        self.process_exits(bar.high, bar.low, Some(bar.open), bar.ts, bar_idx);
        self.process_pending(bar, bar_idx);
    }

    // ─── Signal recompute ───────────────────────────────────────────

    fn update_signal(&mut self, series: &EnrichedSeries, bar_idx: usize) {
        if self.prop_sim.is_halted() {
            self.pending_order = None;
            return;
        }
        if self.cfg.max_concurrent_trades > 0
            && self.open_positions.len() >= self.cfg.max_concurrent_trades
        {
            self.pending_order = None;
            return;
        }
        // Always adopt the latest level; stale orders are cancelled.
        self.pending_order = self
            .strategy
            .generate_signal(series, bar_idx)
            .map(|signal| PendingOrder::from_signal(&signal, bar_idx));
    }

    // ─── Day / end-of-history bookkeeping ───────────────────────────

    fn flush_day(&mut self) {
        if let Some(date) = self.prop_sim.daily.current_day {
            self.daily_stats.push(DailyRow {
                date,
                start_equity: self.prop_sim.daily.start_equity,
                min_equity: self.prop_sim.daily.min_equity,
                max_daily_dd_pct: self.prop_sim.daily.daily_dd(),
                losses_closed: self.prop_sim.daily.losses_closed,
                halted: self.prop_sim.daily.halted,
            });
        }
    }

    /// CLOSE_END variant: mark anything still open to the last bar's close.
    fn close_remaining_at_end(&mut self, series: &EnrichedSeries) {
        let Some(last) = series.bars.last() else {
            return;
        };
        let last_idx = series.len() - 1;
        while !self.open_positions.is_empty() {
            self.close_position(0, ExitReason::CloseEnd, last.close, last.ts, last_idx);
        }
        self.prop_sim.daily.update_min_equity(self.balance);
    }
}
