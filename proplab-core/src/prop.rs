//! Prop-firm rule simulation — daily/global drawdown tracking, violation
//! counters and the authoritative halt conditions.
//!
//! Two scales of drawdown are tracked: daily (from each day's starting
//! equity to its minimum) and global (from the monotone peak). FTMO/GFT
//! caps and the global max-loss feed counters only; the kill-switch and the
//! consecutive-loss limit actually halt new entries for the rest of the day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Per-day drawdown tracking state. Reset at every local-day transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyState {
    pub current_day: Option<NaiveDate>,
    pub start_equity: f64,
    pub min_equity: f64,
    pub losses_closed: usize,
    pub halted: bool,
}

impl DailyState {
    pub fn reset(&mut self, day: NaiveDate, equity: f64) {
        self.current_day = Some(day);
        self.start_equity = equity;
        self.min_equity = equity;
        self.losses_closed = 0;
        self.halted = false;
    }

    pub fn update_min_equity(&mut self, equity: f64) {
        if equity < self.min_equity {
            self.min_equity = equity;
        }
    }

    /// Daily drawdown as a fraction of the day's starting equity.
    pub fn daily_dd(&self) -> f64 {
        if self.start_equity <= 0.0 {
            return 0.0;
        }
        (self.start_equity - self.min_equity) / self.start_equity
    }
}

/// Informational violation counters, reported in the run summary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ViolationCounters {
    pub ftmo_bars: usize,
    pub gft_bars: usize,
    pub total_bars: usize,
}

/// The prop-firm rule simulator owned by one engine run.
#[derive(Debug, Clone)]
pub struct PropSimulator {
    daily_dd_ftmo: f64,
    daily_dd_gft: f64,
    max_loss: f64,
    daily_kill_switch: f64,
    stop_after_n_losses: usize,

    pub daily: DailyState,
    pub peak_equity: f64,
    pub violations: ViolationCounters,
}

impl PropSimulator {
    pub fn new(cfg: &Config) -> Self {
        Self {
            daily_dd_ftmo: cfg.daily_dd_ftmo,
            daily_dd_gft: cfg.daily_dd_gft,
            max_loss: cfg.max_loss,
            daily_kill_switch: cfg.daily_kill_switch,
            stop_after_n_losses: cfg.stop_after_n_losses,
            daily: DailyState::default(),
            peak_equity: cfg.start_balance,
            violations: ViolationCounters::default(),
        }
    }

    /// New entries blocked for the rest of the day?
    pub fn is_halted(&self) -> bool {
        self.daily.halted
    }

    /// Global drawdown from the monotone peak.
    pub fn global_dd(&self, equity: f64) -> f64 {
        if self.peak_equity <= 0.0 {
            return 0.0;
        }
        (self.peak_equity - equity) / self.peak_equity
    }

    /// Day transition: start the new day from this equity sample.
    pub fn on_new_day(&mut self, day: NaiveDate, equity: f64) {
        self.daily.reset(day, equity);
    }

    /// Per-bar equity sample: update min/peak, count violations, and trip
    /// the kill-switch when the daily drawdown reaches the threshold.
    pub fn update_equity(&mut self, equity: f64, day: NaiveDate) {
        match self.daily.current_day {
            Some(current) if current == day => {}
            _ => {
                self.on_new_day(day, equity);
                return;
            }
        }

        self.daily.update_min_equity(equity);
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }

        let daily_dd = self.daily.daily_dd();
        if daily_dd > self.daily_dd_ftmo {
            self.violations.ftmo_bars += 1;
        }
        if daily_dd > self.daily_dd_gft {
            self.violations.gft_bars += 1;
        }
        if self.global_dd(equity) > self.max_loss {
            self.violations.total_bars += 1;
        }

        if daily_dd >= self.daily_kill_switch {
            self.daily.halted = true;
        }
    }

    /// Trade-close hook: count same-day losses and re-check the kill-switch
    /// against the realized balance.
    pub fn on_trade_closed(&mut self, result_r: f64, balance: f64) {
        if result_r < 0.0 {
            self.daily.losses_closed += 1;
            if self.daily.losses_closed >= self.stop_after_n_losses {
                self.daily.halted = true;
            }
        }

        self.daily.update_min_equity(balance);
        if self.daily.daily_dd() >= self.daily_kill_switch {
            self.daily.halted = true;
        }
    }
}
