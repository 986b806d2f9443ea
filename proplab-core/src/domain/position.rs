//! Pending orders and open positions, with exit detection.
//!
//! `Position::check_exit` owns the subtle part of the engine: deciding which
//! of SL and TP fired when a single bar touches both. On the coarse path the
//! bar's open is available and a path-plausibility heuristic arbitrates; on
//! the intrabar path the `conservative_same_bar` convention applies.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::signal::{Direction, Signal};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Sl,
    Tp,
    Trail,
    CloseEnd,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Sl => write!(f, "SL"),
            ExitReason::Tp => write!(f, "TP"),
            ExitReason::Trail => write!(f, "TRAIL"),
            ExitReason::CloseEnd => write!(f, "CLOSE_END"),
        }
    }
}

/// SL-first path length must exceed this multiple of the bar's range for
/// SL-first to be ruled implausible (and TP to win the ambiguous bar).
const PATH_PLAUSIBILITY_FACTOR: f64 = 1.5;

/// A stop order waiting for price to cross its entry level.
///
/// At most one exists per instrument; the signal recompute replaces or
/// cancels it every bar, so `expiry_bar_idx` is informational in practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub direction: Direction,
    pub entry_level: f64,
    pub ts_signal: DateTime<FixedOffset>,
    pub atr_signal: f64,
    pub expiry_bar_idx: usize,
}

impl PendingOrder {
    pub fn from_signal(signal: &Signal, current_bar_idx: usize) -> Self {
        Self {
            direction: signal.direction,
            entry_level: signal.entry_level,
            ts_signal: signal.ts,
            atr_signal: signal.atr_at_signal,
            expiry_bar_idx: current_bar_idx + signal.expiry_bars,
        }
    }

    pub fn is_expired(&self, current_bar_idx: usize) -> bool {
        current_bar_idx > self.expiry_bar_idx
    }

    /// A stop entry triggers when the bar's range reaches the level.
    pub fn is_triggered(&self, high: f64, low: f64) -> bool {
        match self.direction {
            Direction::Long => high >= self.entry_level,
            Direction::Short => low <= self.entry_level,
        }
    }
}

/// An open position with independent stop, take-profit and trailing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry: f64,
    /// Initial stop-loss. Never mutated; the trailing stop layers on top.
    pub sl: f64,
    /// Take-profit level; 0.0 means disabled.
    pub tp: f64,
    pub ts_signal: DateTime<FixedOffset>,
    pub ts_entry: DateTime<FixedOffset>,
    pub atr_signal: f64,
    pub entry_bar_idx: usize,
    pub risk_cash: f64,
    /// Running favorable extreme since entry (high for long, low for short).
    pub best_price: f64,
    /// Ratcheted trailing stop. None until the trail first arms.
    pub trailing_sl: Option<f64>,
    /// Trail distance in price points; 0.0 disables trailing.
    pub trailing_distance: f64,
    /// Price the trade must reach before the trail arms; 0.0 = immediate.
    pub trailing_activation_price: f64,
}

impl Position {
    /// Distance entry → initial SL in price points.
    pub fn risk_points(&self) -> f64 {
        (self.entry - self.sl).abs()
    }

    pub fn tp_active(&self) -> bool {
        self.tp > 0.0
    }

    /// P&L in R-multiples at the given exit price.
    pub fn pnl_r(&self, exit_price: f64) -> f64 {
        let risk = self.risk_points();
        if risk <= 0.0 {
            return 0.0;
        }
        (exit_price - self.entry) * self.direction.sign() / risk
    }

    /// Unrealized P&L in R at a mark price. Same formula as a realized exit.
    pub fn unrealized_r(&self, mark_price: f64) -> f64 {
        self.pnl_r(mark_price)
    }

    /// The stop that protects the position right now: the better of the
    /// initial SL and the trailing SL. Monotone favorable by construction.
    pub fn effective_sl(&self) -> f64 {
        match (self.direction, self.trailing_sl) {
            (Direction::Long, Some(t)) => t.max(self.sl),
            (Direction::Short, Some(t)) => t.min(self.sl),
            (_, None) => self.sl,
        }
    }

    /// True when the stop that would fire is the trailing one.
    fn trailing_governs(&self) -> bool {
        match (self.direction, self.trailing_sl) {
            (Direction::Long, Some(t)) => t > self.sl,
            (Direction::Short, Some(t)) => t < self.sl,
            (_, None) => false,
        }
    }

    /// Ratchet the trailing stop with the bar's extremes. The trail never
    /// retreats; before the activation price is reached it stays unarmed.
    pub fn update_trailing(&mut self, high: f64, low: f64) {
        if self.trailing_distance <= 0.0 {
            return;
        }
        match self.direction {
            Direction::Long => {
                if high > self.best_price {
                    self.best_price = high;
                }
                if self.trailing_activation_price > 0.0
                    && self.best_price < self.trailing_activation_price
                {
                    return;
                }
                let candidate = self.best_price - self.trailing_distance;
                self.trailing_sl = Some(match self.trailing_sl {
                    Some(t) => t.max(candidate),
                    None => candidate,
                });
            }
            Direction::Short => {
                if low < self.best_price {
                    self.best_price = low;
                }
                if self.trailing_activation_price > 0.0
                    && self.best_price > self.trailing_activation_price
                {
                    return;
                }
                let candidate = self.best_price + self.trailing_distance;
                self.trailing_sl = Some(match self.trailing_sl {
                    Some(t) => t.min(candidate),
                    None => candidate,
                });
            }
        }
    }

    /// Check whether this bar closes the position.
    ///
    /// The stop is evaluated as it stood when the bar opened; this bar's
    /// extremes ratchet the trail only for the bars that follow. A trail can
    /// therefore never be set and hit by the same bar that created it.
    ///
    /// `open_price` is the coarse-bar open when evaluating on the trading
    /// timeframe; the intrabar path passes `None` and falls back to the
    /// `conservative` convention on a same-bar double-fire.
    ///
    /// Returns the exit reason and fill price, or `None`.
    pub fn check_exit(
        &mut self,
        high: f64,
        low: f64,
        conservative: bool,
        open_price: Option<f64>,
    ) -> Option<(ExitReason, f64)> {
        let eff_sl = self.effective_sl();
        let sl_reason = if self.trailing_governs() {
            ExitReason::Trail
        } else {
            ExitReason::Sl
        };
        self.update_trailing(high, low);

        let (mut hit_sl, mut hit_tp) = match self.direction {
            Direction::Long => (low <= eff_sl, self.tp_active() && high >= self.tp),
            Direction::Short => (high >= eff_sl, self.tp_active() && low <= self.tp),
        };

        if hit_sl && hit_tp {
            match open_price {
                Some(open) => {
                    // Path plausibility: how far price must travel if it hit
                    // the stop before the target. An SL-first path longer than
                    // PATH_PLAUSIBILITY_FACTOR x the bar's range is ruled out
                    // and the target wins; ties go to the stop.
                    let sl_first_path = match self.direction {
                        Direction::Long => (open - eff_sl).max(0.0) + (self.tp - eff_sl),
                        Direction::Short => (eff_sl - open).max(0.0) + (eff_sl - self.tp),
                    };
                    if sl_first_path > PATH_PLAUSIBILITY_FACTOR * (high - low) {
                        hit_sl = false;
                    } else {
                        hit_tp = false;
                    }
                }
                None => {
                    if conservative {
                        hit_tp = false;
                    } else {
                        hit_sl = false;
                    }
                }
            }
        }

        if hit_sl {
            return Some((sl_reason, eff_sl));
        }
        if hit_tp {
            return Some((ExitReason::Tp, self.tp));
        }
        None
    }
}
