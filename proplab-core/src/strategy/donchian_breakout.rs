//! Donchian breakout strategy — EMA trend filter, rolling volatility gate,
//! and a channel-edge stop entry.
//!
//! The production rule is proactive: while price trades *inside* the channel
//! but within `proximity_atr` ATR of its edge, the stop is pre-placed on the
//! breakout level and re-emitted every bar so it tracks the drifting channel.
//! The legacy rule (kept for the diagnostic grid) only signals after the
//! close has already crossed the channel.

use crate::config::Config;
use crate::domain::{Bar, Direction, Signal};
use crate::indicators::{atr, donchian, ema, rolling_quantile};

use super::{EnrichedSeries, EntryLevels, Strategy};

/// Which signal rule variant drives the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalRule {
    /// Stop pre-placed on the channel edge before the breakout.
    ProactiveStop,
    /// Signal only once the close has crossed the channel.
    LegacyClose,
}

#[derive(Debug, Clone)]
pub struct DonchianBreakout {
    cfg: Config,
    rule: SignalRule,
}

impl DonchianBreakout {
    pub fn proactive(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            rule: SignalRule::ProactiveStop,
        }
    }

    pub fn legacy_close(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            rule: SignalRule::LegacyClose,
        }
    }

    pub fn rule(&self) -> SignalRule {
        self.rule
    }

    fn make_signal(&self, direction: Direction, entry_level: f64, atr: f64, bar: &Bar) -> Signal {
        Signal {
            direction,
            entry_level,
            atr_at_signal: atr,
            ts: bar.ts,
            expiry_bars: self.cfg.order_valid_bars,
        }
    }
}

impl Strategy for DonchianBreakout {
    fn prepare_indicators(&self, bars: Vec<Bar>) -> EnrichedSeries {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let ema_col = ema(&closes, self.cfg.ema_period);
        let atr_col = atr(&bars, self.cfg.atr_period);
        let atr_rel: Vec<f64> = atr_col
            .iter()
            .zip(&closes)
            .map(|(&a, &c)| a / c)
            .collect();
        let (d_high, d_low) = donchian(&bars, self.cfg.donchian_n, 1);
        let atr_rel_q = rolling_quantile(&atr_rel, self.cfg.vol_window_bars, self.cfg.vol_quantile);
        // NaN on either side compares false, so the warm-up region is gated out.
        let vol_ok: Vec<bool> = atr_rel
            .iter()
            .zip(&atr_rel_q)
            .map(|(&rel, &q)| rel <= q)
            .collect();

        EnrichedSeries {
            bars,
            ema: ema_col,
            atr: atr_col,
            atr_rel,
            d_high,
            d_low,
            atr_rel_q,
            vol_ok,
        }
    }

    fn generate_signal(&self, series: &EnrichedSeries, bar_idx: usize) -> Option<Signal> {
        if !series.indicators_ready(bar_idx) {
            return None;
        }
        let bar = &series.bars[bar_idx];
        if self.cfg.in_no_trade_window(bar.time()) {
            return None;
        }
        if !series.vol_ok[bar_idx] {
            return None;
        }

        let close = bar.close;
        let ema = series.ema[bar_idx];
        let atr = series.atr[bar_idx];
        let buffer = self.cfg.buffer_atr * atr;
        let prox = self.cfg.proximity_atr * atr;
        let breakout_long = series.d_high[bar_idx] + buffer;
        let breakout_short = series.d_low[bar_idx] - buffer;

        match self.rule {
            SignalRule::ProactiveStop => {
                if close > ema && close < breakout_long && breakout_long - close < prox {
                    return Some(self.make_signal(Direction::Long, breakout_long, atr, bar));
                }
                if close < ema && close > breakout_short && close - breakout_short < prox {
                    return Some(self.make_signal(Direction::Short, breakout_short, atr, bar));
                }
            }
            SignalRule::LegacyClose => {
                if close > ema && close > breakout_long {
                    return Some(self.make_signal(Direction::Long, breakout_long, atr, bar));
                }
                if close < ema && close < breakout_short {
                    return Some(self.make_signal(Direction::Short, breakout_short, atr, bar));
                }
            }
        }
        None
    }

    fn compute_entry_sl_tp(&self, signal: &Signal, penalty_atr: f64) -> EntryLevels {
        let penalty = penalty_atr * signal.atr_at_signal;
        let stop = self.cfg.sl_atr * signal.atr_at_signal;

        match signal.direction {
            Direction::Long => {
                let entry = signal.entry_level + penalty;
                let sl = entry - stop;
                let tp = if self.cfg.tp_r > 0.0 {
                    entry + self.cfg.tp_r * (entry - sl)
                } else {
                    0.0
                };
                EntryLevels { entry, sl, tp }
            }
            Direction::Short => {
                let entry = signal.entry_level - penalty;
                let sl = entry + stop;
                let tp = if self.cfg.tp_r > 0.0 {
                    entry - self.cfg.tp_r * (sl - entry)
                } else {
                    0.0
                };
                EntryLevels { entry, sl, tp }
            }
        }
    }
}
