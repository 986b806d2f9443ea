//! End-to-end engine scenarios driven through a scripted strategy.
//!
//! The engine depends only on the `Strategy` capability, so these tests
//! inject signals at known bars and feed hand-built price paths to pin down
//! fill, exit and halt semantics: clean TP/SL, the same-bar plausibility
//! heuristic, trailing ratchets, intrabar zero-duration trades and the daily
//! kill-switch.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, TimeZone};

use proplab_core::config::{Config, ExitMode, Timeframe};
use proplab_core::domain::{Bar, Direction, ExitReason, Signal};
use proplab_core::engine::BacktestEngine;
use proplab_core::resample::resample;
use proplab_core::strategy::{EnrichedSeries, EntryLevels, Strategy};

// ─── Test harness ────────────────────────────────────────────────────

fn tz() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap()
}

fn base_ts() -> DateTime<FixedOffset> {
    // 08:00 local: outside the default no-trade window, start of a 4h bucket.
    tz().with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()
}

/// Coarse 4h bars from (open, high, low, close) rows, 4h apart.
fn coarse_bars(rows: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            ts: base_ts() + Duration::hours(4 * i as i64),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        })
        .collect()
}

/// A strategy that emits pre-scripted signals at fixed bar indices and
/// computes entry/SL/TP with the standard penalty/ATR geometry.
struct ScriptedStrategy {
    cfg: Config,
    signals: HashMap<usize, (Direction, f64, f64)>, // idx -> (dir, level, atr)
}

impl ScriptedStrategy {
    fn new(cfg: &Config, signals: &[(usize, Direction, f64, f64)]) -> Self {
        Self {
            cfg: cfg.clone(),
            signals: signals
                .iter()
                .map(|&(idx, dir, level, atr)| (idx, (dir, level, atr)))
                .collect(),
        }
    }
}

impl Strategy for ScriptedStrategy {
    fn prepare_indicators(&self, bars: Vec<Bar>) -> EnrichedSeries {
        let n = bars.len();
        EnrichedSeries {
            bars,
            ema: vec![f64::NAN; n],
            atr: vec![f64::NAN; n],
            atr_rel: vec![f64::NAN; n],
            d_high: vec![f64::NAN; n],
            d_low: vec![f64::NAN; n],
            atr_rel_q: vec![f64::NAN; n],
            vol_ok: vec![false; n],
        }
    }

    fn generate_signal(&self, series: &EnrichedSeries, bar_idx: usize) -> Option<Signal> {
        self.signals
            .get(&bar_idx)
            .map(|&(direction, entry_level, atr)| Signal {
                direction,
                entry_level,
                atr_at_signal: atr,
                ts: series.bars[bar_idx].ts,
                expiry_bars: self.cfg.order_valid_bars,
            })
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

fn scenario_config() -> Config {
    Config {
        sl_atr: 1.0,
        tp_r: 1.0,
        buffer_atr: 0.0,
        risk_per_trade: 0.0025,
        ..Config::default()
    }
}

/// Signal at bar 0 (level 100, ATR 2), trigger on bar 1, scenario bar at 2.
/// Entry 100, SL 98, TP 102 with zero penalty.
fn run_exit_scenario(cfg: &Config, scenario_bar: (f64, f64, f64, f64)) -> proplab_core::engine::RunOutput {
    let strategy = ScriptedStrategy::new(cfg, &[(0, Direction::Long, 100.0, 2.0)]);
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),     // signal bar, no trigger
        (99.8, 100.3, 99.6, 100.1),   // trigger bar: entry at 100
        scenario_bar,
    ]);
    BacktestEngine::new(cfg, &strategy, "TEST", 0.0).run(bars, None, None)
}

// ─── Clean exits ─────────────────────────────────────────────────────

#[test]
fn long_hits_tp_cleanly() {
    let cfg = scenario_config();
    let out = run_exit_scenario(&cfg, (100.0, 103.0, 99.0, 102.5));

    assert_eq!(out.trades.len(), 1);
    let t = &out.trades[0];
    assert_eq!(t.entry, 100.0);
    assert_eq!(t.sl, 98.0);
    assert_eq!(t.tp, 102.0);
    assert_eq!(t.exit_reason, ExitReason::Tp);
    assert_eq!(t.exit_price, 102.0);
    assert_eq!(t.result_r, 1.0);
    assert_eq!(t.result_cash, 250.0);
    assert_eq!(out.end_balance, 100_250.0);
}

#[test]
fn long_hits_sl_cleanly() {
    let cfg = scenario_config();
    let out = run_exit_scenario(&cfg, (100.0, 101.0, 97.0, 98.5));

    assert_eq!(out.trades.len(), 1);
    let t = &out.trades[0];
    assert_eq!(t.exit_reason, ExitReason::Sl);
    assert_eq!(t.exit_price, 98.0);
    assert_eq!(t.result_r, -1.0);
    assert_eq!(out.end_balance, 99_750.0);
}

// ─── Same-bar ambiguity ──────────────────────────────────────────────

#[test]
fn ambiguous_bar_plausible_path_resolves_to_sl() {
    // SL-first path = max(0, 101-98) + (102-98) = 7; 1.5 x range = 9. SL wins.
    let cfg = scenario_config();
    let out = run_exit_scenario(&cfg, (101.0, 103.0, 97.0, 100.0));
    assert_eq!(out.trades[0].exit_reason, ExitReason::Sl);
    assert_eq!(out.trades[0].result_r, -1.0);
}

#[test]
fn ambiguous_bar_open_through_stop_still_resolves_to_sl() {
    // Path = max(0, 97.5-98) + 4 = 4 <= 9: the asymmetry is deliberate — the
    // heuristic only flips to TP when SL-first is implausible.
    let cfg = scenario_config();
    let out = run_exit_scenario(&cfg, (97.5, 103.0, 97.0, 100.0));
    assert_eq!(out.trades[0].exit_reason, ExitReason::Sl);
    assert_eq!(out.trades[0].result_r, -1.0);
}

#[test]
fn ambiguous_narrow_bar_resolves_to_tp() {
    // Path = max(0, 101.9-98) + 4 = 7.9 > 1.5 x (102.2-97.9) = 6.45: TP wins.
    let cfg = scenario_config();
    let out = run_exit_scenario(&cfg, (101.9, 102.2, 97.9, 102.0));
    assert_eq!(out.trades[0].exit_reason, ExitReason::Tp);
    assert_eq!(out.trades[0].result_r, 1.0);
}

// ─── Trailing stop ───────────────────────────────────────────────────

#[test]
fn trailing_ratchets_then_triggers() {
    let cfg = Config {
        exit_mode: ExitMode::TrailingAtr,
        trailing_atr: 3.0,
        tp_r: 0.0,
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(&cfg, &[(0, Direction::Long, 100.0, 2.0)]);
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),   // signal
        (99.8, 100.3, 99.6, 100.1), // trigger: entry 100, SL 98, trail dist 6
        (100.1, 110.0, 99.0, 109.0), // bar A: best 110, trail arms at 104
        (109.0, 108.0, 103.0, 104.5), // bar B: trail unchanged, low <= 104
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);

    assert_eq!(out.trades.len(), 1);
    let t = &out.trades[0];
    assert_eq!(t.exit_reason, ExitReason::Trail);
    assert_eq!(t.exit_price, 104.0);
    assert_eq!(t.result_r, 2.0);
    assert_eq!(t.duration_bars, 2);
}

// ─── Pending order lifecycle ─────────────────────────────────────────

#[test]
fn pending_order_tracks_the_latest_level() {
    // The recompute replaces the pending order; the old level must not fill.
    let cfg = scenario_config();
    let strategy = ScriptedStrategy::new(
        &cfg,
        &[
            (0, Direction::Long, 100.0, 2.0),
            (1, Direction::Long, 101.0, 2.0),
        ],
    );
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.6, 99.9, 99.2, 99.7),    // no trigger; level moves to 101
        (99.8, 100.5, 99.5, 100.2),  // crosses the stale 100, not 101
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);
    assert!(out.trades.is_empty());
}

#[test]
fn signal_gone_cancels_pending() {
    let cfg = scenario_config();
    // Signal only at bar 0; by bar 1 conditions no longer hold.
    let strategy = ScriptedStrategy::new(&cfg, &[(0, Direction::Long, 100.0, 2.0)]);
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.6, 99.9, 99.2, 99.7),   // recompute cancels the pending order
        (99.8, 100.5, 99.5, 100.2), // would have triggered the old level
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);
    assert!(out.trades.is_empty());
}

#[test]
fn max_concurrent_trades_caps_stacking() {
    let cfg = Config {
        max_concurrent_trades: 1,
        tp_r: 0.0, // no SL/TP exits: positions survive to the end
        close_at_end: true,
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(
        &cfg,
        &[
            (0, Direction::Long, 100.0, 2.0),
            (1, Direction::Long, 100.0, 2.0),
            (2, Direction::Long, 100.0, 2.0),
        ],
    );
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1),  // fills position #1
        (100.1, 100.6, 99.8, 100.3), // would fill again without the cap
        (100.3, 100.8, 99.9, 100.4),
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);
    // Exactly one position ever existed; the later triggers were suppressed.
    assert_eq!(out.trades.len(), 1);
    assert_eq!(out.trades[0].exit_reason, ExitReason::CloseEnd);
    assert_eq!(out.equity_curve.len(), 4);
}

#[test]
fn stacking_allowed_when_uncapped() {
    let cfg = Config {
        tp_r: 0.0,
        close_at_end: true, // flush both stacked positions into the ledger
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(
        &cfg,
        &[
            (0, Direction::Long, 100.0, 2.0),
            (1, Direction::Long, 100.5, 2.0),
        ],
    );
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1),   // fills #1 at 100
        (100.1, 100.8, 99.9, 100.6),  // fills #2 at 100.5
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);
    assert_eq!(out.trades.len(), 2);
    assert!(out
        .trades
        .iter()
        .all(|t| t.exit_reason == ExitReason::CloseEnd));
}

// ─── Entry filters ───────────────────────────────────────────────────

#[test]
fn close_confirms_filter_rejects_weak_trigger() {
    use proplab_core::config::EntryFilter;

    let cfg = Config {
        entry_filter: EntryFilter::CloseConfirms,
        entry_body_pct: 0.1, // margin = 0.1 * ATR 2 = 0.2 above the level
        tp_r: 0.0,
        close_at_end: true,
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(
        &cfg,
        &[
            (0, Direction::Long, 100.0, 2.0),
            (1, Direction::Long, 100.0, 2.0), // re-placed after the failed fill
        ],
    );
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1), // triggers but closes below 100.2
        (100.2, 100.6, 100.0, 100.5), // triggers and confirms
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);

    assert_eq!(out.trades.len(), 1);
    // The fill happened on the confirming bar, not the first trigger.
    assert_eq!(out.trades[0].ts_entry, base_ts() + Duration::hours(8));
}

#[test]
fn body_ratio_filter_requires_directional_body() {
    use proplab_core::config::EntryFilter;

    let cfg = Config {
        entry_filter: EntryFilter::BodyRatio,
        entry_body_pct: 0.5,
        tp_r: 0.0,
        close_at_end: true,
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(
        &cfg,
        &[
            (0, Direction::Long, 100.0, 2.0),
            (1, Direction::Long, 100.0, 2.0),
        ],
    );
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (100.0, 100.4, 99.4, 100.1), // body 0.1 / range 1.0: rejected
        (99.9, 100.5, 99.9, 100.4),  // body 0.5 / range 0.6: accepted
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);

    assert_eq!(out.trades.len(), 1);
    // The fill happened on the confirming bar, not the first trigger.
    assert_eq!(out.trades[0].ts_entry, base_ts() + Duration::hours(8));
}

// ─── Intrabar replay ─────────────────────────────────────────────────

/// Hourly bars for one trading day starting 08:00.
fn hourly_bars(rows: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            ts: base_ts() + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: 100.0,
        })
        .collect()
}

#[test]
fn trigger_subbar_that_hits_sl_closes_same_subbar() {
    let cfg = scenario_config();
    // Coarse bucket 0 (08:00-12:00) is quiet; bucket 1 contains the spike.
    let fine = hourly_bars(&[
        (99.5, 99.9, 99.2, 99.5),
        (99.5, 99.8, 99.1, 99.4),
        (99.4, 99.9, 99.2, 99.6),
        (99.6, 99.9, 99.3, 99.5),
        // 12:00 bucket: second sub-bar touches entry 100 then collapses to 97.5
        (99.5, 99.8, 99.2, 99.6),
        (99.6, 100.2, 97.5, 97.8),
        (97.8, 98.5, 97.4, 98.0),
        (98.0, 98.6, 97.6, 98.2),
    ]);
    let coarse = resample(&fine, Timeframe::H4);
    assert_eq!(coarse.len(), 2);

    let strategy = ScriptedStrategy::new(&cfg, &[(0, Direction::Long, 100.0, 2.0)]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(coarse, Some(&fine), None);

    assert_eq!(out.trades.len(), 1);
    let t = &out.trades[0];
    assert_eq!(t.exit_reason, ExitReason::Sl);
    assert_eq!(t.exit_price, 98.0);
    assert_eq!(t.result_r, -1.0);
    assert_eq!(t.duration_bars, 0);
    // Exit is stamped with the sub-bar's timestamp, 13:00.
    assert_eq!(t.ts_exit, base_ts() + Duration::hours(5));
}

#[test]
fn intrabar_conservative_double_fire_goes_to_sl() {
    let cfg = scenario_config();
    let fine = hourly_bars(&[
        (99.5, 99.9, 99.2, 99.5),
        (99.5, 99.8, 99.1, 99.4),
        (99.4, 99.9, 99.2, 99.6),
        (99.6, 99.9, 99.3, 99.5),
        (99.6, 100.2, 99.4, 100.0), // trigger sub-bar, survives
        (100.0, 103.0, 97.0, 99.0), // touches both SL 98 and TP 102
        (99.0, 99.5, 98.5, 99.2),
        (99.2, 99.6, 98.8, 99.3),
    ]);
    let coarse = resample(&fine, Timeframe::H4);
    let strategy = ScriptedStrategy::new(&cfg, &[(0, Direction::Long, 100.0, 2.0)]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(coarse, Some(&fine), None);

    assert_eq!(out.trades.len(), 1);
    assert_eq!(out.trades[0].exit_reason, ExitReason::Sl);
}

// ─── Daily kill-switch ───────────────────────────────────────────────

#[test]
fn kill_switch_blocks_entries_until_next_day() {
    let cfg = Config {
        daily_kill_switch: 0.04,
        risk_per_trade: 0.0425, // one full-R loss = -4.25% of equity
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(
        &cfg,
        &[
            (0, Direction::Long, 100.0, 2.0),
            (2, Direction::Long, 100.0, 2.0), // suppressed: halted
            (4, Direction::Long, 100.0, 2.0), // next day: accepted again
        ],
    );
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),    // 08:00 signal
        (99.8, 100.3, 99.6, 100.1),  // 12:00 entry at 100
        (100.0, 100.5, 97.0, 98.5),  // 16:00 SL: balance 95750, dd 4.25% → halt
        (99.5, 100.5, 99.0, 100.0),  // 20:00 would trigger, but no pending exists
        (99.5, 99.9, 99.0, 99.5),    // 00:00 next day: signal re-placed
        (99.8, 100.4, 99.6, 100.2),  // 04:00 next day: entry fills
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);

    // Exactly one closed trade (the loss); the day-3 trigger was swallowed.
    assert_eq!(out.trades.len(), 1);
    assert_eq!(out.trades[0].exit_reason, ExitReason::Sl);

    // Halt is visible on the equity curve for the rest of day one...
    assert!(out.equity_curve[3].halted);
    // ...and cleared after the rollover.
    assert!(!out.equity_curve[4].halted);

    // The next-day pending actually filled: one position left open at end.
    let day2: Vec<_> = out
        .daily_stats
        .iter()
        .filter(|d| d.date == base_ts().date_naive() + Duration::days(1))
        .collect();
    assert_eq!(day2.len(), 1);
    assert!(!day2[0].halted);
}

#[test]
fn consecutive_losses_halt_same_day() {
    let cfg = Config {
        stop_after_n_losses: 2,
        daily_kill_switch: 0.50, // out of the way
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(
        &cfg,
        &[
            (0, Direction::Long, 100.0, 2.0),
            (2, Direction::Long, 100.0, 2.0),
            (4, Direction::Long, 100.0, 2.0), // same day, must be suppressed
        ],
    );
    // Hourly spacing keeps both losses inside one calendar day.
    let bars = hourly_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1), // entry #1
        (100.0, 100.5, 97.0, 98.5), // SL #1 (loss 1)
        (99.8, 100.3, 99.6, 100.1), // entry #2
        (100.0, 100.5, 97.0, 98.5), // SL #2 (loss 2) → halt
        (99.8, 100.5, 99.6, 100.1), // would trigger; halted
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);
    assert_eq!(out.trades.len(), 2);
    assert!(out.daily_stats.iter().any(|d| d.halted && d.losses_closed == 2));
}

// ─── Equity marking and end-of-history ──────────────────────────────

#[test]
fn worst_case_equity_marks_below_close_equity() {
    use proplab_core::config::DailyEquityMode;

    let bars = &[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1),  // entry at 100
        (100.1, 101.0, 99.2, 100.8), // wide bar, no exit (tp disabled)
    ];
    let signals = [(0usize, Direction::Long, 100.0, 2.0)];

    let worst_cfg = Config {
        tp_r: 0.0,
        daily_equity_mode: DailyEquityMode::Worst,
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(&worst_cfg, &signals);
    let worst = BacktestEngine::new(&worst_cfg, &strategy, "TEST", 0.0)
        .run(coarse_bars(bars), None, None);

    let close_cfg = Config {
        daily_equity_mode: DailyEquityMode::Close,
        ..worst_cfg.clone()
    };
    let strategy = ScriptedStrategy::new(&close_cfg, &signals);
    let close = BacktestEngine::new(&close_cfg, &strategy, "TEST", 0.0)
        .run(coarse_bars(bars), None, None);

    // Bar 2 marks the open long at low 99.2 vs close 100.8.
    assert!(worst.equity_curve[2].equity < close.equity_curve[2].equity);
    // risk_cash 250, risk 2 points: worst = (99.2-100)/2 * 250 = -100.
    assert_eq!(worst.equity_curve[2].equity, 100_000.0 - 100.0);
    assert_eq!(close.equity_curve[2].equity, 100_000.0 + 100.0);
}

#[test]
fn base_engine_leaves_positions_open_at_end() {
    let cfg = Config {
        tp_r: 0.0, // nothing ever exits
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(&cfg, &[(0, Direction::Long, 100.0, 2.0)]);
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1),
        (100.1, 100.6, 99.8, 100.3),
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);

    // No CLOSE_END in the production configuration: the ledger stays empty
    // and the balance never realizes the open trade.
    assert!(out.trades.is_empty());
    assert_eq!(out.end_balance, cfg.start_balance);
}

#[test]
fn trailing_activation_gates_the_ratchet_at_engine_level() {
    let cfg = Config {
        exit_mode: ExitMode::TrailingAtr,
        trailing_atr: 3.0,
        trailing_activation_r: 2.0, // trail arms only beyond +2R = 104
        tp_r: 0.0,
        ..scenario_config()
    };
    let strategy = ScriptedStrategy::new(&cfg, &[(0, Direction::Long, 100.0, 2.0)]);
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1),   // entry 100, SL 98, activation 104
        (100.1, 103.0, 99.5, 102.5),  // best 103 < 104: trail stays unarmed
        (102.5, 102.8, 99.5, 100.0),  // dips to 99.5; initial SL 98 holds
        (100.0, 106.0, 99.9, 105.5),  // best 106 >= 104: trail arms at 100
        (105.5, 105.8, 99.0, 99.5),   // falls through the armed trail
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);

    assert_eq!(out.trades.len(), 1);
    let t = &out.trades[0];
    assert_eq!(t.exit_reason, ExitReason::Trail);
    assert_eq!(t.exit_price, 100.0); // 106 - 6
    assert_eq!(t.result_r, 0.0);
}

// ─── Failure semantics and invariants ────────────────────────────────

#[test]
fn empty_history_is_empty_result() {
    let cfg = scenario_config();
    let strategy = ScriptedStrategy::new(&cfg, &[]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(Vec::new(), None, None);
    assert_eq!(out.bars, 0);
    assert!(out.trades.is_empty());
    assert!(out.equity_curve.is_empty());
    assert!(out.daily_stats.is_empty());
    assert_eq!(out.end_balance, cfg.start_balance);
}

#[test]
fn zero_risk_fill_is_rejected_silently() {
    let cfg = Config {
        sl_atr: 1.0,
        ..scenario_config()
    };
    // ATR 0 makes entry == SL: the triggered pending is consumed, nothing opens.
    let strategy = ScriptedStrategy::new(&cfg, &[(0, Direction::Long, 100.0, 0.0)]);
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1),
        (100.0, 103.0, 97.0, 100.0),
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);
    assert!(out.trades.is_empty());
}

#[test]
fn equity_curve_length_equals_bar_count_and_balance_identity_holds() {
    let cfg = scenario_config();
    let strategy = ScriptedStrategy::new(
        &cfg,
        &[(0, Direction::Long, 100.0, 2.0), (3, Direction::Short, 99.0, 2.0)],
    );
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1),
        (100.0, 103.0, 99.0, 102.5), // TP
        (102.5, 102.8, 101.9, 102.0),
        (102.0, 102.2, 98.9, 99.5), // short triggers at 99
        (99.5, 101.2, 99.2, 101.0), // short SL at 101
    ]);
    let out = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);

    assert_eq!(out.equity_curve.len(), 6);
    let cash_sum: f64 = out.trades.iter().map(|t| t.result_cash).sum();
    assert!((out.end_balance - (cfg.start_balance + cash_sum)).abs() < 1e-9);
    // Ledger is in chronological exit order.
    for pair in out.trades.windows(2) {
        assert!(pair[0].ts_exit <= pair[1].ts_exit);
    }
}

#[test]
fn determinism_identical_inputs_identical_outputs() {
    let cfg = scenario_config();
    let bars = coarse_bars(&[
        (99.5, 99.9, 99.0, 99.5),
        (99.8, 100.3, 99.6, 100.1),
        (100.0, 103.0, 97.0, 100.0),
        (100.0, 101.0, 99.0, 100.5),
    ]);
    let strategy = ScriptedStrategy::new(&cfg, &[(0, Direction::Long, 100.0, 2.0)]);

    let a = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars.clone(), None, None);
    let b = BacktestEngine::new(&cfg, &strategy, "TEST", 0.0).run(bars, None, None);

    assert_eq!(
        serde_json::to_string(&a.trades).unwrap(),
        serde_json::to_string(&b.trades).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&a.equity_curve).unwrap(),
        serde_json::to_string(&b.equity_curve).unwrap()
    );
}

#[test]
fn slip_penalty_worsens_exit_fills() {
    let cfg = Config {
        slip_penalty: 0.001,
        ..scenario_config()
    };
    let out = run_exit_scenario(&cfg, (100.0, 103.0, 99.0, 102.5));
    let t = &out.trades[0];
    assert_eq!(t.exit_reason, ExitReason::Tp);
    // Long exit worsened below the raw TP level.
    assert!(t.exit_price < 102.0);
    assert!(t.result_r < 1.0);
}
