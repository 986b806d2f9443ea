//! Proplab Core — the event-driven breakout backtest engine.
//!
//! This crate contains everything a single `(ticker, penalty)` run needs:
//! - Domain types (bars, signals, pending orders, positions, trades)
//! - Indicator kernels with explicit NaN warm-up regions
//! - Timeframe resampler and the intrabar replay index
//! - The strategy capability and the proactive Donchian breakout
//! - Prop-firm rule simulation (daily/global drawdown, kill-switch)
//! - The bar-sequential engine loop
//! - Deterministic IS/OOS time split
//!
//! No I/O happens inside the bar loop; data loading and artifact export live
//! in `proplab-runner`.

pub mod config;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod prop;
pub mod resample;
pub mod split;
pub mod strategy;
