//! Indicator kernels — pure functions over numeric sequences.
//!
//! Every kernel is windowed with an explicit warm-up: outputs are NaN until
//! the window is satisfied, and NaN inputs poison the affected windows. None
//! of them ever fail on numeric data; empty input yields empty output. The
//! strategy layer treats NaN as "not ready".

pub mod atr;
pub mod donchian;
pub mod ema;
pub mod rolling_quantile;

pub use atr::{atr, atr_relative, true_range};
pub use donchian::donchian;
pub use ema::ema;
pub use rolling_quantile::{quantile_sorted, rolling_quantile};

/// Create bars from (open, high, low, close) tuples for testing, one bar per
/// hour starting at a fixed local morning.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::{Duration, FixedOffset, TimeZone};

    let tz = FixedOffset::east_opt(3600).unwrap();
    let base = tz.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            ts: base + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
