//! Average True Range — arithmetic rolling mean of True Range.
//!
//! TR[t] = max(high - low, |high - prev_close|, |low - prev_close|); the first
//! bar has no previous close so its TR degrades to high - low. The ATR is the
//! plain mean over `period` bars (not Wilder smoothing), NaN until the window
//! is full.

use crate::domain::Bar;

/// True Range series.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];
    if n == 0 {
        return tr;
    }

    if !bars[0].high.is_nan() && !bars[0].low.is_nan() {
        tr[0] = bars[0].high - bars[0].low;
    }

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        if h.is_nan() || l.is_nan() {
            continue;
        }
        tr[i] = if pc.is_nan() {
            h - l
        } else {
            (h - l).max((h - pc).abs()).max((l - pc).abs())
        };
    }

    tr
}

/// ATR over `period` bars: simple rolling mean of TR with a full-window
/// requirement. A NaN anywhere in the window yields NaN.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    let tr = true_range(bars);
    rolling_mean(&tr, period)
}

/// ATR divided by close — the relative volatility series the gate quantile
/// is computed over.
pub fn atr_relative(bars: &[Bar], period: usize) -> Vec<f64> {
    atr(bars, period)
        .iter()
        .zip(bars)
        .map(|(&a, bar)| a / bar.close)
        .collect()
}

fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().sum::<f64>() / period as f64;
    }
    result
}
