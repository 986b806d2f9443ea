//! Rolling window quantile with linear interpolation.
//!
//! Used for the volatility gate: the current ATR/close must sit at or below
//! the trailing `q`-quantile of its own history. Full-window semantics: the
//! first `window - 1` outputs are NaN, and a NaN anywhere in the window
//! poisons that output.

/// Quantile of a sorted slice with linear interpolation between ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Rolling quantile over a fixed window.
pub fn rolling_quantile(values: &[f64], window: usize, q: f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }

    let mut buf = Vec::with_capacity(window);
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        buf.clear();
        buf.extend_from_slice(slice);
        buf.sort_by(|a, b| a.partial_cmp(b).expect("no NaN after filter"));
        result[i] = quantile_sorted(&buf, q);
    }

    result
}
