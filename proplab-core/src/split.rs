//! Deterministic time split for in-sample / out-of-sample validation.
//!
//! The cut is an index, `floor(len * ratio)`: IS is `[0, cut)`, OOS is
//! `[cut, len)`. A cut at either extreme degenerates to the whole series
//! rather than an error, so sweeping ratios never breaks a batch.

use serde::{Deserialize, Serialize};

use crate::config::{Config, SplitMode, SplitTarget};
use crate::domain::Bar;

/// What the split actually did, for downstream logging and summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitInfo {
    pub mode: SplitMode,
    pub target: Option<SplitTarget>,
    pub ratio: f64,
    pub original_bars: usize,
    pub split_bars: usize,
    pub date_start: String,
    pub date_end: String,
}

impl std::fmt::Display for SplitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.mode, self.target) {
            (SplitMode::None, _) | (_, None) => {
                write!(f, "No split ({} bars)", self.original_bars)
            }
            (SplitMode::Time, Some(target)) => write!(
                f,
                "Split time {:.0}% -> {} ({}/{} bars, {} -> {})",
                self.ratio * 100.0,
                target.to_string().to_uppercase(),
                self.split_bars,
                self.original_bars,
                self.date_start,
                self.date_end
            ),
        }
    }
}

fn date_range(bars: &[Bar]) -> (String, String) {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first.ts.to_rfc3339(), last.ts.to_rfc3339()),
        _ => (String::new(), String::new()),
    }
}

/// Time-split an ordered series, returning the selected window.
pub fn split_time(bars: &[Bar], ratio: f64, target: SplitTarget) -> (&[Bar], SplitInfo) {
    let original_bars = bars.len();
    if original_bars == 0 {
        return (
            bars,
            SplitInfo {
                mode: SplitMode::None,
                target: None,
                ratio,
                original_bars: 0,
                split_bars: 0,
                date_start: String::new(),
                date_end: String::new(),
            },
        );
    }

    let cut = (original_bars as f64 * ratio).floor() as usize;

    // Ratio too extreme for this series: hand back everything.
    if cut == 0 || cut >= original_bars {
        let (date_start, date_end) = date_range(bars);
        return (
            bars,
            SplitInfo {
                mode: SplitMode::Time,
                target: Some(target),
                ratio,
                original_bars,
                split_bars: original_bars,
                date_start,
                date_end,
            },
        );
    }

    let window = match target {
        SplitTarget::Is => &bars[..cut],
        SplitTarget::Oos => &bars[cut..],
    };
    let (date_start, date_end) = date_range(window);

    (
        window,
        SplitInfo {
            mode: SplitMode::Time,
            target: Some(target),
            ratio,
            original_bars,
            split_bars: window.len(),
            date_start,
            date_end,
        },
    )
}

/// Apply the configured split, if any.
pub fn apply_split<'a>(bars: &'a [Bar], cfg: &Config) -> (&'a [Bar], Option<SplitInfo>) {
    match cfg.split_mode {
        SplitMode::None => (bars, None),
        SplitMode::Time => {
            let (window, info) = split_time(bars, cfg.split_ratio, cfg.split_target);
            (window, Some(info))
        }
    }
}

/// One side of the boundary preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryWindow {
    pub start: Option<String>,
    pub end: Option<String>,
    pub bars: usize,
}

/// Where a given ratio would cut the series, without applying the split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitBoundaries {
    pub is_window: BoundaryWindow,
    pub oos_window: BoundaryWindow,
    pub total_bars: usize,
    pub ratio: f64,
}

/// Preview the IS/OOS windows a ratio produces. Useful before choosing one.
pub fn split_boundaries(bars: &[Bar], ratio: f64) -> SplitBoundaries {
    let len = bars.len();
    let cut = (len as f64 * ratio).floor() as usize;

    let is_window = BoundaryWindow {
        start: bars.first().map(|b| b.ts.to_rfc3339()),
        end: if cut > 0 {
            bars.get(cut - 1).map(|b| b.ts.to_rfc3339())
        } else {
            None
        },
        bars: cut.min(len),
    };
    let oos_window = BoundaryWindow {
        start: bars.get(cut).map(|b| b.ts.to_rfc3339()),
        end: bars.last().map(|b| b.ts.to_rfc3339()),
        bars: len.saturating_sub(cut),
    };

    SplitBoundaries {
        is_window,
        oos_window,
        total_bars: len,
        ratio,
    }
}
