//! Bar — the fundamental market data unit.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single instrument at a fixed sampling interval.
///
/// Timestamps are instants already expressed in the project-local timezone
/// (the data loader is responsible for the conversion). Calendar-day
/// rollover and the no-trade window read the local clock off `ts` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub ts: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Local calendar day of this bar.
    pub fn day(&self) -> NaiveDate {
        self.ts.date_naive()
    }

    /// Local wall-clock time of this bar.
    pub fn time(&self) -> NaiveTime {
        self.ts.time()
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high is the top of the range, low the bottom.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}
