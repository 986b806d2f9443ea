//! Timeframe resampler — aggregate finer bars into fixed-width buckets.
//!
//! Buckets are aligned from local midnight (a 4h feed buckets at 00/04/08/...).
//! For each bucket: open = first, high = max, low = min, close = last,
//! volume = sum. Buckets with no input rows are simply absent. Input bars are
//! assumed ordered and at a uniform finer interval.

use chrono::{DateTime, FixedOffset, TimeZone, Timelike};

use crate::config::Timeframe;
use crate::domain::Bar;

/// Start of the bucket `ts` falls into, aligned from local midnight.
pub fn bucket_start(ts: DateTime<FixedOffset>, timeframe: Timeframe) -> DateTime<FixedOffset> {
    let hours = timeframe.hours();
    let aligned_hour = ts.hour() - ts.hour() % hours;
    let local = ts
        .date_naive()
        .and_hms_opt(aligned_hour, 0, 0)
        .expect("aligned hour is a valid time");
    ts.timezone()
        .from_local_datetime(&local)
        .single()
        .expect("fixed offset is unambiguous")
}

/// Aggregate `bars` into `timeframe` buckets.
pub fn resample(bars: &[Bar], timeframe: Timeframe) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();

    for bar in bars {
        let bucket = bucket_start(bar.ts, timeframe);
        match out.last_mut() {
            Some(current) if current.ts == bucket => {
                current.high = current.high.max(bar.high);
                current.low = current.low.min(bar.low);
                current.close = bar.close;
                current.volume += bar.volume;
            }
            _ => out.push(Bar {
                ts: bucket,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            }),
        }
    }

    out
}
