//! Intrabar replay index — maps each coarse bar to its slice of finer bars.
//!
//! Built once per run so the hot loop does no searching: coarse bar `i` owns
//! the half-open range `ranges[i]` into the finer series. Finer bars whose
//! bucket has no coarse counterpart (outside the split window, feed gaps)
//! are skipped.

use std::ops::Range;

use crate::config::Timeframe;
use crate::domain::Bar;
use crate::resample::bucket_start;

/// Precomputed coarse-index → fine-range mapping.
#[derive(Debug, Clone)]
pub struct IntrabarIndex {
    ranges: Vec<Range<usize>>,
}

impl IntrabarIndex {
    /// Build the index. Both series must be ordered by timestamp; the coarse
    /// series is expected to be the (possibly split) resample of the fine one.
    pub fn build(coarse: &[Bar], fine: &[Bar], timeframe: Timeframe) -> Self {
        let mut ranges = Vec::with_capacity(coarse.len());
        let mut j = 0;

        for coarse_bar in coarse {
            while j < fine.len() && bucket_start(fine[j].ts, timeframe) < coarse_bar.ts {
                j += 1;
            }
            let start = j;
            while j < fine.len() && bucket_start(fine[j].ts, timeframe) == coarse_bar.ts {
                j += 1;
            }
            ranges.push(start..j);
        }

        Self { ranges }
    }

    /// The fine-series range belonging to coarse bar `idx`.
    pub fn range(&self, idx: usize) -> Range<usize> {
        self.ranges[idx].clone()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
