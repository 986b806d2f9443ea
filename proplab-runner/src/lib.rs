//! Proplab Runner — batch orchestration over the core engine.
//!
//! - `data`: the bar-loading collaborator interface (`BarSource`) and its
//!   CSV-backed implementation
//! - `batch`: the rayon sweep over tickers × penalties
//! - `summary`: per-run aggregation into `results.csv` rows and
//!   `summary.json` documents
//! - `compare`: pairwise IS ↔ OOS evaluation with typed verdicts
//! - `shortlist`: composite OOS scoring and the two-tier shortlists
//! - `export`: every persisted artifact

pub mod batch;
pub mod compare;
pub mod data;
pub mod export;
pub mod shortlist;
pub mod summary;
