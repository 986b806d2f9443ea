//! Backtest engine: the per-run bar loop, its intrabar replay index and the
//! output bundle.

pub mod intrabar;
pub mod output;
pub mod run;

pub use intrabar::IntrabarIndex;
pub use output::{DailyRow, EquityPoint, RunOutput};
pub use run::BacktestEngine;
