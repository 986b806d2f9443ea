//! Domain types: bars, signals, pending orders, positions, trades.

pub mod bar;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use position::{ExitReason, PendingOrder, Position};
pub use signal::{Direction, Signal};
pub use trade::TradeRecord;
