//! Signal — a strategy's desire to place one pending stop order.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short. Used to fold the symmetric P&L math.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// A desired stop-entry level emitted by the strategy. Immutable once emitted;
/// it becomes a `PendingOrder` when the engine accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub entry_level: f64,
    pub atr_at_signal: f64,
    pub ts: DateTime<FixedOffset>,
    pub expiry_bars: usize,
}
