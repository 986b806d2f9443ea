//! The single validated configuration record shared read-only by every
//! component of a run.
//!
//! Loadable from TOML with unknown keys rejected at parse time. Validation
//! happens once, before any run starts; a bad config is fatal for the whole
//! batch, never per-run.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse trading timeframe the hourly feed is aggregated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
}

impl Timeframe {
    pub fn hours(self) -> u32 {
        match self {
            Timeframe::H1 => 1,
            Timeframe::H4 => 4,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeframe::H1 => write!(f, "1h"),
            Timeframe::H4 => write!(f, "4h"),
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            other => Err(ConfigError::UnknownTimeframe(other.to_string())),
        }
    }
}

/// How a position is exited once open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitMode {
    /// Fixed SL and optional TP.
    Fixed,
    /// ATR trailing stop (TP usually disabled).
    TrailingAtr,
}

/// Price reference for the daily mark-to-market equity sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyEquityMode {
    /// Mark open positions at the bar close.
    Close,
    /// Worst-case intrabar mark: low for longs, high for shorts.
    Worst,
}

/// Whether and how history is partitioned before a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    None,
    Time,
}

/// Which side of the time split a run consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitTarget {
    Is,
    Oos,
}

impl std::fmt::Display for SplitTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitTarget::Is => write!(f, "is"),
            SplitTarget::Oos => write!(f, "oos"),
        }
    }
}

/// Optional refinement applied when a pending trigger is about to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryFilter {
    /// Fill on the raw stop trigger.
    None,
    /// The triggering bar must close beyond the entry level plus a margin of
    /// `entry_body_pct` ATR in the trade direction.
    CloseConfirms,
    /// The triggering bar's directional body must be at least
    /// `entry_body_pct` of its high-low range.
    BodyRatio,
}

/// Complete backtest configuration. One immutable instance per batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    // Capital / risk
    pub start_balance: f64,
    pub risk_per_trade: f64,

    // Indicator and signal geometry
    pub ema_period: usize,
    pub atr_period: usize,
    pub donchian_n: usize,
    pub buffer_atr: f64,
    pub proximity_atr: f64,

    // Stops / targets
    pub sl_atr: f64,
    /// Take-profit in R multiples; 0 disables the TP leg.
    pub tp_r: f64,
    pub exit_mode: ExitMode,
    pub trailing_atr: f64,
    pub trailing_activation_r: f64,

    // Volatility gate
    pub vol_quantile: f64,
    pub vol_window_bars: usize,

    // No-trade window in local time; wraps across midnight when start > end.
    #[serde(with = "hh_mm")]
    pub no_trade_start: NaiveTime,
    #[serde(with = "hh_mm")]
    pub no_trade_end: NaiveTime,

    // Pending order expiry horizon (informational while recompute is active).
    pub order_valid_bars: usize,

    // Same-bar double-fire convention for the intrabar path.
    pub conservative_same_bar: bool,

    // Prop-firm thresholds. The first three only feed violation counters;
    // the last two halt new entries.
    pub daily_dd_ftmo: f64,
    pub daily_dd_gft: f64,
    pub max_loss: f64,
    pub stop_after_n_losses: usize,
    pub daily_kill_switch: f64,

    pub daily_equity_mode: DailyEquityMode,

    // IS/OOS partition
    pub split_mode: SplitMode,
    pub split_ratio: f64,
    pub split_target: SplitTarget,

    pub timeframe: Timeframe,

    /// Cap on simultaneous positions per instrument; 0 = unlimited.
    pub max_concurrent_trades: usize,

    // Entry refinement
    pub entry_filter: EntryFilter,
    pub entry_body_pct: f64,

    /// Mark any still-open position to the last bar's close (CLOSE_END).
    /// Off in the production engine.
    pub close_at_end: bool,
    /// Multiplicative worsening of SL/TP exit fills; 0 = inert.
    pub slip_penalty: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_balance: 100_000.0,
            risk_per_trade: 0.0025,
            ema_period: 200,
            atr_period: 14,
            donchian_n: 20,
            buffer_atr: 0.10,
            proximity_atr: 1.5,
            sl_atr: 1.0,
            tp_r: 1.0,
            exit_mode: ExitMode::Fixed,
            trailing_atr: 3.0,
            trailing_activation_r: 0.0,
            vol_quantile: 0.90,
            vol_window_bars: 1000,
            no_trade_start: NaiveTime::from_hms_opt(22, 30, 0).unwrap(),
            no_trade_end: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
            order_valid_bars: 1,
            conservative_same_bar: true,
            daily_dd_ftmo: 0.05,
            daily_dd_gft: 0.04,
            max_loss: 0.10,
            stop_after_n_losses: 2,
            daily_kill_switch: 0.04,
            daily_equity_mode: DailyEquityMode::Worst,
            split_mode: SplitMode::None,
            split_ratio: 0.70,
            split_target: SplitTarget::Is,
            timeframe: Timeframe::H4,
            max_concurrent_trades: 0,
            entry_filter: EntryFilter::None,
            entry_body_pct: 0.0,
            close_at_end: false,
            slip_penalty: 0.0,
        }
    }
}

/// Configuration errors. All are fatal before any run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown timeframe '{0}' (expected 1h or 4h)")]
    UnknownTimeframe(String),
    #[error("split_ratio {0} outside (0, 1)")]
    InvalidSplitRatio(f64),
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{field} must be >= 1, got 0")]
    ZeroPeriod { field: &'static str },
    #[error("{field} {value} outside [0, 1]")]
    OutOfUnitRange { field: &'static str, value: f64 },
    #[error("entry_filter requires entry_body_pct in [0, 1], got {0}")]
    InvalidBodyPct(f64),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Parse a TOML document. Unknown keys are rejected.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the gates that would make a batch meaningless. Returns the
    /// first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::NonPositive { field, value })
            }
        }
        fn period(field: &'static str, value: usize) -> Result<(), ConfigError> {
            if value >= 1 {
                Ok(())
            } else {
                Err(ConfigError::ZeroPeriod { field })
            }
        }
        fn unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::OutOfUnitRange { field, value })
            }
        }

        positive("start_balance", self.start_balance)?;
        positive("risk_per_trade", self.risk_per_trade)?;
        positive("sl_atr", self.sl_atr)?;
        period("ema_period", self.ema_period)?;
        period("atr_period", self.atr_period)?;
        period("donchian_n", self.donchian_n)?;
        period("vol_window_bars", self.vol_window_bars)?;
        unit("vol_quantile", self.vol_quantile)?;
        unit("daily_dd_ftmo", self.daily_dd_ftmo)?;
        unit("daily_dd_gft", self.daily_dd_gft)?;
        unit("max_loss", self.max_loss)?;
        positive("daily_kill_switch", self.daily_kill_switch)?;

        if self.split_mode == SplitMode::Time
            && !(self.split_ratio > 0.0 && self.split_ratio < 1.0)
        {
            return Err(ConfigError::InvalidSplitRatio(self.split_ratio));
        }
        if self.entry_filter != EntryFilter::None
            && !(0.0..=1.0).contains(&self.entry_body_pct)
        {
            return Err(ConfigError::InvalidBodyPct(self.entry_body_pct));
        }
        Ok(())
    }

    /// True when `t` falls inside the no-trade window. A window whose start
    /// is after its end wraps across midnight.
    pub fn in_no_trade_window(&self, t: NaiveTime) -> bool {
        let (start, end) = (self.no_trade_start, self.no_trade_end);
        if start <= end {
            start <= t && t < end
        } else {
            t >= start || t < end
        }
    }
}

/// Serialize NaiveTime as "HH:MM", the shape config files use.
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(de)?;
        NaiveTime::parse_from_str(&s, "%H:%M").map_err(serde::de::Error::custom)
    }
}
