use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only instrument this engine trades.
pub const SYMBOL: &str = "XAUUSD";

/// One OHLC bar. Pure value type; indicator and strategy code operates on
/// slices of these and owns nothing beyond the request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle duration. Serialized with the canonical short names used by the
/// store (`price_data.timeframe`) and the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Min1,
    Min5,
    Min15,
    Min30,
    Min60,
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "1m" | "1min" => Some(Interval::Min1),
            "5m" | "5min" => Some(Interval::Min5),
            "15m" | "15min" => Some(Interval::Min15),
            "30m" | "30min" => Some(Interval::Min30),
            "60m" | "60min" | "1h" => Some(Interval::Min60),
            "daily" | "1d" => Some(Interval::Daily),
            "weekly" | "1w" => Some(Interval::Weekly),
            "monthly" => Some(Interval::Monthly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Min1 => "1m",
            Interval::Min5 => "5m",
            Interval::Min15 => "15m",
            Interval::Min30 => "30m",
            Interval::Min60 => "60m",
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::Monthly => "monthly",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Interval::Min1
                | Interval::Min5
                | Interval::Min15
                | Interval::Min30
                | Interval::Min60
        )
    }

    /// Parameter value the upstream FX API expects for intraday series.
    pub(crate) fn upstream_param(&self) -> &'static str {
        match self {
            Interval::Min1 => "1min",
            Interval::Min5 => "5min",
            Interval::Min15 => "15min",
            Interval::Min30 => "30min",
            Interval::Min60 => "60min",
            Interval::Daily | Interval::Weekly | Interval::Monthly => "",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much history the upstream should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputSize {
    #[default]
    Compact,
    Full,
}

impl OutputSize {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "compact" => Some(OutputSize::Compact),
            "full" => Some(OutputSize::Full),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}
