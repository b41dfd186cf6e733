//! Strategy library.
//!
//! A strategy is a value implementing [`Strategy::decide`] over the history
//! up to the signal candle (the slice's last element). The decision price is
//! the next candle's open in a backtest, or the live spot. Stops and targets
//! are ATR-multiples around the decision price.

pub mod dispatcher;
pub mod mean_reversion;
pub mod sma_cross;

pub use dispatcher::{StrategyDispatcher, StrategyMode};
pub use mean_reversion::MeanReversionStrategy;
pub use sma_cross::SmaCrossStrategy;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::market::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "BUY" => Some(TradeSide::Buy),
            "SELL" => Some(TradeSide::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            TradeSide::Buy => TradeSide::Sell,
            TradeSide::Sell => TradeSide::Buy,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeSignal {
    pub side: TradeSide,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Tunable strategy inputs. Arrives as JSON on sessions and backtest
/// requests; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub sma_short: usize,
    pub sma_long: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub atr_period: usize,
    pub atr_mult_sl: f64,
    pub atr_mult_tp: f64,
    pub adx_period: usize,
    pub adx_trend_threshold: f64,
    pub adx_range_threshold: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            sma_short: 10,
            sma_long: 50,
            bb_period: 20,
            bb_std_dev: 2.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            atr_period: 14,
            atr_mult_sl: 1.5,
            atr_mult_tp: 3.0,
            adx_period: 14,
            adx_trend_threshold: 25.0,
            adx_range_threshold: 20.0,
        }
    }
}

/// Candles that must precede the decision candle before any strategy may
/// emit a signal.
pub fn min_required_candles(params: &StrategyParams) -> usize {
    let adx_lookback = (2 * params.adx_period).saturating_sub(1);
    [
        params.sma_long,
        params.bb_period,
        params.rsi_period,
        params.atr_period + 1,
        adx_lookback,
    ]
    .into_iter()
    .max()
    .unwrap_or(0)
}

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Evaluate the signal candle (last element of `history`) and decide
    /// whether to trade at `decision_price`. `current_atr` is the ATR at the
    /// signal candle; without it no stops can be placed and no signal fires.
    fn decide(
        &self,
        history: &[Candle],
        decision_price: f64,
        params: &StrategyParams,
        current_atr: Option<f64>,
    ) -> Option<TradeSignal>;
}

/// ATR-based stop and target around the decision price, direction-aware.
pub(crate) fn signal_with_stops(
    side: TradeSide,
    decision_price: f64,
    atr: f64,
    params: &StrategyParams,
) -> TradeSignal {
    let (stop_loss, take_profit) = match side {
        TradeSide::Buy => (
            decision_price - params.atr_mult_sl * atr,
            decision_price + params.atr_mult_tp * atr,
        ),
        TradeSide::Sell => (
            decision_price + params.atr_mult_sl * atr,
            decision_price - params.atr_mult_tp * atr,
        ),
    };
    TradeSignal {
        side,
        stop_loss,
        take_profit,
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Flat-bodied candles from a close series; open/high/low track the close
    /// so close-based indicators see exactly the given values.
    pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::minutes(15 * i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 0.0,
            })
            .collect()
    }
}
