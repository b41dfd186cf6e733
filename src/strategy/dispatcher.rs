//! Adaptive strategy dispatcher.
//!
//! In `Adaptive` mode the ADX at the signal candle picks the regime: trend
//! strength above the trend threshold routes to the SMA crossover, below the
//! range threshold to mean reversion, and the band in between trades nothing.
//! Explicit modes bypass the regime check. `BreakoutOnly` is reserved.

use serde::{Deserialize, Serialize};

use crate::indicators::adx;
use crate::market::Candle;
use crate::strategy::{
    min_required_candles, MeanReversionStrategy, SmaCrossStrategy, Strategy, StrategyParams,
    TradeSignal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyMode {
    #[serde(rename = "ADAPTIVE")]
    Adaptive,
    #[serde(rename = "SMA_ONLY")]
    SmaOnly,
    #[serde(rename = "MEAN_REVERSION_ONLY")]
    MeanReversionOnly,
    #[serde(rename = "BREAKOUT_ONLY")]
    BreakoutOnly,
}

impl StrategyMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "ADAPTIVE" => Some(StrategyMode::Adaptive),
            "SMA_ONLY" => Some(StrategyMode::SmaOnly),
            "MEAN_REVERSION_ONLY" => Some(StrategyMode::MeanReversionOnly),
            "BREAKOUT_ONLY" => Some(StrategyMode::BreakoutOnly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyMode::Adaptive => "ADAPTIVE",
            StrategyMode::SmaOnly => "SMA_ONLY",
            StrategyMode::MeanReversionOnly => "MEAN_REVERSION_ONLY",
            StrategyMode::BreakoutOnly => "BREAKOUT_ONLY",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyDispatcher {
    mode: StrategyMode,
    sma_cross: SmaCrossStrategy,
    mean_reversion: MeanReversionStrategy,
}

impl StrategyDispatcher {
    pub fn new(mode: StrategyMode) -> Self {
        Self {
            mode,
            sma_cross: SmaCrossStrategy,
            mean_reversion: MeanReversionStrategy,
        }
    }

    pub fn mode(&self) -> StrategyMode {
        self.mode
    }
}

impl Strategy for StrategyDispatcher {
    fn name(&self) -> &'static str {
        "dispatcher"
    }

    fn decide(
        &self,
        history: &[Candle],
        decision_price: f64,
        params: &StrategyParams,
        current_atr: Option<f64>,
    ) -> Option<TradeSignal> {
        if history.len() < min_required_candles(params) {
            return None;
        }

        match self.mode {
            StrategyMode::SmaOnly => {
                self.sma_cross
                    .decide(history, decision_price, params, current_atr)
            }
            StrategyMode::MeanReversionOnly => {
                self.mean_reversion
                    .decide(history, decision_price, params, current_atr)
            }
            // Reserved mode: trades nothing until a breakout strategy lands.
            StrategyMode::BreakoutOnly => None,
            StrategyMode::Adaptive => {
                let regime = adx(history, params.adx_period);
                let adx_now = regime.adx.last().copied().flatten()?;

                if adx_now > params.adx_trend_threshold {
                    self.sma_cross
                        .decide(history, decision_price, params, current_atr)
                } else if adx_now < params.adx_range_threshold {
                    self.mean_reversion
                        .decide(history, decision_price, params, current_atr)
                } else {
                    None
                }
            }
        }
    }
}
