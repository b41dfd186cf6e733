//! Bollinger + RSI mean-reversion strategy.
//!
//! Fades closes outside the bands, but only once the RSI has started turning
//! back from its extreme.

use crate::indicators::{bollinger, closes, rsi};
use crate::market::Candle;
use crate::strategy::{signal_with_stops, Strategy, StrategyParams, TradeSide, TradeSignal};

#[derive(Debug, Default, Clone, Copy)]
pub struct MeanReversionStrategy;

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &'static str {
        "mean_reversion"
    }

    fn decide(
        &self,
        history: &[Candle],
        decision_price: f64,
        params: &StrategyParams,
        current_atr: Option<f64>,
    ) -> Option<TradeSignal> {
        let atr = current_atr?;
        let closes = closes(history);
        if closes.len() < 2 {
            return None;
        }

        let bands = bollinger(&closes, params.bb_period, params.bb_std_dev);
        let rsi_series = rsi(&closes, params.rsi_period);

        let i = closes.len() - 1;
        let close = closes[i];
        let lower = bands.lower[i]?;
        let upper = bands.upper[i]?;
        let rsi_now = rsi_series[i]?;
        let rsi_prev = rsi_series[i - 1]?;

        let side = if close <= lower && rsi_now < params.rsi_oversold && rsi_now > rsi_prev {
            TradeSide::Buy
        } else if close >= upper && rsi_now > params.rsi_overbought && rsi_now < rsi_prev {
            TradeSide::Sell
        } else {
            return None;
        };

        Some(signal_with_stops(side, decision_price, atr, params))
    }
}
