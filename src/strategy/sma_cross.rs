//! SMA crossover strategy.
//!
//! Compares the short and long SMA at the signal candle and the candle
//! before it. An up-cross opens a BUY, a down-cross a SELL.

use crate::indicators::{closes, sma};
use crate::market::Candle;
use crate::strategy::{signal_with_stops, Strategy, StrategyParams, TradeSide, TradeSignal};

#[derive(Debug, Default, Clone, Copy)]
pub struct SmaCrossStrategy;

impl Strategy for SmaCrossStrategy {
    fn name(&self) -> &'static str {
        "sma_crossover"
    }

    fn decide(
        &self,
        history: &[Candle],
        decision_price: f64,
        params: &StrategyParams,
        current_atr: Option<f64>,
    ) -> Option<TradeSignal> {
        let atr = current_atr?;
        // A cross needs both SMAs at the signal candle and the one before.
        if history.len() < params.sma_long + 1 {
            return None;
        }

        let closes = closes(history);
        let short = sma(&closes, params.sma_short);
        let long = sma(&closes, params.sma_long);

        let i = closes.len() - 1;
        let (short_now, long_now, short_prev, long_prev) =
            match (short[i], long[i], short[i - 1], long[i - 1]) {
                (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
                _ => return None,
            };

        let side = if short_prev <= long_prev && short_now > long_now {
            TradeSide::Buy
        } else if short_prev >= long_prev && short_now < long_now {
            TradeSide::Sell
        } else {
            return None;
        };

        Some(signal_with_stops(side, decision_price, atr, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testutil::candles_from_closes;

    fn cross_params() -> StrategyParams {
        StrategyParams {
            sma_short: 2,
            sma_long: 3,
            atr_mult_sl: 1.0,
            atr_mult_tp: 2.0,
            ..StrategyParams::default()
        }
    }

    #[test]
    fn up_cross_opens_buy_with_atr_stops() {
        // Decline then sharp recovery: short SMA crosses above the long one
        // on the final candle.
        let history = candles_from_closes(&[2020.0, 2010.0, 2000.0, 1990.0, 1995.0, 2015.0]);
        let signal = SmaCrossStrategy
            .decide(&history, 2015.0, &cross_params(), Some(5.0))
            .expect("up-cross should fire");

        assert_eq!(signal.side, TradeSide::Buy);
        assert_eq!(signal.stop_loss, 2010.0);
        assert_eq!(signal.take_profit, 2025.0);
    }

    #[test]
    fn down_cross_opens_sell() {
        let history = candles_from_closes(&[1980.0, 1990.0, 2000.0, 2010.0, 2005.0, 1985.0]);
        let signal = SmaCrossStrategy
            .decide(&history, 1984.0, &cross_params(), Some(4.0))
            .expect("down-cross should fire");

        assert_eq!(signal.side, TradeSide::Sell);
        assert_eq!(signal.stop_loss, 1988.0);
        assert_eq!(signal.take_profit, 1976.0);
    }

    #[test]
    fn no_cross_means_no_signal() {
        let history = candles_from_closes(&[2000.0, 2005.0, 2010.0, 2015.0, 2020.0, 2025.0]);
        assert!(SmaCrossStrategy
            .decide(&history, 2030.0, &cross_params(), Some(5.0))
            .is_none());
    }

    #[test]
    fn missing_atr_suppresses_the_signal() {
        let history = candles_from_closes(&[2020.0, 2010.0, 2000.0, 1990.0, 1995.0, 2015.0]);
        assert!(SmaCrossStrategy
            .decide(&history, 2015.0, &cross_params(), None)
            .is_none());
    }

    #[test]
    fn too_little_history_means_no_signal() {
        let history = candles_from_closes(&[2000.0, 2010.0, 2020.0]);
        assert!(SmaCrossStrategy
            .decide(&history, 2030.0, &cross_params(), Some(5.0))
            .is_none());
    }
}
