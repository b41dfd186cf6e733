//! Event-driven candle replay.
//!
//! Pure over the loaded candles and a strategy value: no I/O, no clock, one
//! simulated position at a time. Within a candle the stop-loss is checked
//! before the take-profit; an opposite dispatcher signal exits at the
//! decision price; whatever is still open at the end closes on the last
//! close.

use crate::error::EngineError;
use crate::indicators::atr;
use crate::market::Candle;
use crate::risk::RiskParams;
use crate::store::{CloseReason, SimulatedTrade};
use crate::strategy::{min_required_candles, Strategy, StrategyParams, TradeSide};

/// Dollars moved per lot per $1 of XAUUSD price change.
const PIP_VALUE_PER_LOT: f64 = 100.0;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReplaySummary {
    pub total_trades: i32,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub total_pl: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub summary: ReplaySummary,
    pub trades: Vec<SimulatedTrade>,
}

struct OpenTrade {
    side: TradeSide,
    entry: f64,
    lot: f64,
    stop: f64,
    take: f64,
    opened_at: chrono::DateTime<chrono::Utc>,
}

pub fn trade_profit(side: TradeSide, entry: f64, exit: f64, lot: f64) -> f64 {
    let diff = match side {
        TradeSide::Buy => exit - entry,
        TradeSide::Sell => entry - exit,
    };
    diff * lot * PIP_VALUE_PER_LOT
}

pub fn run_replay(
    candles: &[Candle],
    strategy: &dyn Strategy,
    params: &StrategyParams,
    risk: &RiskParams,
    symbol: &str,
) -> Result<ReplayOutcome, EngineError> {
    let min_lookback = min_required_candles(params);
    if candles.len() < min_lookback {
        return Err(EngineError::InsufficientData(format!(
            "backtest needs at least {} candles, got {}",
            min_lookback,
            candles.len()
        )));
    }

    let atr_series = atr(candles, params.atr_period);
    let mut open: Option<OpenTrade> = None;
    let mut trades: Vec<SimulatedTrade> = Vec::new();

    for i in min_lookback..candles.len() {
        let candle = &candles[i];

        // Stop-loss first, then take-profit, within the same candle.
        if let Some(position) = open.take() {
            let sl_hit = match position.side {
                TradeSide::Buy => candle.low <= position.stop,
                TradeSide::Sell => candle.high >= position.stop,
            };
            let tp_hit = match position.side {
                TradeSide::Buy => candle.high >= position.take,
                TradeSide::Sell => candle.low <= position.take,
            };

            if sl_hit {
                let exit = position.stop;
                trades.push(close_position(
                    symbol,
                    position,
                    exit,
                    CloseReason::Sl,
                    candle.timestamp,
                ));
            } else if tp_hit {
                let exit = position.take;
                trades.push(close_position(
                    symbol,
                    position,
                    exit,
                    CloseReason::Tp,
                    candle.timestamp,
                ));
            } else {
                open = Some(position);
            }
        }

        let history = &candles[..i];
        let decision_price = candle.open;
        let current_atr = atr_series[i - 1];
        let signal = strategy.decide(history, decision_price, params, current_atr);

        let exits_on_signal = match (&open, &signal) {
            (Some(position), Some(signal)) => signal.side == position.side.opposite(),
            _ => false,
        };

        if exits_on_signal {
            if let Some(position) = open.take() {
                trades.push(close_position(
                    symbol,
                    position,
                    decision_price,
                    CloseReason::Signal,
                    candle.timestamp,
                ));
            }
        } else if open.is_none() {
            if let Some(signal) = signal {
                open = Some(OpenTrade {
                    side: signal.side,
                    entry: decision_price,
                    lot: risk.max_lot_size,
                    stop: signal.stop_loss,
                    take: signal.take_profit,
                    opened_at: candle.timestamp,
                });
            }
        }
    }

    if let (Some(position), Some(last)) = (open.take(), candles.last()) {
        let exit = last.close;
        trades.push(close_position(
            symbol,
            position,
            exit,
            CloseReason::EndOfTest,
            last.timestamp,
        ));
    }

    Ok(ReplayOutcome {
        summary: summarize(&trades),
        trades,
    })
}

fn close_position(
    symbol: &str,
    position: OpenTrade,
    exit: f64,
    reason: CloseReason,
    at: chrono::DateTime<chrono::Utc>,
) -> SimulatedTrade {
    let profit = trade_profit(position.side, position.entry, exit, position.lot);
    SimulatedTrade {
        symbol: symbol.to_string(),
        side: position.side,
        lot_size: position.lot,
        open_price: position.entry,
        stop_loss: position.stop,
        take_profit: Some(position.take),
        close_price: exit,
        profit_loss: profit,
        close_reason: reason,
        opened_at: position.opened_at,
        closed_at: at,
    }
}

fn summarize(trades: &[SimulatedTrade]) -> ReplaySummary {
    let total_trades = trades.len() as i32;
    let winning_trades = trades.iter().filter(|t| t.profit_loss > 0.0).count() as i32;
    let losing_trades = trades.iter().filter(|t| t.profit_loss < 0.0).count() as i32;
    let total_pl = trades.iter().map(|t| t.profit_loss).sum();
    let win_rate = if total_trades > 0 {
        winning_trades as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };

    ReplaySummary {
        total_trades,
        winning_trades,
        losing_trades,
        total_pl,
        win_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn profit_sign_follows_direction() {
        assert_close(trade_profit(TradeSide::Buy, 2000.0, 2003.0, 0.01), 3.0);
        assert_close(trade_profit(TradeSide::Buy, 2000.0, 1995.0, 0.01), -5.0);
        assert_close(trade_profit(TradeSide::Sell, 2000.0, 2003.0, 0.01), -3.0);
        assert_close(trade_profit(TradeSide::Sell, 2000.0, 1995.0, 0.01), 5.0);
        assert_eq!(trade_profit(TradeSide::Buy, 2000.0, 2000.0, 0.10), 0.0);
    }

    #[test]
    fn empty_trade_list_summarizes_to_zero_win_rate() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.total_pl, 0.0);
    }
}
