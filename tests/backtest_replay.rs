//! Replay-loop scenarios driven by scripted strategies.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;

use xau_engine::backtest::run_replay;
use xau_engine::market::Candle;
use xau_engine::risk::RiskLevel;
use xau_engine::store::CloseReason;
use xau_engine::strategy::{Strategy, StrategyParams, TradeSide, TradeSignal};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).unwrap()
}

fn candle(i: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        timestamp: start_time() + Duration::minutes(15 * i as i64),
        open,
        high,
        low,
        close,
        volume: 0.0,
    }
}

/// Shortest possible lookback so scenarios stay hand-checkable: the replay
/// loop starts at index 2.
fn tiny_params() -> StrategyParams {
    StrategyParams {
        sma_short: 1,
        sma_long: 1,
        bb_period: 1,
        rsi_period: 1,
        atr_period: 1,
        adx_period: 1,
        ..StrategyParams::default()
    }
}

/// Emits a fixed signal when the history length matches a scripted index.
struct ScriptedStrategy {
    signals: HashMap<usize, TradeSignal>,
}

impl ScriptedStrategy {
    fn new(signals: &[(usize, TradeSignal)]) -> Self {
        Self {
            signals: signals.iter().copied().collect(),
        }
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn decide(
        &self,
        history: &[Candle],
        _decision_price: f64,
        _params: &StrategyParams,
        _current_atr: Option<f64>,
    ) -> Option<TradeSignal> {
        self.signals.get(&history.len()).copied()
    }
}

fn buy(stop_loss: f64, take_profit: f64) -> TradeSignal {
    TradeSignal {
        side: TradeSide::Buy,
        stop_loss,
        take_profit,
    }
}

fn sell(stop_loss: f64, take_profit: f64) -> TradeSignal {
    TradeSignal {
        side: TradeSide::Sell,
        stop_loss,
        take_profit,
    }
}

#[test]
fn buy_stop_loss_hit_closes_at_the_stop() {
    let candles = vec![
        candle(0, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(1, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(2, 2000.0, 2002.0, 1998.0, 2001.0), // entry at open 2000
        candle(3, 1999.0, 2001.0, 1994.0, 1998.0), // low breaches the stop
    ];
    let strategy = ScriptedStrategy::new(&[(2, buy(1995.0, 2020.0))]);
    let outcome = run_replay(
        &candles,
        &strategy,
        &tiny_params(),
        &RiskLevel::Conservative.params(),
        "XAUUSD",
    )
    .unwrap();

    assert_eq!(outcome.trades.len(), 1);
    let trade = &outcome.trades[0];
    assert_eq!(trade.close_reason, CloseReason::Sl);
    assert_eq!(trade.close_price, 1995.0);
    assert_close(trade.profit_loss, -5.0); // (1995 - 2000) * 0.01 * 100
    assert_eq!(outcome.summary.losing_trades, 1);
    assert_eq!(outcome.summary.win_rate, 0.0);
}

#[test]
fn sell_stop_loss_triggers_on_the_high() {
    let candles = vec![
        candle(0, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(1, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(2, 2000.0, 2002.0, 1998.0, 2000.0), // SELL entry at 2000
        candle(3, 2001.0, 2006.0, 2000.0, 2004.0), // high breaches stop 2005
    ];
    let strategy = ScriptedStrategy::new(&[(2, sell(2005.0, 1980.0))]);
    let outcome = run_replay(
        &candles,
        &strategy,
        &tiny_params(),
        &RiskLevel::Conservative.params(),
        "XAUUSD",
    )
    .unwrap();

    assert_eq!(outcome.trades.len(), 1);
    assert_eq!(outcome.trades[0].close_reason, CloseReason::Sl);
    assert_eq!(outcome.trades[0].close_price, 2005.0);
    assert_close(outcome.trades[0].profit_loss, -5.0);
}

#[test]
fn take_profit_hit_closes_at_the_target() {
    let candles = vec![
        candle(0, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(1, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(2, 2000.0, 2002.0, 1998.0, 2001.0),
        candle(3, 2005.0, 2012.0, 1999.0, 2008.0), // high reaches the target
    ];
    let strategy = ScriptedStrategy::new(&[(2, buy(1990.0, 2010.0))]);
    let outcome = run_replay(
        &candles,
        &strategy,
        &tiny_params(),
        &RiskLevel::Conservative.params(),
        "XAUUSD",
    )
    .unwrap();

    assert_eq!(outcome.trades.len(), 1);
    let trade = &outcome.trades[0];
    assert_eq!(trade.close_reason, CloseReason::Tp);
    assert_eq!(trade.close_price, 2010.0);
    assert_close(trade.profit_loss, 10.0);
    assert_eq!(outcome.summary.winning_trades, 1);
    assert_eq!(outcome.summary.win_rate, 100.0);
}

#[test]
fn stop_wins_over_target_inside_one_candle() {
    // The candle sweeps both levels; the stop is checked first.
    let candles = vec![
        candle(0, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(1, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(2, 2000.0, 2002.0, 1998.0, 2001.0),
        candle(3, 2000.0, 2015.0, 1993.0, 2005.0),
    ];
    let strategy = ScriptedStrategy::new(&[(2, buy(1995.0, 2010.0))]);
    let outcome = run_replay(
        &candles,
        &strategy,
        &tiny_params(),
        &RiskLevel::Conservative.params(),
        "XAUUSD",
    )
    .unwrap();

    assert_eq!(outcome.trades.len(), 1);
    assert_eq!(outcome.trades[0].close_reason, CloseReason::Sl);
    assert_eq!(outcome.trades[0].close_price, 1995.0);
}

#[test]
fn opposite_signal_exits_at_the_decision_price() {
    let candles = vec![
        candle(0, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(1, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(2, 2000.0, 2002.0, 1998.0, 2001.0), // BUY entry at 2000
        candle(3, 2003.0, 2004.0, 2001.0, 2002.0), // SELL signal: exit at open
    ];
    let strategy = ScriptedStrategy::new(&[
        (2, buy(1990.0, 2020.0)),
        (3, sell(2010.0, 1995.0)),
    ]);
    let outcome = run_replay(
        &candles,
        &strategy,
        &tiny_params(),
        &RiskLevel::Conservative.params(),
        "XAUUSD",
    )
    .unwrap();

    // The exit consumes the signal: no new position opens on that candle.
    assert_eq!(outcome.trades.len(), 1);
    let trade = &outcome.trades[0];
    assert_eq!(trade.close_reason, CloseReason::Signal);
    assert_eq!(trade.close_price, 2003.0);
    assert_close(trade.profit_loss, 3.0); // (2003 - 2000) * 0.01 * 100
}

#[test]
fn same_side_signal_keeps_the_position_open() {
    let candles = vec![
        candle(0, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(1, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(2, 2000.0, 2002.0, 1998.0, 2001.0),
        candle(3, 2002.0, 2003.0, 2001.0, 2002.5),
    ];
    let strategy = ScriptedStrategy::new(&[
        (2, buy(1990.0, 2020.0)),
        (3, buy(1992.0, 2022.0)),
    ]);
    let outcome = run_replay(
        &candles,
        &strategy,
        &tiny_params(),
        &RiskLevel::Conservative.params(),
        "XAUUSD",
    )
    .unwrap();

    assert_eq!(outcome.trades.len(), 1);
    assert_eq!(outcome.trades[0].close_reason, CloseReason::EndOfTest);
    assert_eq!(outcome.trades[0].open_price, 2000.0);
}

#[test]
fn position_left_open_closes_at_the_last_close() {
    let candles = vec![
        candle(0, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(1, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(2, 2000.0, 2002.0, 1998.0, 2001.0),
        candle(3, 2001.0, 2003.0, 2000.0, 2002.0),
    ];
    let strategy = ScriptedStrategy::new(&[(2, buy(1990.0, 2020.0))]);
    let outcome = run_replay(
        &candles,
        &strategy,
        &tiny_params(),
        &RiskLevel::Conservative.params(),
        "XAUUSD",
    )
    .unwrap();

    assert_eq!(outcome.trades.len(), 1);
    let trade = &outcome.trades[0];
    assert_eq!(trade.close_reason, CloseReason::EndOfTest);
    assert_eq!(trade.close_price, 2002.0);
    assert_close(trade.profit_loss, 2.0);
    assert_eq!(trade.closed_at, candles[3].timestamp);
}

#[test]
fn lot_size_comes_from_the_risk_tier() {
    let candles = vec![
        candle(0, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(1, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(2, 2000.0, 2002.0, 1998.0, 2001.0),
        candle(3, 2005.0, 2012.0, 1999.0, 2008.0),
    ];
    let strategy = ScriptedStrategy::new(&[(2, buy(1990.0, 2010.0))]);
    let outcome = run_replay(
        &candles,
        &strategy,
        &tiny_params(),
        &RiskLevel::Risky.params(),
        "XAUUSD",
    )
    .unwrap();

    assert_eq!(outcome.trades[0].lot_size, 0.10);
    assert_close(outcome.trades[0].profit_loss, 100.0); // 10 * 0.10 * 100
}

#[test]
fn aggregation_counts_wins_and_losses() {
    // Trade 1: TP (+10), trade 2: SL (-5), trade 3: open to end (+2).
    let candles = vec![
        candle(0, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(1, 2000.0, 2001.0, 1999.0, 2000.0),
        candle(2, 2000.0, 2002.0, 1998.0, 2001.0),
        candle(3, 2005.0, 2012.0, 2004.0, 2008.0), // TP 2010
        candle(4, 2008.0, 2009.0, 2007.0, 2008.0), // entry 2
        candle(5, 2006.0, 2007.0, 2002.0, 2004.0), // SL 2003
        candle(6, 2004.0, 2005.0, 2003.5, 2006.0), // entry 3, rides to the end
    ];
    let strategy = ScriptedStrategy::new(&[
        (2, buy(1995.0, 2010.0)),
        (4, buy(2003.0, 2030.0)),
        (6, buy(1990.0, 2030.0)),
    ]);
    let outcome = run_replay(
        &candles,
        &strategy,
        &tiny_params(),
        &RiskLevel::Conservative.params(),
        "XAUUSD",
    )
    .unwrap();

    assert_eq!(outcome.summary.total_trades, 3);
    assert_eq!(outcome.summary.winning_trades, 2);
    assert_eq!(outcome.summary.losing_trades, 1);
    let expected_total = 10.0 + -5.0 + 2.0;
    assert!((outcome.summary.total_pl - expected_total).abs() < 1e-9);
    assert!((outcome.summary.win_rate - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn too_few_candles_is_an_insufficient_data_error() {
    let candles = vec![candle(0, 2000.0, 2001.0, 1999.0, 2000.0)];
    let strategy = ScriptedStrategy::new(&[]);
    let result = run_replay(
        &candles,
        &strategy,
        &StrategyParams::default(),
        &RiskLevel::Medium.params(),
        "XAUUSD",
    );
    assert!(result.is_err());
}
