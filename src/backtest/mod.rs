//! Backtest engine: pure candle replay plus report persistence.

pub mod engine;
pub mod runner;

pub use engine::{run_replay, trade_profit, ReplayOutcome, ReplaySummary};
pub use runner::{BacktestRequest, BacktestRunResult, BacktestRunner};
