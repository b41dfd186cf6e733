//! Technical-indicator library.
//!
//! Every function takes a slice and a period and returns a series of the same
//! length, `None` until enough data has accumulated. The value at index `i`
//! is computed from inputs `[0..=i]` only. All math is plain `f64`:
//! identical inputs yield bit-identical outputs on IEEE-754 platforms, and
//! the backtest engine relies on that.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod rsi;
pub mod sma;

pub use adx::{adx, DirectionalIndex};
pub use atr::{atr, true_range};
pub use bollinger::{bollinger, BollingerBands};
pub use rsi::rsi;
pub use sma::{sma, std_dev};

use crate::market::Candle;

/// Close series out of a candle slice; most close-based indicators start here.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
