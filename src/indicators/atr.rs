//! True range and Average True Range (Wilder).

use crate::market::Candle;

/// Raw TR series; index 0 has no previous close and is left at 0.0. Callers
/// must not read index 0.
fn true_range_raw(candles: &[Candle]) -> Vec<f64> {
    let mut out = vec![0.0; candles.len()];
    for i in 1..candles.len() {
        let prev_close = candles[i - 1].close;
        let c = &candles[i];
        out[i] = (c.high - c.low)
            .max((c.high - prev_close).abs())
            .max((c.low - prev_close).abs());
    }
    out
}

/// True range, aligned: index 0 is `None`.
pub fn true_range(candles: &[Candle]) -> Vec<Option<f64>> {
    let raw = true_range_raw(candles);
    let mut out = vec![None; candles.len()];
    for i in 1..candles.len() {
        out[i] = Some(raw[i]);
    }
    out
}

/// ATR. First value at index `period` is the arithmetic mean of
/// TR[1..=period]; later values use Wilder smoothing.
pub fn atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() <= period {
        return out;
    }

    let tr = true_range_raw(candles);
    let first: f64 = tr[1..=period].iter().sum::<f64>() / period as f64;
    out[period] = Some(first);

    let mut prev = first;
    for i in (period + 1)..candles.len() {
        prev = (prev * (period as f64 - 1.0) + tr[i]) / period as f64;
        out[i] = Some(prev);
    }
    out
}

#[cfg(test)]
pub(crate) fn candles_from_ohlc(rows: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            timestamp: start + Duration::minutes(15 * i as i64),
            open,
            high,
            low,
            close,
            volume: 0.0,
        })
        .collect()
}
