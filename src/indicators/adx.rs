//! Average Directional Index with +DI / -DI.
//!
//! Directional movement and true range are Wilder-smoothed with the same
//! recursion ATR uses; DX is then Wilder-smoothed again into ADX, so the
//! first ADX value lands at index `2 * period - 1`.

use crate::market::Candle;

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalIndex {
    pub plus_di: Vec<Option<f64>>,
    pub minus_di: Vec<Option<f64>>,
    pub adx: Vec<Option<f64>>,
}

pub fn adx(candles: &[Candle], period: usize) -> DirectionalIndex {
    let n = candles.len();
    let mut plus_di = vec![None; n];
    let mut minus_di = vec![None; n];
    let mut adx_out = vec![None; n];

    if period == 0 || n <= period {
        return DirectionalIndex {
            plus_di,
            minus_di,
            adx: adx_out,
        };
    }

    let mut tr = vec![0.0; n];
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let prev = &candles[i - 1];
        let cur = &candles[i];
        tr[i] = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());

        let up_move = cur.high - prev.high;
        let down_move = prev.low - cur.low;
        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
    }

    let p = period as f64;
    let mut sm_tr: f64 = tr[1..=period].iter().sum::<f64>() / p;
    let mut sm_plus: f64 = plus_dm[1..=period].iter().sum::<f64>() / p;
    let mut sm_minus: f64 = minus_dm[1..=period].iter().sum::<f64>() / p;

    let mut dx = vec![0.0; n];
    for i in period..n {
        if i > period {
            sm_tr = (sm_tr * (p - 1.0) + tr[i]) / p;
            sm_plus = (sm_plus * (p - 1.0) + plus_dm[i]) / p;
            sm_minus = (sm_minus * (p - 1.0) + minus_dm[i]) / p;
        }

        let (pdi, ndi) = if sm_tr > 0.0 {
            (100.0 * sm_plus / sm_tr, 100.0 * sm_minus / sm_tr)
        } else {
            (0.0, 0.0)
        };
        plus_di[i] = Some(pdi);
        minus_di[i] = Some(ndi);

        let di_sum = pdi + ndi;
        dx[i] = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (pdi - ndi).abs() / di_sum
        };
    }

    let first_adx = 2 * period - 1;
    if n > first_adx {
        let mut prev: f64 = dx[period..=first_adx].iter().sum::<f64>() / p;
        adx_out[first_adx] = Some(prev);
        for i in (first_adx + 1)..n {
            prev = (prev * (p - 1.0) + dx[i]) / p;
            adx_out[i] = Some(prev);
        }
    }

    DirectionalIndex {
        plus_di,
        minus_di,
        adx: adx_out,
    }
}
