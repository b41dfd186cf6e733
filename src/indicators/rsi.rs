//! Relative Strength Index with Wilder smoothing.

/// RSI over closes. First valid value lands at index `period`; when the
/// smoothed loss is zero the RSI is 100.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum -= change;
        }
    }

    let mut avg_gain = gain_sum / period as f64;
    let mut avg_loss = loss_sum / period as f64;
    out[period] = Some(rsi_point(avg_gain, avg_loss));

    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = Some(rsi_point(avg_gain, avg_loss));
    }
    out
}

fn rsi_point(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_valid_value_is_at_period_index() {
        let values: Vec<f64> = (0..20).map(|i| 2000.0 + i as f64).collect();
        let out = rsi(&values, 14);
        assert!(out[..14].iter().all(Option::is_none));
        assert!(out[14].is_some());
    }

    #[test]
    fn monotonic_gains_pin_rsi_at_100() {
        let values: Vec<f64> = (0..20).map(|i| 2000.0 + i as f64 * 2.0).collect();
        let out = rsi(&values, 14);
        assert_eq!(out[19], Some(100.0));
    }

    #[test]
    fn values_stay_in_range() {
        let values: Vec<f64> = (0..100)
            .map(|i| 2000.0 + ((i * 37) % 17) as f64 - ((i * 11) % 7) as f64)
            .collect();
        for value in rsi(&values, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value), "rsi out of range: {}", value);
        }
    }

    #[test]
    fn loss_lowers_rsi() {
        let mut values: Vec<f64> = (0..20).map(|i| 2000.0 + i as f64).collect();
        let out_up = rsi(&values, 14);
        let last_up = out_up[19].unwrap();

        values[19] = values[18] - 5.0;
        let out_down = rsi(&values, 14);
        assert!(out_down[19].unwrap() < last_up);
    }
}
