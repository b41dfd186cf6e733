//! Simple moving average and population standard deviation.

/// Mean of the last `period` values. First `period - 1` outputs are `None`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let sum: f64 = window.iter().sum();
        out[i] = Some(sum / period as f64);
    }
    out
}

/// Population standard deviation of the last `period` values around the SMA
/// at the same index.
pub fn std_dev(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let means = sma(values, period);
    let mut out = vec![None; values.len()];

    for i in 0..values.len() {
        let Some(mean) = means[i] else { continue };
        let window = &values[i + 1 - period..=i];
        let variance: f64 = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        out[i] = Some(variance.sqrt());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_alignment_and_values() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&values, 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[3], Some(3.0));
        assert_eq!(out[4], Some(4.0));
    }

    #[test]
    fn sma_short_input_is_all_none() {
        let out = sma(&[1.0, 2.0], 3);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn std_dev_is_population() {
        // Window [2, 4, 6]: mean 4, variance (4+0+4)/3.
        let out = std_dev(&[2.0, 4.0, 6.0], 3);
        let expected = (8.0f64 / 3.0).sqrt();
        assert!((out[2].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn sma_is_deterministic() {
        let values: Vec<f64> = (0..200).map(|i| 2000.0 + (i as f64) * 0.37).collect();
        let a = sma(&values, 14);
        let b = sma(&values, 14);
        assert_eq!(a, b);
    }
}
