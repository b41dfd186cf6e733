//! Bollinger Bands: SMA middle band with `k` standard deviations either side.

use crate::indicators::sma::{sma, std_dev};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub middle: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

pub fn bollinger(values: &[f64], period: usize, k: f64) -> BollingerBands {
    let middle = sma(values, period);
    let deviation = std_dev(values, period);

    let mut upper = vec![None; values.len()];
    let mut lower = vec![None; values.len()];
    for i in 0..values.len() {
        if let (Some(mid), Some(dev)) = (middle[i], deviation[i]) {
            upper[i] = Some(mid + k * dev);
            lower[i] = Some(mid - k * dev);
        }
    }

    BollingerBands { middle, upper, lower }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_bracket_the_middle() {
        let values = [2.0, 4.0, 6.0, 8.0];
        let bands = bollinger(&values, 3, 2.0);

        assert_eq!(bands.middle[1], None);
        let mid = bands.middle[2].unwrap();
        let dev = (8.0f64 / 3.0).sqrt();
        assert!((bands.upper[2].unwrap() - (mid + 2.0 * dev)).abs() < 1e-12);
        assert!((bands.lower[2].unwrap() - (mid - 2.0 * dev)).abs() < 1e-12);
    }

    #[test]
    fn constant_series_collapses_bands() {
        let values = [5.0; 10];
        let bands = bollinger(&values, 4, 2.0);
        assert_eq!(bands.upper[9], Some(5.0));
        assert_eq!(bands.lower[9], Some(5.0));
    }
}
