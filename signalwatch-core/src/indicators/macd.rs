//! MACD and its signal line.
//!
//! MACD = EMA(fast) - EMA(slow). The signal line is the EMA over `signal`
//! periods of the MACD series, where the series holds the MACD value as it
//! stood at every index from `slow - 1` to the end. Because the EMA here is
//! seeded with the first sample, the value "as it stood" at index i equals the
//! running EMA at i, so the series is built in one pass.

use super::ema::{ema, ema_series};

/// MACD line and signal line; either may be unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Macd {
    pub macd: Option<f64>,
    pub signal: Option<f64>,
}

impl Macd {
    /// `Some(true)` when MACD is above its signal, `Some(false)` when below,
    /// `None` when either line is missing or they are equal.
    pub fn is_bullish(&self) -> Option<bool> {
        match (self.macd, self.signal) {
            (Some(m), Some(s)) if m > s => Some(true),
            (Some(m), Some(s)) if m < s => Some(false),
            _ => None,
        }
    }
}

pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    if slow == 0 || fast == 0 || prices.len() < slow || prices.len() < 2 {
        return Macd::default();
    }

    let fast_series = ema_series(prices, fast);
    let slow_series = ema_series(prices, slow);
    let last = prices.len() - 1;
    let macd_value = fast_series[last] - slow_series[last];

    // A series point at index 0 would come from a single-sample EMA, which is
    // unavailable; slow >= 2 keeps the start at index 1 or later.
    let start = (slow - 1).max(1);
    let series: Vec<f64> = (start..prices.len())
        .map(|i| fast_series[i] - slow_series[i])
        .collect();

    let signal_value = if signal == 0 || series.len() < signal {
        None
    } else {
        ema(&series, signal)
    };

    Macd {
        macd: Some(macd_value),
        signal: signal_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn macd_unavailable_below_slow_period() {
        let m = macd(&ramp(25), 12, 26, 9);
        assert_eq!(m, Macd::default());
    }

    #[test]
    fn signal_unavailable_until_series_long_enough() {
        // 26 samples → series of length 1 (< 9)
        let m = macd(&ramp(26), 12, 26, 9);
        assert!(m.macd.is_some());
        assert!(m.signal.is_none());

        // 34 samples → series of length 9
        let m = macd(&ramp(34), 12, 26, 9);
        assert!(m.signal.is_some());
    }

    #[test]
    fn macd_matches_prefix_recomputation() {
        let prices: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 5.0)
            .collect();
        let m = macd(&prices, 12, 26, 9);

        let naive_series: Vec<f64> = (25..prices.len())
            .map(|i| {
                ema(&prices[..=i], 12).unwrap() - ema(&prices[..=i], 26).unwrap()
            })
            .collect();
        let naive_signal = ema(&naive_series, 9).unwrap();
        let naive_macd = ema(&prices, 12).unwrap() - ema(&prices, 26).unwrap();

        assert_approx(m.macd.unwrap(), naive_macd, DEFAULT_EPSILON);
        assert_approx(m.signal.unwrap(), naive_signal, 1e-9);
    }

    #[test]
    fn rising_prices_are_bullish() {
        let mut prices = vec![100.0; 40];
        prices.extend((1..=20).map(|i| 100.0 + i as f64 * 2.0));
        assert_eq!(macd(&prices, 12, 26, 9).is_bullish(), Some(true));
    }

    #[test]
    fn flat_prices_are_neutral() {
        let prices = vec![10.0; 60];
        assert_eq!(macd(&prices, 12, 26, 9).is_bullish(), None);
    }
}
