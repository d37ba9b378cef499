//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = k * close[t] + (1 - k) * EMA[t-1], k = 2 / (period + 1),
//! evaluated as EMA[t-1] + k * (close[t] - EMA[t-1]) so a flat series stays
//! exactly flat.
//! Seed: EMA[0] = close[0] (no SMA warm-up window).

/// Running EMA at every index of `values`. Empty when `period` is 0.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);
    for &v in &values[1..] {
        prev += k * (v - prev);
        out.push(prev);
    }
    out
}

/// Latest EMA value, or `None` with fewer than 2 samples.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if values.len() < 2 || period == 0 {
        return None;
    }
    ema_series(values, period).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_unavailable_below_two_samples() {
        assert_eq!(ema(&[], 10), None);
        assert_eq!(ema(&[100.0], 10), None);
    }

    #[test]
    fn ema_zero_period_is_unavailable() {
        assert_eq!(ema(&[1.0, 2.0, 3.0], 0), None);
    }

    #[test]
    fn ema_3_known_values() {
        // k = 2/(3+1) = 0.5, seed 10
        // 11 -> 0.5*11 + 0.5*10 = 10.5
        // 12 -> 0.5*12 + 0.5*10.5 = 11.25
        let series = ema_series(&[10.0, 11.0, 12.0], 3);
        assert_approx(series[0], 10.0, DEFAULT_EPSILON);
        assert_approx(series[1], 10.5, DEFAULT_EPSILON);
        assert_approx(series[2], 11.25, DEFAULT_EPSILON);
        assert_approx(ema(&[10.0, 11.0, 12.0], 3).unwrap(), 11.25, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_period_1_tracks_close() {
        assert_approx(ema(&[5.0, 7.0, 9.0], 1).unwrap(), 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_of_constant_is_constant() {
        let prices = vec![42.0; 50];
        assert_approx(ema(&prices, 30).unwrap(), 42.0, DEFAULT_EPSILON);
    }

    #[test]
    fn series_last_matches_prefix_ema() {
        let prices = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let series = ema_series(&prices, 4);
        for i in 1..prices.len() {
            assert_approx(series[i], ema(&prices[..=i], 4).unwrap(), DEFAULT_EPSILON);
        }
    }
}
