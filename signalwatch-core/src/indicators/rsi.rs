//! Relative Strength Index (RSI), simple-average variant.
//!
//! Averages gains and losses over the trailing `period` deltas only (no Wilder
//! smoothing). RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! Edge case: avg_loss == 0 → 100.

pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let tail = &prices[prices.len() - (period + 1)..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in tail.windows(2) {
        let diff = pair[1] - pair[0];
        if diff > 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn rsi_unavailable_with_short_history() {
        assert_eq!(rsi(&[1.0, 2.0, 3.0], 3), None);
        assert!(rsi(&[1.0, 2.0, 3.0, 4.0], 3).is_some());
    }

    #[test]
    fn rsi_all_gains() {
        let r = rsi(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0], 3).unwrap();
        assert_approx(r, 100.0, 1e-9);
    }

    #[test]
    fn rsi_all_losses() {
        let r = rsi(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0], 3).unwrap();
        assert_approx(r, 0.0, 1e-9);
    }

    #[test]
    fn rsi_flat_prices_report_100() {
        // No losses at all: the zero-division guard wins.
        let r = rsi(&[50.0; 20], 14).unwrap();
        assert_approx(r, 100.0, 1e-9);
    }

    #[test]
    fn rsi_uses_only_trailing_window() {
        // Changes in the trailing window: +0.34, -0.25, -0.48 over period 3.
        // avg_gain = 0.34/3, avg_loss = 0.73/3 → RSI = 100 - 100/(1 + 0.34/0.73)
        let expected = 100.0 - 100.0 / (1.0 + 0.34 / 0.73);
        let r = rsi(&[10.0, 1.0, 44.0, 44.34, 44.09, 43.61], 3).unwrap();
        assert_approx(r, expected, 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let prices = [100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0];
        for end in 4..=prices.len() {
            let v = rsi(&prices[..end], 3).unwrap();
            assert!((0.0..=100.0).contains(&v), "RSI out of bounds: {v}");
        }
    }
}
