//! Range breakout against the prior `lookback` closes.
//!
//! The latest close is compared with the high/low of the `lookback` closes
//! before it (the latest close itself is excluded from the range). A
//! fractional `buffer` widens the range so a touch of the edge is not a break.

use serde::{Deserialize, Serialize};

/// Points awarded for a close above the recent high.
pub const BREAKOUT_UP_POINTS: f64 = 20.0;
/// Points (negative) for a close below the recent low.
pub const BREAKOUT_DOWN_POINTS: f64 = -10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakoutDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Breakout {
    pub direction: Option<BreakoutDirection>,
    /// Signed score: positive above the range, negative below, 0 inside.
    pub score: f64,
    /// Range edge that was broken.
    pub level: Option<f64>,
    pub reason: Option<String>,
}

impl Breakout {
    pub fn is_neutral(&self) -> bool {
        self.direction.is_none()
    }
}

pub fn breakout(prices: &[f64], lookback: usize, buffer: f64) -> Breakout {
    if lookback == 0 || prices.len() < lookback + 1 {
        return Breakout::default();
    }

    let last_idx = prices.len() - 1;
    let last = prices[last_idx];
    let recent = &prices[last_idx - lookback..last_idx];
    let hi = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lo = recent.iter().copied().fold(f64::INFINITY, f64::min);

    if last > hi * (1.0 + buffer) {
        Breakout {
            direction: Some(BreakoutDirection::Up),
            score: BREAKOUT_UP_POINTS,
            level: Some(hi),
            reason: Some(format!("Breakout above recent high {hi:.6}")),
        }
    } else if last < lo * (1.0 - buffer) {
        Breakout {
            direction: Some(BreakoutDirection::Down),
            score: BREAKOUT_DOWN_POINTS,
            level: Some(lo),
            reason: Some(format!("Breakdown below recent low {lo:.6}")),
        }
    } else {
        Breakout::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_history_is_neutral() {
        assert!(breakout(&[1.0, 2.0], 2, 0.0).is_neutral());
    }

    #[test]
    fn close_above_range_breaks_up() {
        let b = breakout(&[10.0, 11.0, 10.5, 12.0], 3, 0.0);
        assert_eq!(b.direction, Some(BreakoutDirection::Up));
        assert_eq!(b.score, BREAKOUT_UP_POINTS);
        assert_eq!(b.level, Some(11.0));
        assert!(b.reason.unwrap().starts_with("Breakout above"));
    }

    #[test]
    fn close_below_range_breaks_down() {
        let b = breakout(&[10.0, 11.0, 10.5, 9.0], 3, 0.0);
        assert_eq!(b.direction, Some(BreakoutDirection::Down));
        assert_eq!(b.score, BREAKOUT_DOWN_POINTS);
        assert_eq!(b.level, Some(10.0));
    }

    #[test]
    fn latest_close_is_excluded_from_range() {
        // If the latest close were part of the range it could never exceed it.
        let b = breakout(&[1.0, 2.0, 3.0], 2, 0.0);
        assert_eq!(b.direction, Some(BreakoutDirection::Up));
    }

    #[test]
    fn buffer_absorbs_marginal_breaks() {
        let prices = [100.0, 100.0, 100.1];
        assert!(breakout(&prices, 2, 0.002).is_neutral());
        assert!(!breakout(&prices, 2, 0.0).is_neutral());
    }

    #[test]
    fn only_lookback_window_counts() {
        // 50 is outside the 2-bar lookback, so 12 still breaks out.
        let b = breakout(&[50.0, 10.0, 11.0, 12.0], 2, 0.0);
        assert_eq!(b.direction, Some(BreakoutDirection::Up));
    }
}
