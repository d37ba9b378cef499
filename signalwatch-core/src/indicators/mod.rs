//! Stateless indicator functions over close/volume series.
//!
//! Every function takes a slice ordered oldest → newest and returns `None`
//! (or a neutral value) when there is not enough history. Short history is
//! the normal case right after start-up, so it is never an error.

pub mod breakout;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod volatility;
pub mod volume;

pub use breakout::{breakout, Breakout, BreakoutDirection, BREAKOUT_DOWN_POINTS, BREAKOUT_UP_POINTS};
pub use ema::{ema, ema_series};
pub use macd::{macd, Macd};
pub use rsi::rsi;
pub use volatility::volatility_from_log_returns;
pub use volume::{volume_ratio, DEFAULT_VOLUME_WINDOW};

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
