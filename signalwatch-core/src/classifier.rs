//! Volatility classifier: buckets log-return volatility into tiers.
//!
//! The tier only decorates messages (suggested target/stop ranges) and gates
//! the compression heuristic; it never changes a score.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::indicators::{volatility_from_log_returns, volume_ratio};

/// Number of trailing closes used for the volatility estimate.
pub const VOLATILITY_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl VolatilityTier {
    pub fn label(self) -> &'static str {
        match self {
            VolatilityTier::Low => "LOW",
            VolatilityTier::Medium => "MEDIUM",
            VolatilityTier::High => "HIGH",
            VolatilityTier::VeryHigh => "VERY HIGH",
        }
    }

    /// Illustrative take-profit range in percent.
    pub fn target_range_pct(self) -> (f64, f64) {
        match self {
            VolatilityTier::Low => (1.0, 2.0),
            VolatilityTier::Medium => (2.0, 4.0),
            VolatilityTier::High => (4.0, 8.0),
            VolatilityTier::VeryHigh => (8.0, 15.0),
        }
    }

    /// Illustrative stop range in percent.
    pub fn stop_range_pct(self) -> (f64, f64) {
        match self {
            VolatilityTier::Low => (0.5, 1.0),
            VolatilityTier::Medium => (1.0, 2.0),
            VolatilityTier::High => (2.0, 3.0),
            VolatilityTier::VeryHigh => (3.0, 5.0),
        }
    }

    /// Calm enough for the compression heuristic.
    pub fn is_calm(self) -> bool {
        matches!(self, VolatilityTier::Low | VolatilityTier::Medium)
    }
}

impl fmt::Display for VolatilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ascending upper bounds for LOW, MEDIUM and HIGH.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            low: 0.002,
            medium: 0.006,
            high: 0.012,
        }
    }
}

impl TierThresholds {
    pub fn is_ascending(&self) -> bool {
        0.0 < self.low && self.low < self.medium && self.medium < self.high
    }

    pub fn classify(&self, volatility: f64) -> VolatilityTier {
        if volatility < self.low {
            VolatilityTier::Low
        } else if volatility < self.medium {
            VolatilityTier::Medium
        } else if volatility < self.high {
            VolatilityTier::High
        } else {
            VolatilityTier::VeryHigh
        }
    }
}

/// Tier plus the raw numbers it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityProfile {
    pub tier: VolatilityTier,
    pub volatility: f64,
    pub volume_ratio: f64,
}

/// Classify the trailing closes and measure the latest volume ratio.
pub fn profile(
    closes: &[f64],
    volumes: &[f64],
    thresholds: &TierThresholds,
    volume_window: usize,
) -> VolatilityProfile {
    let start = closes.len().saturating_sub(VOLATILITY_WINDOW);
    let volatility = volatility_from_log_returns(&closes[start..]);
    VolatilityProfile {
        tier: thresholds.classify(volatility),
        volatility,
        volume_ratio: volume_ratio(volumes, volume_window),
    }
}
