//! Closed set of alert kinds. Cooldowns are tracked per (symbol, AlertType).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown alert type '{0}'")]
pub struct AlertTypeParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertType {
    PriceMoveFast,
    PriceMoveSlow,
    VolumeSpike,
    RsiOverbought,
    RsiOversold,
    BreakoutUp,
    BreakoutDown,
    EmaTrendUp,
    EmaTrendDown,
    WyckoffCompression,
}

impl AlertType {
    pub const ALL: [AlertType; 10] = [
        AlertType::PriceMoveFast,
        AlertType::PriceMoveSlow,
        AlertType::VolumeSpike,
        AlertType::RsiOverbought,
        AlertType::RsiOversold,
        AlertType::BreakoutUp,
        AlertType::BreakoutDown,
        AlertType::EmaTrendUp,
        AlertType::EmaTrendDown,
        AlertType::WyckoffCompression,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::PriceMoveFast => "price-move-fast",
            AlertType::PriceMoveSlow => "price-move-slow",
            AlertType::VolumeSpike => "volume-spike",
            AlertType::RsiOverbought => "rsi-overbought",
            AlertType::RsiOversold => "rsi-oversold",
            AlertType::BreakoutUp => "breakout-up",
            AlertType::BreakoutDown => "breakout-down",
            AlertType::EmaTrendUp => "ema-trend-up",
            AlertType::EmaTrendDown => "ema-trend-down",
            AlertType::WyckoffCompression => "wyckoff-compression",
        }
    }

    /// Upper snake form used in environment keys (`COOLDOWN_VOLUME_SPIKE`).
    pub fn env_suffix(self) -> String {
        self.as_str().replace('-', "_").to_ascii_uppercase()
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = AlertTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        AlertType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| AlertTypeParseError(s.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_label_parses_back() {
        for t in AlertType::ALL {
            assert_eq!(t.as_str().parse::<AlertType>().unwrap(), t);
        }
    }

    #[test]
    fn snake_case_is_accepted() {
        assert_eq!(
            "volume_spike".parse::<AlertType>().unwrap(),
            AlertType::VolumeSpike
        );
    }

    #[test]
    fn env_suffix_is_upper_snake() {
        assert_eq!(AlertType::WyckoffCompression.env_suffix(), "WYCKOFF_COMPRESSION");
    }

    #[test]
    fn serde_matches_as_str() {
        for t in AlertType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }
}
