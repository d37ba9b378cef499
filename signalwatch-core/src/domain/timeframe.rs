//! Candle sampling granularities.
//!
//! Labels follow exchange convention (`1m`, `4h`, `1d`, ...) both on the wire
//! and in configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown timeframe '{0}' (expected one of 1m 3m 5m 15m 30m 1h 2h 4h 6h 12h 1d 1w)")]
pub struct TimeframeParseError(pub String);

/// Supported candle granularities, ordered from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 12] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::W1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// Length of one candle in seconds.
    pub fn seconds(self) -> u64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M3 => 3 * 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::M30 => 30 * 60,
            Timeframe::H1 => 3_600,
            Timeframe::H2 => 2 * 3_600,
            Timeframe::H4 => 4 * 3_600,
            Timeframe::H6 => 6 * 3_600,
            Timeframe::H12 => 12 * 3_600,
            Timeframe::D1 => 86_400,
            Timeframe::W1 => 7 * 86_400,
        }
    }

    /// Default absolute price-move threshold (percent) for this granularity.
    pub fn default_threshold_pct(self) -> f64 {
        match self {
            Timeframe::M1 => 7.5,
            Timeframe::M3 => 11.5,
            Timeframe::M5 => 12.0,
            Timeframe::M15 => 13.0,
            Timeframe::M30 => 15.0,
            Timeframe::H1 => 17.0,
            Timeframe::H2 => 14.0,
            Timeframe::H4 => 12.0,
            Timeframe::H6 => 14.0,
            Timeframe::H12 => 16.0,
            Timeframe::D1 => 20.0,
            Timeframe::W1 => 30.0,
        }
    }

    /// Upper-case form used in environment keys (`THRESH_1M`).
    pub fn env_suffix(self) -> String {
        self.as_str().to_ascii_uppercase()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == wanted)
            .ok_or_else(|| TimeframeParseError(s.trim().to_string()))
    }
}

/// Parse a comma-separated timeframe list (`"1m,3m"`), skipping blanks.
pub fn parse_timeframe_list(raw: &str) -> Result<Vec<Timeframe>, TimeframeParseError> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let tf: Timeframe = part.parse()?;
        if !out.contains(&tf) {
            out.push(tf);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_roundtrip_through_from_str() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_trims() {
        assert_eq!(" 4H ".parse::<Timeframe>().unwrap(), Timeframe::H4);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "2m".parse::<Timeframe>().unwrap_err();
        assert_eq!(err.0, "2m");
    }

    #[test]
    fn list_parsing_dedups_and_skips_blanks() {
        let tfs = parse_timeframe_list("1m, 3m,,1m").unwrap();
        assert_eq!(tfs, vec![Timeframe::M1, Timeframe::M3]);
    }

    #[test]
    fn serde_uses_exchange_labels() {
        let json = serde_json::to_string(&Timeframe::H4).unwrap();
        assert_eq!(json, "\"4h\"");
        let back: Timeframe = serde_json::from_str("\"1w\"").unwrap();
        assert_eq!(back, Timeframe::W1);
    }

    #[test]
    fn ordering_is_by_granularity() {
        assert!(Timeframe::M1 < Timeframe::H1);
        assert!(Timeframe::D1.seconds() > Timeframe::H12.seconds());
    }
}
