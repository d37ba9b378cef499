//! Composite 0–100 score built from the indicator library.
//!
//! The raw composite is an additive point system. Each component that moves
//! the score pushes a human-readable reason, in a fixed order:
//!
//! 1. EMA fast/slow gap
//! 2. MACD vs signal
//! 3. RSI extremes
//! 4. Range breakout
//! 5. Last move magnitude
//! 6. Volume ratio
//!
//! The raw sum is clamped to [-100, 100] and mapped onto [0, 100] with
//! `(raw + 100) / 2`, truncated.

use serde::{Deserialize, Serialize};

use crate::classifier::{profile, TierThresholds, VolatilityProfile};
use crate::domain::Timeframe;
use crate::indicators::{breakout, ema, macd, rsi, BreakoutDirection, DEFAULT_VOLUME_WINDOW};

/// Point values for each score component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub ema_trend_up: f64,
    pub ema_trend_down: f64,
    pub macd_bullish: f64,
    pub macd_bearish: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub breakout_up: f64,
    pub breakout_down: f64,
    /// Absolute move percentage is capped here before weighting.
    pub move_cap_pct: f64,
    pub move_up_factor: f64,
    pub move_down_factor: f64,
    pub volume_spike: f64,
    pub volume_elevated: f64,
    /// Ratio at which the smaller volume bonus starts.
    pub volume_elevated_ratio: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            ema_trend_up: 20.0,
            ema_trend_down: -15.0,
            macd_bullish: 15.0,
            macd_bearish: -7.0,
            rsi_oversold: 10.0,
            rsi_overbought: -15.0,
            breakout_up: 20.0,
            breakout_down: -10.0,
            move_cap_pct: 25.0,
            move_up_factor: 0.6,
            move_down_factor: 0.4,
            volume_spike: 25.0,
            volume_elevated: 5.0,
            volume_elevated_ratio: 5.0,
        }
    }
}

/// Indicator periods and the levels the score reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalParams {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub breakout_lookback: usize,
    pub breakout_buffer: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub ema_gap_pct: f64,
    pub volume_spike_multiplier: f64,
    pub volume_window: usize,
    pub tiers: TierThresholds,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            ema_fast: 10,
            ema_slow: 30,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            breakout_lookback: 20,
            breakout_buffer: 0.002,
            rsi_oversold: 35.0,
            rsi_overbought: 70.0,
            ema_gap_pct: 0.8,
            volume_spike_multiplier: 100.0,
            volume_window: DEFAULT_VOLUME_WINDOW,
            tiers: TierThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Trend::Up => "bullish",
            Trend::Down => "bearish",
        }
    }
}

/// Raw indicator values behind a score. `None` means not enough history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub volatility: f64,
    pub volume_ratio: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub closes: &'a [f64],
    pub volumes: &'a [f64],
    /// Percentage move over the evaluation window.
    pub variation_pct: f64,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub timeframe: Timeframe,
    /// Always within [0, 100].
    pub normalized_score: u8,
    /// Clamped composite in [-100, 100].
    pub raw: f64,
    pub reasons: Vec<String>,
    pub components: ScoreComponents,
    /// `(ema_fast - ema_slow) / ema_slow * 100`, when both EMAs exist.
    pub ema_gap_pct: Option<f64>,
    pub trend: Option<Trend>,
    pub breakout: Option<BreakoutDirection>,
    pub profile: VolatilityProfile,
}

/// Map a raw composite onto 0–100. Non-finite input counts as 0.
pub fn normalize(raw: f64) -> (f64, u8) {
    let raw = if raw.is_finite() { raw.clamp(-100.0, 100.0) } else { 0.0 };
    (raw, ((raw + 100.0) / 2.0) as u8)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreEngine {
    pub params: SignalParams,
    pub weights: ScoreWeights,
}

impl ScoreEngine {
    pub fn new(params: SignalParams, weights: ScoreWeights) -> Self {
        Self { params, weights }
    }

    pub fn score(&self, input: ScoreInput<'_>) -> ScoreResult {
        let p = &self.params;
        let w = &self.weights;
        let closes = input.closes;

        let mut total = 0.0;
        let mut reasons = Vec::new();

        // 1. EMA trend
        let ema_fast = ema(closes, p.ema_fast);
        let ema_slow = ema(closes, p.ema_slow);
        let ema_gap_pct = match (ema_fast, ema_slow) {
            (Some(f), Some(s)) if s != 0.0 => Some((f - s) / s * 100.0),
            _ => None,
        };
        let mut trend = None;
        if let Some(gap) = ema_gap_pct {
            if gap > p.ema_gap_pct {
                total += w.ema_trend_up;
                trend = Some(Trend::Up);
                reasons.push(format!("EMA{}>EMA{} ({gap:+.2}%)", p.ema_fast, p.ema_slow));
            } else if gap < -p.ema_gap_pct {
                total += w.ema_trend_down;
                trend = Some(Trend::Down);
                reasons.push(format!("EMA{}<EMA{} ({gap:+.2}%)", p.ema_fast, p.ema_slow));
            }
        }

        // 2. MACD
        let m = macd(closes, p.macd_fast, p.macd_slow, p.macd_signal);
        match m.is_bullish() {
            Some(true) => {
                total += w.macd_bullish;
                reasons.push("MACD bullish".to_string());
            }
            Some(false) => {
                total += w.macd_bearish;
                reasons.push("MACD bearish".to_string());
            }
            None => {}
        }

        // 3. RSI
        let rsi_value = rsi(closes, p.rsi_period);
        if let Some(r) = rsi_value {
            if r < p.rsi_oversold {
                total += w.rsi_oversold;
                reasons.push(format!("RSI {r:.1} (oversold)"));
            } else if r > p.rsi_overbought {
                total += w.rsi_overbought;
                reasons.push(format!("RSI {r:.1} (overbought)"));
            }
        }

        // 4. Breakout
        let b = breakout(closes, p.breakout_lookback, p.breakout_buffer);
        match b.direction {
            Some(BreakoutDirection::Up) => total += w.breakout_up,
            Some(BreakoutDirection::Down) => total += w.breakout_down,
            None => {}
        }
        if let Some(reason) = b.reason {
            reasons.push(reason);
        }

        // 5. Move magnitude
        let v = input.variation_pct;
        if v.is_finite() && v != 0.0 {
            let mag = v.abs().min(w.move_cap_pct);
            if v > 0.0 {
                total += mag * w.move_up_factor;
            } else {
                total -= mag * w.move_down_factor;
            }
            reasons.push(format!("Move {v:+.2}%"));
        }

        // 6. Volume
        let prof = profile(closes, input.volumes, &p.tiers, p.volume_window);
        let ratio = prof.volume_ratio;
        if ratio >= p.volume_spike_multiplier {
            total += w.volume_spike;
            reasons.push(format!("Vol spike ~{ratio:.1}×"));
        } else if ratio >= w.volume_elevated_ratio {
            total += w.volume_elevated;
            reasons.push(format!("Vol ratio ~{ratio:.1}×"));
        }

        let (raw, normalized_score) = normalize(total);

        ScoreResult {
            timeframe: input.timeframe,
            normalized_score,
            raw,
            reasons,
            components: ScoreComponents {
                ema_fast,
                ema_slow,
                rsi: rsi_value,
                macd: m.macd,
                macd_signal: m.signal,
                volatility: prof.volatility,
                volume_ratio: ratio,
            },
            ema_gap_pct,
            trend,
            breakout: b.direction,
            profile: prof,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
