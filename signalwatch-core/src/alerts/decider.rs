use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::VolatilityTier;
use crate::config::MonitorConfig;
use crate::domain::{AlertType, Symbol, SymbolTimeframeKey, Timeframe};
use crate::indicators::BreakoutDirection;
use crate::score::ScoreResult;
use crate::state::{MonitorState, Observation, VolumeWindow};

/// Everything known about one (symbol, timeframe) after an evaluation.
#[derive(Debug, Clone, Copy)]
pub struct AlertEvent<'a> {
    pub key: &'a SymbolTimeframeKey,
    pub price: f64,
    pub observation: Observation,
    pub score: &'a ScoreResult,
}

/// A condition that is true right now, before cooldowns are consulted.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub alert_type: AlertType,
    pub reason: String,
}

/// Payload of a fired alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub alert_type: AlertType,
    pub variation_pct: f64,
    pub price: f64,
    pub score: u8,
    /// Trigger reason first, then the score reasons.
    pub reasons: Vec<String>,
    pub tier: VolatilityTier,
    pub fired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub fired: Vec<Alert>,
    /// Types whose condition held but were still cooling. Dropped, not queued.
    pub suppressed: Vec<AlertType>,
}

#[derive(Debug, Clone)]
pub struct AlertDecider {
    enabled: Vec<AlertType>,
    fast: Vec<Timeframe>,
    slow: Vec<Timeframe>,
    thresholds: BTreeMap<Timeframe, f64>,
    cooldowns: HashMap<AlertType, Duration>,
    volume_timeframe: Timeframe,
    volume_spike_multiplier: f64,
    volume_min_usd: f64,
    volume_window: usize,
    rsi_oversold: f64,
    rsi_overbought: f64,
    ema_gap_pct: f64,
    compression_gap_pct: f64,
}

impl AlertDecider {
    pub fn from_config(cfg: &MonitorConfig) -> Self {
        let thresholds = Timeframe::ALL
            .iter()
            .map(|&tf| (tf, cfg.threshold_pct(tf)))
            .collect();
        let cooldowns = AlertType::ALL
            .iter()
            .map(|&t| (t, Duration::seconds(cfg.cooldown_for(t) as i64)))
            .collect();

        Self {
            enabled: cfg.alert_types.clone(),
            fast: cfg.fast_timeframes.clone(),
            slow: cfg.slow_timeframes.clone(),
            thresholds,
            cooldowns,
            volume_timeframe: cfg.volume_timeframe(),
            volume_spike_multiplier: cfg.volume_spike_multiplier,
            volume_min_usd: cfg.volume_min_usd,
            volume_window: cfg.volume_window,
            rsi_oversold: cfg.rsi_oversold,
            rsi_overbought: cfg.rsi_overbought,
            ema_gap_pct: cfg.ema_gap_pct,
            compression_gap_pct: cfg.compression_gap_pct,
        }
    }

    fn enabled(&self, t: AlertType) -> bool {
        self.enabled.contains(&t)
    }

    pub fn cooldown(&self, t: AlertType) -> Duration {
        self.cooldowns.get(&t).copied().unwrap_or_else(Duration::zero)
    }

    /// Conditions that hold for `ev`, in [`AlertType::ALL`] order.
    ///
    /// `volumes` is the symbol's rolling window; the volume-spike condition is
    /// only checked on the timeframe that feeds it.
    pub fn triggered(&self, ev: &AlertEvent<'_>, volumes: Option<&VolumeWindow>) -> Vec<Trigger> {
        let mut out = Vec::new();
        if ev.observation.seeded {
            return out;
        }
        let tf = ev.key.timeframe;
        let v = ev.observation.variation_pct;
        let score = ev.score;
        let mut push = |alert_type: AlertType, reason: String| {
            if self.enabled(alert_type) {
                out.push(Trigger { alert_type, reason });
            }
        };

        let threshold = self.thresholds.get(&tf).copied().unwrap_or_else(|| tf.default_threshold_pct());
        if v.abs() >= threshold {
            let reason = format!("Price move {v:+.2}% on {tf} (threshold {threshold:.1}%)");
            if self.fast.contains(&tf) {
                push(AlertType::PriceMoveFast, reason.clone());
            }
            if self.slow.contains(&tf) {
                push(AlertType::PriceMoveSlow, reason);
            }
        }

        if tf == self.volume_timeframe {
            if let Some(w) = volumes {
                let ratio = w.ratio(self.volume_window);
                let notional = w.latest().unwrap_or(0.0) * ev.price;
                if ratio >= self.volume_spike_multiplier && notional >= self.volume_min_usd {
                    push(AlertType::VolumeSpike, format!("Vol spike ~{ratio:.1}×"));
                }
            }
        }

        if let Some(r) = score.components.rsi {
            if r > self.rsi_overbought {
                push(AlertType::RsiOverbought, format!("RSI {r:.1} (overbought)"));
            } else if r < self.rsi_oversold {
                push(AlertType::RsiOversold, format!("RSI {r:.1} (oversold)"));
            }
        }

        if let Some(direction) = score.breakout {
            let (alert_type, prefix) = match direction {
                BreakoutDirection::Up => (AlertType::BreakoutUp, "Breakout above"),
                BreakoutDirection::Down => (AlertType::BreakoutDown, "Breakdown below"),
            };
            let reason = score
                .reasons
                .iter()
                .find(|r| r.starts_with(prefix))
                .cloned()
                .unwrap_or_else(|| format!("{prefix} recent range"));
            push(alert_type, reason);
        }

        if let Some(gap) = score.ema_gap_pct {
            if gap > self.ema_gap_pct {
                push(AlertType::EmaTrendUp, format!("EMA trend up ({gap:+.2}%)"));
            } else if gap < -self.ema_gap_pct {
                push(AlertType::EmaTrendDown, format!("EMA trend down ({gap:+.2}%)"));
            }
            if score.profile.tier.is_calm() && gap.abs() < self.compression_gap_pct {
                push(
                    AlertType::WyckoffCompression,
                    format!("Compression: {} volatility, EMA gap {gap:+.2}%", score.profile.tier),
                );
            }
        }

        out
    }

    /// Cooled down when never fired, or when strictly more than the cooldown
    /// has elapsed. A timestamp in the future counts as still cooling.
    pub fn is_cooled_down(
        &self,
        state: &MonitorState,
        symbol: &str,
        alert_type: AlertType,
        now: DateTime<Utc>,
    ) -> bool {
        match state.last_alert_at(symbol, alert_type) {
            None => true,
            Some(last) => now.signed_duration_since(last) > self.cooldown(alert_type),
        }
    }

    /// Evaluate every condition for `ev` and fire those that are cooled down.
    /// Each fire restarts that pair's cooldown in `state` before returning, so
    /// the caller can dispatch after releasing the lock.
    pub fn decide(&self, ev: &AlertEvent<'_>, state: &mut MonitorState, now: DateTime<Utc>) -> Decision {
        let mut decision = Decision::default();
        let symbol = &ev.key.symbol;
        let triggers = self.triggered(ev, state.volume_window(symbol));

        for trigger in triggers {
            if !self.is_cooled_down(state, symbol, trigger.alert_type, now) {
                decision.suppressed.push(trigger.alert_type);
                continue;
            }
            state.record_alert(symbol, trigger.alert_type, now);

            let mut reasons = vec![trigger.reason];
            for r in &ev.score.reasons {
                if !reasons.contains(r) {
                    reasons.push(r.clone());
                }
            }
            decision.fired.push(Alert {
                symbol: symbol.clone(),
                timeframe: ev.key.timeframe,
                alert_type: trigger.alert_type,
                variation_pct: ev.observation.variation_pct,
                price: ev.price,
                score: ev.score.normalized_score,
                reasons,
                tier: ev.score.profile.tier,
                fired_at: now,
            });
        }
        decision
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{ScoreEngine, ScoreInput};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn flat_score(tf: Timeframe) -> ScoreResult {
        ScoreEngine::default().score(ScoreInput {
            closes: &[100.0, 100.0],
            volumes: &[],
            variation_pct: 0.0,
            timeframe: tf,
        })
    }

    fn observe(state: &mut MonitorState, key: &SymbolTimeframeKey, price: f64, now: DateTime<Utc>) -> Observation {
        state.observe(key, price, None, now)
    }

    #[test]
    fn seeding_observation_never_fires() {
        let decider = AlertDecider::from_config(&MonitorConfig::default());
        let mut state = MonitorState::default();
        let key = SymbolTimeframeKey::new("BTCUSDT", Timeframe::M1);
        let score = flat_score(Timeframe::M1);
        let obs = Observation {
            prior_price: 100.0,
            variation_pct: 50.0,
            seeded: true,
        };
        let ev = AlertEvent {
            key: &key,
            price: 150.0,
            observation: obs,
            score: &score,
        };
        assert_eq!(decider.decide(&ev, &mut state, t0()), Decision::default());
    }

    #[test]
    fn fast_move_fires_once_then_cools() {
        let decider = AlertDecider::from_config(&MonitorConfig::default());
        let mut state = MonitorState::default();
        let key = SymbolTimeframeKey::new("BTCUSDT", Timeframe::M1);
        let score = flat_score(Timeframe::M1);

        observe(&mut state, &key, 100.0, t0());
        let obs = observe(&mut state, &key, 112.0, t0() + Duration::seconds(10));
        let ev = AlertEvent { key: &key, price: 112.0, observation: obs, score: &score };
        let d = decider.decide(&ev, &mut state, t0() + Duration::seconds(10));
        assert_eq!(d.fired.len(), 1);
        assert_eq!(d.fired[0].alert_type, AlertType::PriceMoveFast);
        assert!(d.fired[0].reasons[0].starts_with("Price move +12.00%"));

        // Condition still true 1 s later: suppressed.
        let d = decider.decide(&ev, &mut state, t0() + Duration::seconds(11));
        assert!(d.fired.is_empty());
        assert_eq!(d.suppressed, vec![AlertType::PriceMoveFast]);
    }

    #[test]
    fn cooldown_boundary_is_strict() {
        let decider = AlertDecider::from_config(&MonitorConfig::default());
        let mut state = MonitorState::default();
        state.record_alert("X", AlertType::PriceMoveFast, t0());
        let cd = decider.cooldown(AlertType::PriceMoveFast);
        assert!(!decider.is_cooled_down(&state, "X", AlertType::PriceMoveFast, t0() + cd));
        assert!(decider.is_cooled_down(
            &state,
            "X",
            AlertType::PriceMoveFast,
            t0() + cd + Duration::seconds(1)
        ));
    }

    #[test]
    fn clock_going_backwards_keeps_cooling() {
        let decider = AlertDecider::from_config(&MonitorConfig::default());
        let mut state = MonitorState::default();
        state.record_alert("X", AlertType::PriceMoveFast, t0());
        assert!(!decider.is_cooled_down(
            &state,
            "X",
            AlertType::PriceMoveFast,
            t0() - Duration::hours(1)
        ));
    }

    #[test]
    fn slow_timeframe_uses_slow_type_and_threshold() {
        let decider = AlertDecider::from_config(&MonitorConfig::default());
        let key = SymbolTimeframeKey::new("ETHUSDT", Timeframe::H1);
        let score = flat_score(Timeframe::H1);
        let small = Observation { prior_price: 100.0, variation_pct: 10.0, seeded: false };
        let big = Observation { prior_price: 100.0, variation_pct: -18.0, seeded: false };

        let ev = AlertEvent { key: &key, price: 110.0, observation: small, score: &score };
        assert!(decider.triggered(&ev, None).is_empty());

        let ev = AlertEvent { key: &key, price: 82.0, observation: big, score: &score };
        let t = decider.triggered(&ev, None);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].alert_type, AlertType::PriceMoveSlow);
    }

    #[test]
    fn volume_spike_needs_ratio_and_notional() {
        let decider = AlertDecider::from_config(&MonitorConfig::default());
        let key = SymbolTimeframeKey::new("SOLUSDT", Timeframe::M1);
        let score = flat_score(Timeframe::M1);
        let obs = Observation { prior_price: 100.0, variation_pct: 0.0, seeded: false };

        let mut w = VolumeWindow::new(100);
        for _ in 0..10 {
            w.push(10.0);
        }
        w.push(1500.0);

        // 1500 × 100 = 150k notional, below the 1M floor.
        let ev = AlertEvent { key: &key, price: 100.0, observation: obs, score: &score };
        assert!(decider.triggered(&ev, Some(&w)).is_empty());

        let ev = AlertEvent { key: &key, price: 1000.0, observation: obs, score: &score };
        let t = decider.triggered(&ev, Some(&w));
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].alert_type, AlertType::VolumeSpike);
        assert_eq!(t[0].reason, "Vol spike ~150.0×");

        // Other timeframes never check the volume window.
        let other = SymbolTimeframeKey::new("SOLUSDT", Timeframe::M3);
        let ev = AlertEvent { key: &other, price: 1000.0, observation: obs, score: &score };
        assert!(decider.triggered(&ev, Some(&w)).is_empty());
    }

    #[test]
    fn disabled_types_never_trigger() {
        let mut cfg = MonitorConfig::default();
        cfg.alert_types = vec![AlertType::PriceMoveSlow];
        let decider = AlertDecider::from_config(&cfg);
        let key = SymbolTimeframeKey::new("BTCUSDT", Timeframe::M1);
        let score = flat_score(Timeframe::M1);
        let obs = Observation { prior_price: 100.0, variation_pct: 30.0, seeded: false };
        let ev = AlertEvent { key: &key, price: 130.0, observation: obs, score: &score };
        assert!(decider.triggered(&ev, None).is_empty());
    }

    #[test]
    fn indicator_types_fire_when_enabled() {
        let mut cfg = MonitorConfig::default();
        cfg.alert_types = AlertType::ALL.to_vec();
        let decider = AlertDecider::from_config(&cfg);

        let mut closes = vec![100.0; 30];
        closes.extend((1..=30).map(|i| 100.0 + i as f64 * 1.5));
        let score = ScoreEngine::default().score(ScoreInput {
            closes: &closes,
            volumes: &[],
            variation_pct: 1.0,
            timeframe: Timeframe::M15,
        });
        let key = SymbolTimeframeKey::new("BTCUSDT", Timeframe::M15);
        let obs = Observation { prior_price: 143.5, variation_pct: 1.0, seeded: false };
        let ev = AlertEvent { key: &key, price: 145.0, observation: obs, score: &score };
        let types: Vec<AlertType> = decider.triggered(&ev, None).iter().map(|t| t.alert_type).collect();

        assert!(types.contains(&AlertType::RsiOverbought));
        assert!(types.contains(&AlertType::BreakoutUp));
        assert!(types.contains(&AlertType::EmaTrendUp));
        assert!(!types.contains(&AlertType::WyckoffCompression));
        assert!(!types.contains(&AlertType::PriceMoveFast));
    }

    #[test]
    fn multiple_types_fire_in_one_cycle_with_independent_cooldowns() {
        let mut cfg = MonitorConfig::default();
        cfg.alert_types = vec![AlertType::PriceMoveFast, AlertType::WyckoffCompression];
        let decider = AlertDecider::from_config(&cfg);
        let mut state = MonitorState::default();
        let key = SymbolTimeframeKey::new("BTCUSDT", Timeframe::M1);
        let score = flat_score(Timeframe::M1);
        let obs = Observation { prior_price: 100.0, variation_pct: 9.0, seeded: false };
        let ev = AlertEvent { key: &key, price: 109.0, observation: obs, score: &score };

        let d = decider.decide(&ev, &mut state, t0());
        let types: Vec<AlertType> = d.fired.iter().map(|a| a.alert_type).collect();
        assert_eq!(types, vec![AlertType::PriceMoveFast, AlertType::WyckoffCompression]);
        assert_eq!(state.last_alert_at("BTCUSDT", AlertType::PriceMoveFast), Some(t0()));
        assert_eq!(state.last_alert_at("BTCUSDT", AlertType::WyckoffCompression), Some(t0()));
    }

    #[test]
    fn reasons_are_deduplicated() {
        let mut cfg = MonitorConfig::default();
        cfg.alert_types = vec![AlertType::VolumeSpike];
        let decider = AlertDecider::from_config(&cfg);
        let mut state = MonitorState::new(100);
        for _ in 0..10 {
            state.push_volume("X", 10.0);
        }
        state.push_volume("X", 1500.0);

        let mut volumes = vec![10.0; 10];
        volumes.push(1500.0);
        let score = ScoreEngine::default().score(ScoreInput {
            closes: &[1000.0; 11],
            volumes: &volumes,
            variation_pct: 0.0,
            timeframe: Timeframe::M1,
        });
        let key = SymbolTimeframeKey::new("X", Timeframe::M1);
        let obs = Observation { prior_price: 1000.0, variation_pct: 0.0, seeded: false };
        let ev = AlertEvent { key: &key, price: 1000.0, observation: obs, score: &score };
        let d = decider.decide(&ev, &mut state, t0());
        assert_eq!(d.fired.len(), 1);
        let spikes = d.fired[0].reasons.iter().filter(|r| r.starts_with("Vol spike")).count();
        assert_eq!(spikes, 1);
    }
}
