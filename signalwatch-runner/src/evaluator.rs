//! One (symbol, timeframe) key evaluated end to end.
//!
//! Fetch, observe, score, decide, dispatch. The shared state lock is held
//! only for the observe and decide steps; network I/O and indicator math run
//! outside it, and alerts are dispatched after it is released.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use signalwatch_core::alerts::{format_alert, Alert, AlertDecider, AlertEvent};
use signalwatch_core::data::{DataError, MarketData};
use signalwatch_core::domain::{closes, volumes, AlertType, SymbolTimeframeKey, Timeframe};
use signalwatch_core::notify::Notifier;
use signalwatch_core::score::{ScoreEngine, ScoreInput};
use signalwatch_core::state::{Observation, SharedState};
use signalwatch_core::MonitorConfig;

use crate::stats::MonitorStats;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("fetch failed for {key}: {source}")]
    Fetch {
        key: SymbolTimeframeKey,
        #[source]
        source: DataError,
    },

    #[error("unusable price {price} for {key}")]
    InvalidPrice { key: SymbolTimeframeKey, price: f64 },
}

/// What happened to one key in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub key: SymbolTimeframeKey,
    pub price: f64,
    pub observation: Observation,
    /// Normalized score; `None` on a seeding observation, which is not scored.
    pub score: Option<u8>,
    pub fired: Vec<Alert>,
    pub suppressed: Vec<AlertType>,
    pub notify_failures: usize,
}

pub struct Evaluator {
    market: Arc<dyn MarketData>,
    notifier: Arc<dyn Notifier>,
    state: SharedState,
    stats: Arc<MonitorStats>,
    engine: ScoreEngine,
    decider: AlertDecider,
    candle_limit: usize,
    volume_timeframe: Timeframe,
}

impl Evaluator {
    pub fn new(
        config: &MonitorConfig,
        market: Arc<dyn MarketData>,
        notifier: Arc<dyn Notifier>,
        state: SharedState,
        stats: Arc<MonitorStats>,
    ) -> Self {
        Self {
            market,
            notifier,
            state,
            stats,
            engine: config.score_engine(),
            decider: AlertDecider::from_config(config),
            candle_limit: config.candle_limit,
            volume_timeframe: config.volume_timeframe(),
        }
    }

    pub fn evaluate(&self, key: &SymbolTimeframeKey, now: DateTime<Utc>) -> Result<Evaluation, EvalError> {
        let candles = self
            .market
            .fetch_candles(&key.symbol, key.timeframe, self.candle_limit)
            .map_err(|source| self.fetch_failed(key, source))?;
        let Some(last) = candles.last() else {
            let source = DataError::Empty {
                symbol: key.symbol.clone(),
                timeframe: key.timeframe,
            };
            return Err(self.fetch_failed(key, source));
        };
        let price = last.close;
        if !price.is_finite() || price <= 0.0 {
            self.stats.record_fetch_failure();
            return Err(EvalError::InvalidPrice {
                key: key.clone(),
                price,
            });
        }
        self.stats.record_evaluation();

        let volume = (key.timeframe == self.volume_timeframe).then_some(last.volume);
        let observation = self.state.with(|s| s.observe(key, price, volume, now));
        if observation.seeded {
            tracing::debug!(key = %key, price, "baseline seeded");
            return Ok(Evaluation {
                key: key.clone(),
                price,
                observation,
                score: None,
                fired: Vec::new(),
                suppressed: Vec::new(),
                notify_failures: 0,
            });
        }

        let c = closes(&candles);
        let v = volumes(&candles);
        let score = self.engine.score(ScoreInput {
            closes: &c,
            volumes: &v,
            variation_pct: observation.variation_pct,
            timeframe: key.timeframe,
        });

        let event = AlertEvent {
            key,
            price,
            observation,
            score: &score,
        };
        let decision = self.state.with(|s| self.decider.decide(&event, s, now));

        if !decision.suppressed.is_empty() {
            tracing::debug!(key = %key, suppressed = ?decision.suppressed, "alerts suppressed by cooldown");
        }
        self.stats.record_suppressed(decision.suppressed.len());
        self.stats.record_fired(decision.fired.len());

        let notify_failures = decision
            .fired
            .iter()
            .filter(|alert| !self.dispatch(alert))
            .count();

        Ok(Evaluation {
            key: key.clone(),
            price,
            observation,
            score: Some(score.normalized_score),
            fired: decision.fired,
            suppressed: decision.suppressed,
            notify_failures,
        })
    }

    fn fetch_failed(&self, key: &SymbolTimeframeKey, source: DataError) -> EvalError {
        self.stats.record_fetch_failure();
        tracing::debug!(key = %key, error = %source, "fetch failed, key skipped this cycle");
        EvalError::Fetch {
            key: key.clone(),
            source,
        }
    }

    /// Send one alert. The cooldown was already recorded and stays either way.
    fn dispatch(&self, alert: &Alert) -> bool {
        tracing::info!(
            symbol = %alert.symbol,
            timeframe = %alert.timeframe,
            alert_type = %alert.alert_type,
            variation_pct = alert.variation_pct,
            score = alert.score,
            "alert fired"
        );
        match self.notifier.notify(&format_alert(alert)) {
            Ok(()) => true,
            Err(e) => {
                self.stats.record_notify_failure();
                tracing::warn!(
                    notifier = self.notifier.name(),
                    symbol = %alert.symbol,
                    alert_type = %alert.alert_type,
                    error = %e,
                    "alert dispatch failed"
                );
                false
            }
        }
    }
}
