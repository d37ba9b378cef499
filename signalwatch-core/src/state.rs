//! In-memory monitor state: price baselines, cooldown timestamps and rolling
//! volume windows.
//!
//! Everything lives in one [`MonitorState`] behind one mutex
//! ([`SharedState`]). Callers hold the lock only for bookkeeping, never
//! across network I/O or indicator math.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AlertType, Symbol, SymbolTimeframeKey, Timeframe};
use crate::indicators::volume_ratio;

/// Bumped whenever [`StateSnapshot`] changes shape.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_VOLUME_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

/// Result of [`MonitorState::observe`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Baseline the variation was measured against.
    pub prior_price: f64,
    pub variation_pct: f64,
    /// First sighting of the key; nothing may fire on it.
    pub seeded: bool,
}

/// Bounded FIFO of volume samples. The oldest sample is evicted on overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl VolumeWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    /// Latest sample against the mean of the `window` samples before it.
    pub fn ratio(&self, window: usize) -> f64 {
        let (a, b) = self.samples.as_slices();
        if b.is_empty() {
            volume_ratio(a, window)
        } else {
            volume_ratio(&self.to_vec(), window)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub symbol: Symbol,
    pub alert_type: AlertType,
    pub last_fired_at: DateTime<Utc>,
}

/// Serializable image of [`MonitorState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub schema_version: u32,
    pub taken_at: DateTime<Utc>,
    pub config_fingerprint: String,
    pub prices: Vec<PriceEntry>,
    pub cooldowns: Vec<CooldownEntry>,
    pub volumes: BTreeMap<Symbol, Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct MonitorState {
    prices: HashMap<SymbolTimeframeKey, PriceObservation>,
    cooldowns: HashMap<(Symbol, AlertType), DateTime<Utc>>,
    volumes: HashMap<Symbol, VolumeWindow>,
    volume_capacity: usize,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME_CAPACITY)
    }
}

impl MonitorState {
    pub fn new(volume_capacity: usize) -> Self {
        Self {
            prices: HashMap::new(),
            cooldowns: HashMap::new(),
            volumes: HashMap::new(),
            volume_capacity: volume_capacity.max(1),
        }
    }

    /// Record `price` as the new baseline for `key` and report the move
    /// against the previous one.
    ///
    /// The variation is computed before the baseline is overwritten. With no
    /// previous baseline the current price is its own prior (0%) and the
    /// observation is flagged as seeding. `volume`, when given, is appended
    /// to the symbol's volume window.
    pub fn observe(
        &mut self,
        key: &SymbolTimeframeKey,
        price: f64,
        volume: Option<f64>,
        now: DateTime<Utc>,
    ) -> Observation {
        let fresh = PriceObservation {
            price,
            observed_at: now,
        };
        let observation = match self.prices.insert(key.clone(), fresh) {
            Some(prev) => {
                let variation_pct = if prev.price > 0.0 {
                    (price - prev.price) / prev.price * 100.0
                } else {
                    0.0
                };
                Observation {
                    prior_price: prev.price,
                    variation_pct,
                    seeded: false,
                }
            }
            None => Observation {
                prior_price: price,
                variation_pct: 0.0,
                seeded: true,
            },
        };

        if let Some(v) = volume {
            self.push_volume(&key.symbol, v);
        }
        observation
    }

    pub fn price(&self, key: &SymbolTimeframeKey) -> Option<PriceObservation> {
        self.prices.get(key).copied()
    }

    pub fn record_alert(&mut self, symbol: &str, alert_type: AlertType, now: DateTime<Utc>) {
        self.cooldowns.insert((symbol.to_string(), alert_type), now);
    }

    pub fn last_alert_at(&self, symbol: &str, alert_type: AlertType) -> Option<DateTime<Utc>> {
        self.cooldowns.get(&(symbol.to_string(), alert_type)).copied()
    }

    pub fn push_volume(&mut self, symbol: &str, value: f64) {
        let capacity = self.volume_capacity;
        self.volumes
            .entry(symbol.to_string())
            .or_insert_with(|| VolumeWindow::new(capacity))
            .push(value);
    }

    pub fn volume_window(&self, symbol: &str) -> Option<&VolumeWindow> {
        self.volumes.get(symbol)
    }

    /// Samples oldest → newest; empty for an unknown symbol.
    pub fn volume_history(&self, symbol: &str) -> Vec<f64> {
        self.volumes.get(symbol).map(VolumeWindow::to_vec).unwrap_or_default()
    }

    pub fn tracked_keys(&self) -> usize {
        self.prices.len()
    }

    pub fn cooldown_entries(&self) -> usize {
        self.cooldowns.len()
    }

    pub fn snapshot(&self, config_fingerprint: &str, now: DateTime<Utc>) -> StateSnapshot {
        let mut prices: Vec<PriceEntry> = self
            .prices
            .iter()
            .map(|(k, o)| PriceEntry {
                symbol: k.symbol.clone(),
                timeframe: k.timeframe,
                price: o.price,
                observed_at: o.observed_at,
            })
            .collect();
        prices.sort_by(|a, b| (&a.symbol, a.timeframe).cmp(&(&b.symbol, b.timeframe)));

        let mut cooldowns: Vec<CooldownEntry> = self
            .cooldowns
            .iter()
            .map(|((symbol, alert_type), at)| CooldownEntry {
                symbol: symbol.clone(),
                alert_type: *alert_type,
                last_fired_at: *at,
            })
            .collect();
        cooldowns.sort_by(|a, b| (&a.symbol, a.alert_type).cmp(&(&b.symbol, b.alert_type)));

        StateSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            taken_at: now,
            config_fingerprint: config_fingerprint.to_string(),
            prices,
            cooldowns,
            volumes: self
                .volumes
                .iter()
                .map(|(s, w)| (s.clone(), w.to_vec()))
                .collect(),
        }
    }

    /// Replace the current contents with `snapshot`. Volume histories longer
    /// than this state's capacity keep only their newest samples.
    pub fn restore(&mut self, snapshot: &StateSnapshot) {
        self.prices = snapshot
            .prices
            .iter()
            .map(|e| {
                (
                    SymbolTimeframeKey::new(e.symbol.clone(), e.timeframe),
                    PriceObservation {
                        price: e.price,
                        observed_at: e.observed_at,
                    },
                )
            })
            .collect();
        self.cooldowns = snapshot
            .cooldowns
            .iter()
            .map(|e| ((e.symbol.clone(), e.alert_type), e.last_fired_at))
            .collect();
        let capacity = self.volume_capacity;
        self.volumes = snapshot
            .volumes
            .iter()
            .map(|(symbol, samples)| {
                let mut w = VolumeWindow::new(capacity);
                for &v in samples {
                    w.push(v);
                }
                (symbol.clone(), w)
            })
            .collect();
    }
}

/// [`MonitorState`] shared between the monitor loops.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<MonitorState>>,
}

impl SharedState {
    pub fn new(state: MonitorState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Lock the state. A poisoned lock is recovered: every mutation leaves the
    /// maps consistent, so a panic elsewhere cannot corrupt them.
    pub fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MonitorState) -> R) -> R {
        f(&mut self.lock())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
