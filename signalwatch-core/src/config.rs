//! Monitor configuration.
//!
//! Loaded in three layers: built-in defaults, an optional TOML file, then
//! environment variables. The result is validated once; any failure is a
//! [`ConfigError`] and the monitor refuses to start.
//!
//! Variable names follow the deployed monitor's `.env` files (`FAST_TFS`,
//! `THRESH_1M`, `COOLDOWN_SECONDS`, ...) so existing environments keep working.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::TierThresholds;
use crate::domain::{parse_timeframe_list, AlertType, Timeframe};
use crate::score::{ScoreEngine, ScoreWeights, SignalParams};

pub const DEFAULT_BYBIT_BASE_URL: &str = "https://api.bybit.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn invalid_value(key: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    // ── Timeframes ──────────────────────────────────────────────────
    pub fast_timeframes: Vec<Timeframe>,
    pub slow_timeframes: Vec<Timeframe>,
    /// Price-move threshold overrides in percent, keyed by timeframe label.
    pub thresholds: BTreeMap<String, f64>,

    // ── Cadence (seconds) ───────────────────────────────────────────
    pub loop_delay_sec: u64,
    pub slow_interval_sec: u64,
    pub report_interval_sec: u64,
    /// 0 disables the heartbeat.
    pub heartbeat_interval_sec: u64,
    pub symbol_refresh_sec: u64,
    pub snapshot_interval_sec: u64,

    // ── Alerts ──────────────────────────────────────────────────────
    pub alert_types: Vec<AlertType>,
    pub cooldown_seconds: u64,
    /// Per-type cooldown overrides, keyed by alert type label.
    pub cooldowns: BTreeMap<String, u64>,
    pub volume_spike_multiplier: f64,
    pub volume_min_usd: f64,
    pub volume_window: usize,
    pub volume_history_capacity: usize,
    /// Timeframe whose latest candle feeds the volume windows. Defaults to
    /// the first fast timeframe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_timeframe: Option<Timeframe>,

    // ── Indicators ──────────────────────────────────────────────────
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
    pub compression_gap_pct: f64,
    pub tiers: TierThresholds,

    // ── Report ──────────────────────────────────────────────────────
    pub report_top_n: usize,
    pub report_score_min: u8,
    pub report_timeframe: Timeframe,
    pub report_candle_limit: usize,

    // ── Fetching ────────────────────────────────────────────────────
    pub candle_limit: usize,
    pub max_workers: usize,
    pub max_symbols: usize,
    /// Static universe. Empty means discover from the exchange.
    pub symbols: Vec<String>,
    pub bybit_base_url: String,

    // ── Outputs ─────────────────────────────────────────────────────
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_ids: Vec<String>,

    pub score: ScoreWeights,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let mut cooldowns = BTreeMap::new();
        cooldowns.insert(AlertType::VolumeSpike.as_str().to_string(), 300);

        Self {
            fast_timeframes: vec![Timeframe::M1, Timeframe::M3],
            slow_timeframes: vec![Timeframe::H1, Timeframe::H4],
            thresholds: BTreeMap::new(),
            loop_delay_sec: 10,
            slow_interval_sec: 300,
            report_interval_sec: 14_400,
            heartbeat_interval_sec: 3_600,
            symbol_refresh_sec: 3_600,
            snapshot_interval_sec: 300,
            alert_types: vec![
                AlertType::PriceMoveFast,
                AlertType::PriceMoveSlow,
                AlertType::VolumeSpike,
            ],
            cooldown_seconds: 180,
            cooldowns,
            volume_spike_multiplier: 100.0,
            volume_min_usd: 1_000_000.0,
            volume_window: 5,
            volume_history_capacity: 100,
            volume_timeframe: None,
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
            compression_gap_pct: 0.25,
            tiers: TierThresholds::default(),
            report_top_n: 10,
            report_score_min: 70,
            report_timeframe: Timeframe::H4,
            report_candle_limit: 120,
            candle_limit: 60,
            max_workers: 8,
            max_symbols: 1_000,
            symbols: Vec::new(),
            bybit_base_url: DEFAULT_BYBIT_BASE_URL.to_string(),
            state_file: None,
            telegram_bot_token: None,
            telegram_chat_ids: Vec::new(),
            score: ScoreWeights::default(),
        }
    }
}

// ── Environment parsing ─────────────────────────────────────────────

fn trimmed(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match trimmed(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid_value(key, &raw, e)),
        None => Ok(None),
    }
}

fn set_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(v) = parse_env(lookup, key)? {
        *slot = v;
    }
    Ok(())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_alert_types(key: &str, raw: &str) -> Result<Vec<AlertType>, ConfigError> {
    let mut out = Vec::new();
    for label in split_list(raw) {
        let t = label
            .parse::<AlertType>()
            .map_err(|e| invalid_value(key, raw, e))?;
        if !out.contains(&t) {
            out.push(t);
        }
    }
    Ok(out)
}

impl MonitorConfig {
    /// Defaults plus overrides from `lookup`, validated.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_overrides(&lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults plus process environment, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Optional TOML file, then process environment, validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        cfg.apply_overrides(&|k: &str| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay every recognised variable `lookup` knows about.
    pub fn apply_overrides(
        &mut self,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = trimmed(lookup, "FAST_TFS") {
            self.fast_timeframes =
                parse_timeframe_list(&raw).map_err(|e| invalid_value("FAST_TFS", &raw, e))?;
        }
        if let Some(raw) = trimmed(lookup, "SLOW_TFS") {
            self.slow_timeframes =
                parse_timeframe_list(&raw).map_err(|e| invalid_value("SLOW_TFS", &raw, e))?;
        }
        for tf in Timeframe::ALL {
            let key = format!("THRESH_{}", tf.env_suffix());
            if let Some(v) = parse_env::<f64>(lookup, &key)? {
                self.thresholds.insert(tf.as_str().to_string(), v);
            }
        }

        set_env(lookup, "LOOP_DELAY", &mut self.loop_delay_sec)?;
        set_env(lookup, "SLOW_INTERVAL_SEC", &mut self.slow_interval_sec)?;
        set_env(lookup, "REPORT_INTERVAL_SEC", &mut self.report_interval_sec)?;
        set_env(lookup, "HEARTBEAT_INTERVAL_SEC", &mut self.heartbeat_interval_sec)?;
        set_env(lookup, "SYMBOL_REFRESH_SEC", &mut self.symbol_refresh_sec)?;
        set_env(lookup, "SNAPSHOT_INTERVAL_SEC", &mut self.snapshot_interval_sec)?;

        if let Some(raw) = trimmed(lookup, "ALERT_TYPES") {
            self.alert_types = parse_alert_types("ALERT_TYPES", &raw)?;
        }
        set_env(lookup, "COOLDOWN_SECONDS", &mut self.cooldown_seconds)?;
        for t in AlertType::ALL {
            let key = format!("COOLDOWN_{}", t.env_suffix());
            if let Some(v) = parse_env::<u64>(lookup, &key)? {
                self.cooldowns.insert(t.as_str().to_string(), v);
            }
        }
        set_env(lookup, "VOLUME_SPIKE_MULTIPLIER", &mut self.volume_spike_multiplier)?;
        set_env(lookup, "VOLUME_MIN_USD", &mut self.volume_min_usd)?;
        set_env(lookup, "VOLUME_WINDOW", &mut self.volume_window)?;
        set_env(lookup, "VOLUME_HISTORY_CAPACITY", &mut self.volume_history_capacity)?;
        if let Some(tf) = parse_env::<Timeframe>(lookup, "VOLUME_TIMEFRAME")? {
            self.volume_timeframe = Some(tf);
        }

        set_env(lookup, "EMA_FAST", &mut self.ema_fast)?;
        set_env(lookup, "EMA_SLOW", &mut self.ema_slow)?;
        set_env(lookup, "RSI_PERIOD", &mut self.rsi_period)?;
        set_env(lookup, "MACD_FAST", &mut self.macd_fast)?;
        set_env(lookup, "MACD_SLOW", &mut self.macd_slow)?;
        set_env(lookup, "MACD_SIGNAL", &mut self.macd_signal)?;
        set_env(lookup, "BREAKOUT_LOOKBACK", &mut self.breakout_lookback)?;
        set_env(lookup, "BREAKOUT_BUFFER", &mut self.breakout_buffer)?;
        set_env(lookup, "RSI_OVERSOLD", &mut self.rsi_oversold)?;
        set_env(lookup, "RSI_OVERBOUGHT", &mut self.rsi_overbought)?;
        set_env(lookup, "EMA_GAP_PCT", &mut self.ema_gap_pct)?;
        set_env(lookup, "COMPRESSION_GAP_PCT", &mut self.compression_gap_pct)?;
        set_env(lookup, "VOL_TIER_LOW", &mut self.tiers.low)?;
        set_env(lookup, "VOL_TIER_MEDIUM", &mut self.tiers.medium)?;
        set_env(lookup, "VOL_TIER_HIGH", &mut self.tiers.high)?;

        set_env(lookup, "REPORT_TOP_N", &mut self.report_top_n)?;
        set_env(lookup, "REPORT_SCORE_MIN", &mut self.report_score_min)?;
        set_env(lookup, "REPORT_TIMEFRAME", &mut self.report_timeframe)?;
        set_env(lookup, "REPORT_CANDLE_LIMIT", &mut self.report_candle_limit)?;

        set_env(lookup, "CANDLE_LIMIT", &mut self.candle_limit)?;
        set_env(lookup, "MAX_WORKERS", &mut self.max_workers)?;
        set_env(lookup, "MAX_SYMBOLS", &mut self.max_symbols)?;
        if let Some(raw) = trimmed(lookup, "SYMBOLS") {
            self.symbols = split_list(&raw).map(str::to_uppercase).collect();
        }
        if let Some(url) = trimmed(lookup, "BYBIT_BASE_URL") {
            self.bybit_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(path) = trimmed(lookup, "STATE_FILE") {
            self.state_file = Some(PathBuf::from(path));
        }
        if let Some(token) = trimmed(lookup, "TELEGRAM_BOT_TOKEN") {
            self.telegram_bot_token = Some(token);
        }
        if let Some(raw) = trimmed(lookup, "TELEGRAM_CHAT_ID") {
            self.telegram_chat_ids = split_list(&raw).map(str::to_string).collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Invalid(msg));

        if self.fast_timeframes.is_empty() {
            return fail("at least one fast timeframe is required".into());
        }
        if let Some(tf) = self.volume_timeframe {
            if !self.fast_timeframes.contains(&tf) && !self.slow_timeframes.contains(&tf) {
                return fail(format!("volume_timeframe {tf} is neither a fast nor a slow timeframe"));
            }
        }
        for key in self.thresholds.keys() {
            if key.parse::<Timeframe>().is_err() {
                return fail(format!("unknown timeframe in thresholds: {key}"));
            }
        }
        for (key, v) in &self.thresholds {
            if !(*v > 0.0) {
                return fail(format!("threshold for {key} must be positive, got {v}"));
            }
        }
        for key in self.cooldowns.keys() {
            if key.parse::<AlertType>().is_err() {
                return fail(format!("unknown alert type in cooldowns: {key}"));
            }
        }

        let periods = [
            ("ema_fast", self.ema_fast),
            ("ema_slow", self.ema_slow),
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("breakout_lookback", self.breakout_lookback),
            ("volume_window", self.volume_window),
            ("candle_limit", self.candle_limit),
            ("report_candle_limit", self.report_candle_limit),
            ("max_workers", self.max_workers),
            ("max_symbols", self.max_symbols),
        ];
        for (name, v) in periods {
            if v == 0 {
                return fail(format!("{name} must be greater than zero"));
            }
        }
        if self.ema_fast >= self.ema_slow {
            return fail(format!(
                "ema_fast ({}) must be below ema_slow ({})",
                self.ema_fast, self.ema_slow
            ));
        }
        if self.macd_fast >= self.macd_slow {
            return fail(format!(
                "macd_fast ({}) must be below macd_slow ({})",
                self.macd_fast, self.macd_slow
            ));
        }

        let intervals = [
            ("loop_delay_sec", self.loop_delay_sec),
            ("slow_interval_sec", self.slow_interval_sec),
            ("report_interval_sec", self.report_interval_sec),
            ("symbol_refresh_sec", self.symbol_refresh_sec),
            ("snapshot_interval_sec", self.snapshot_interval_sec),
        ];
        for (name, v) in intervals {
            if v == 0 {
                return fail(format!("{name} must be greater than zero"));
            }
        }

        if !(self.volume_spike_multiplier > 0.0) {
            return fail("volume_spike_multiplier must be positive".into());
        }
        if self.volume_min_usd < 0.0 || !self.volume_min_usd.is_finite() {
            return fail("volume_min_usd must be a non-negative number".into());
        }
        if self.volume_history_capacity <= self.volume_window {
            return fail(format!(
                "volume_history_capacity ({}) must exceed volume_window ({})",
                self.volume_history_capacity, self.volume_window
            ));
        }
        if !(self.breakout_buffer >= 0.0) {
            return fail("breakout_buffer must be non-negative".into());
        }
        if !(self.ema_gap_pct > 0.0) || !(self.compression_gap_pct > 0.0) {
            return fail("ema_gap_pct and compression_gap_pct must be positive".into());
        }
        if !(self.rsi_oversold < self.rsi_overbought) {
            return fail("rsi_oversold must be below rsi_overbought".into());
        }
        if !self.tiers.is_ascending() {
            return fail("volatility tier thresholds must be positive and ascending".into());
        }
        if self.report_score_min > 100 {
            return fail(format!(
                "report_score_min must be at most 100, got {}",
                self.report_score_min
            ));
        }
        if self.report_top_n == 0 {
            return fail("report_top_n must be greater than zero".into());
        }
        Ok(())
    }

    // ── Derived views ───────────────────────────────────────────────

    /// Price-move threshold in percent for `tf`.
    pub fn threshold_pct(&self, tf: Timeframe) -> f64 {
        self.thresholds
            .get(tf.as_str())
            .copied()
            .unwrap_or_else(|| tf.default_threshold_pct())
    }

    /// Cooldown in seconds for `alert_type`.
    pub fn cooldown_for(&self, alert_type: AlertType) -> u64 {
        self.cooldowns
            .get(alert_type.as_str())
            .copied()
            .unwrap_or(self.cooldown_seconds)
    }

    pub fn volume_timeframe(&self) -> Timeframe {
        self.volume_timeframe
            .or_else(|| self.fast_timeframes.first().copied())
            .unwrap_or(Timeframe::M1)
    }

    pub fn signal_params(&self) -> SignalParams {
        SignalParams {
            ema_fast: self.ema_fast,
            ema_slow: self.ema_slow,
            rsi_period: self.rsi_period,
            macd_fast: self.macd_fast,
            macd_slow: self.macd_slow,
            macd_signal: self.macd_signal,
            breakout_lookback: self.breakout_lookback,
            breakout_buffer: self.breakout_buffer,
            rsi_oversold: self.rsi_oversold,
            rsi_overbought: self.rsi_overbought,
            ema_gap_pct: self.ema_gap_pct,
            volume_spike_multiplier: self.volume_spike_multiplier,
            volume_window: self.volume_window,
            tiers: self.tiers,
        }
    }

    pub fn score_engine(&self) -> ScoreEngine {
        ScoreEngine::new(self.signal_params(), self.score.clone())
    }

    pub fn telegram_configured(&self) -> bool {
        self.telegram_bot_token.is_some() && !self.telegram_chat_ids.is_empty()
    }

    /// blake3 of the canonical JSON form, hex encoded. Maps are `BTreeMap`
    /// so the encoding is stable; the bot token is excluded.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(&self.redacted()).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    /// Copy with secrets masked, for display and fingerprinting.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        if out.telegram_bot_token.is_some() {
            out.telegram_bot_token = Some("***".to_string());
        }
        out
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
