//! Monitor cycles against in-memory market data and notifier doubles.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use signalwatch_core::data::{DataError, MarketData, StaticSymbols};
use signalwatch_core::domain::{AlertType, Candle, SymbolTimeframeKey, Timeframe};
use signalwatch_core::notify::{Notifier, NotifyError};
use signalwatch_core::MonitorConfig;
use signalwatch_runner::{load_snapshot, Monitor};

// ── Doubles ──────────────────────────────────────────────────────────

/// Serves whatever series was last set for a symbol, on every timeframe.
#[derive(Default)]
struct ScriptedMarket {
    series: Mutex<HashMap<String, Vec<Candle>>>,
    down: Mutex<HashSet<String>>,
}

impl ScriptedMarket {
    fn set(&self, symbol: &str, closes: &[f64], volume: f64) {
        self.series
            .lock()
            .unwrap()
            .insert(symbol.to_string(), candles(closes, volume));
    }

    fn take_down(&self, symbol: &str) {
        self.down.lock().unwrap().insert(symbol.to_string());
    }
}

impl MarketData for ScriptedMarket {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError> {
        if self.down.lock().unwrap().contains(symbol) {
            return Err(DataError::NetworkUnreachable("scripted outage".into()));
        }
        let series = self.series.lock().unwrap();
        let candles = series.get(symbol).ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;
        if candles.is_empty() {
            return Err(DataError::Empty {
                symbol: symbol.to_string(),
                timeframe,
            });
        }
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn notify(&self, text: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn candles(closes: &[f64], volume: f64) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle {
            open_time: Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
            open: c,
            high: c,
            low: c,
            close: c,
            volume,
        })
        .collect()
}

fn flat(price: f64, n: usize) -> Vec<f64> {
    vec![price; n]
}

fn jumped(from: f64, to: f64) -> Vec<f64> {
    let mut closes = flat(from, 29);
    closes.push(to);
    closes
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap()
}

fn config(symbols: &[&str]) -> MonitorConfig {
    MonitorConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        fast_timeframes: vec![Timeframe::M1],
        slow_timeframes: vec![],
        max_workers: 2,
        ..MonitorConfig::default()
    }
}

fn monitor(
    cfg: MonitorConfig,
    market: &Arc<ScriptedMarket>,
    notifier: &Arc<RecordingNotifier>,
) -> Monitor {
    let symbols = Arc::new(StaticSymbols::new(cfg.symbols.clone()));
    let m = Monitor::new(cfg, market.clone(), symbols, notifier.clone()).unwrap();
    assert!(m.refresh_universe(t0()));
    m
}

// ── Fast cycle ───────────────────────────────────────────────────────

#[test]
fn first_cycle_only_seeds() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &jumped(100.0, 112.0), 10.0);
    let m = monitor(config(&["BTCUSDT"]), &market, &notifier);

    let summary = m.fast_cycle(t0());
    assert_eq!(summary.keys, 1);
    assert_eq!(summary.seeded, 1);
    assert_eq!(summary.fired, 0);
    assert!(notifier.sent().is_empty());
}

#[test]
fn price_jump_fires_once_per_cooldown() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &flat(100.0, 30), 10.0);
    let m = monitor(config(&["BTCUSDT"]), &market, &notifier);

    m.fast_cycle(t0());
    market.set("BTCUSDT", &jumped(100.0, 112.0), 10.0);
    let second = m.fast_cycle(t0() + Duration::seconds(10));
    assert_eq!(second.fired, 1);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("BTCUSDT"));
    assert!(sent[0].contains("+12.00%"));

    // Another big move inside the 180 s cooldown is dropped.
    market.set("BTCUSDT", &jumped(112.0, 125.0), 10.0);
    let third = m.fast_cycle(t0() + Duration::seconds(20));
    assert_eq!(third.fired, 0);
    assert_eq!(third.suppressed, 1);
    assert_eq!(notifier.sent().len(), 1);

    // Past the cooldown it may fire again.
    market.set("BTCUSDT", &jumped(125.0, 140.0), 10.0);
    let fourth = m.fast_cycle(t0() + Duration::seconds(20 + 181));
    assert_eq!(fourth.fired, 1);
    assert_eq!(m.stats().alerts_fired, 2);
}

#[test]
fn failed_dispatch_keeps_cooldown() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("ETHUSDT", &flat(2_000.0, 30), 10.0);
    let m = monitor(config(&["ETHUSDT"]), &market, &notifier);
    m.fast_cycle(t0());

    notifier.failing.store(true, Ordering::SeqCst);
    market.set("ETHUSDT", &jumped(2_000.0, 2_300.0), 10.0);
    let fired = m.fast_cycle(t0() + Duration::seconds(10));
    assert_eq!(fired.fired, 1);
    assert_eq!(fired.notify_failures, 1);
    assert_eq!(m.stats().notify_failures, 1);
    assert!(m
        .state()
        .lock()
        .last_alert_at("ETHUSDT", AlertType::PriceMoveFast)
        .is_some());

    notifier.failing.store(false, Ordering::SeqCst);
    market.set("ETHUSDT", &jumped(2_300.0, 2_700.0), 10.0);
    let retry = m.fast_cycle(t0() + Duration::seconds(20));
    assert_eq!(retry.fired, 0);
    assert!(notifier.sent().is_empty());
}

#[test]
fn fetch_failure_skips_key_without_touching_state() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &flat(100.0, 30), 10.0);
    market.set("SOLUSDT", &flat(150.0, 30), 10.0);
    market.take_down("SOLUSDT");
    let m = monitor(config(&["BTCUSDT", "SOLUSDT"]), &market, &notifier);

    let summary = m.fast_cycle(t0());
    assert_eq!(summary.keys, 2);
    assert_eq!(summary.seeded, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(m.stats().fetch_failures, 1);

    let sol = SymbolTimeframeKey::new("SOLUSDT", Timeframe::M1);
    assert!(m.state().lock().price(&sol).is_none());
}

#[test]
fn volume_spike_fires_on_volume_timeframe() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &flat(100.0, 30), 10.0);
    let m = monitor(config(&["BTCUSDT"]), &market, &notifier);

    for i in 0..6 {
        m.fast_cycle(t0() + Duration::seconds(i * 10));
    }
    assert!(notifier.sent().is_empty());

    // 15 000 units at 100 is 1.5M notional and 1500x the recent mean.
    market.set("BTCUSDT", &flat(100.0, 30), 15_000.0);
    let summary = m.fast_cycle(t0() + Duration::seconds(60));
    assert_eq!(summary.fired, 1);
    assert_eq!(m.state().lock().volume_history("BTCUSDT").len(), 7);
    assert!(notifier.sent()[0].contains("Vol spike"));
}

#[test]
fn slow_timeframes_do_not_feed_volume_window() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &flat(100.0, 30), 10.0);
    let cfg = MonitorConfig {
        slow_timeframes: vec![Timeframe::H1],
        ..config(&["BTCUSDT"])
    };
    let m = monitor(cfg, &market, &notifier);

    m.fast_cycle(t0());
    m.slow_cycle(t0());
    m.slow_cycle(t0() + Duration::seconds(300));
    assert_eq!(m.state().lock().volume_history("BTCUSDT").len(), 1);
    assert_eq!(m.state().lock().tracked_keys(), 2);
}

// ── Report / heartbeat ───────────────────────────────────────────────

#[test]
fn report_with_no_candidates_is_one_message() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &flat(100.0, 120), 10.0);
    market.set("ETHUSDT", &flat(2_000.0, 120), 10.0);
    let m = monitor(config(&["BTCUSDT", "ETHUSDT"]), &market, &notifier);

    let report = m.report_cycle(t0());
    assert_eq!(report.scanned, 2);
    assert!(report.entries.is_empty());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("No candidates"));
    assert_eq!(m.stats().reports_sent, 1);
}

#[test]
fn scan_ranks_every_symbol() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let rising: Vec<f64> = (0..120).map(|i| 100.0 + i as f64).collect();
    market.set("BTCUSDT", &flat(100.0, 120), 10.0);
    market.set("SOLUSDT", &rising, 10.0);
    let m = monitor(config(&["BTCUSDT", "SOLUSDT"]), &market, &notifier);

    let report = m.scan(Timeframe::H4, t0());
    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.entries[0].symbol, "SOLUSDT");
    assert!(report.entries[0].score > report.entries[1].score);
    assert!(notifier.sent().is_empty());
}

#[test]
fn heartbeat_reports_liveness() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &flat(100.0, 30), 10.0);
    let m = monitor(config(&["BTCUSDT"]), &market, &notifier);
    m.fast_cycle(t0());

    m.heartbeat(t0());
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Heartbeat"));
    assert!(sent[0].contains("Symbols: 1"));
    assert_eq!(m.stats().heartbeats_sent, 1);
}

// ── Persistence / run ────────────────────────────────────────────────

#[test]
fn restored_baseline_is_not_reseeded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let cfg = MonitorConfig {
        state_file: Some(path.clone()),
        ..config(&["BTCUSDT"])
    };

    market.set("BTCUSDT", &flat(100.0, 30), 10.0);
    let first = monitor(cfg.clone(), &market, &notifier);
    first.fast_cycle(t0());
    assert!(first.snapshot(t0()));

    let second = monitor(cfg, &market, &notifier);
    assert!(second.restore());
    market.set("BTCUSDT", &jumped(100.0, 112.0), 10.0);
    let summary = second.fast_cycle(t0() + Duration::seconds(10));
    assert_eq!(summary.seeded, 0);
    assert_eq!(summary.fired, 1);
}

#[test]
fn restore_without_state_file_is_fresh() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let m = monitor(config(&["BTCUSDT"]), &market, &notifier);
    assert!(!m.restore());
    assert!(!m.snapshot(t0()));
}

#[test]
fn bounded_run_stops_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &flat(100.0, 30), 10.0);
    let cfg = MonitorConfig {
        state_file: Some(path.clone()),
        ..config(&["BTCUSDT"])
    };
    let m = monitor(cfg, &market, &notifier);

    let shutdown = Arc::new(AtomicBool::new(false));
    let stats = m.run(shutdown.clone(), Some(1)).unwrap();
    assert_eq!(stats.fast_cycles, 1);
    assert!(shutdown.load(Ordering::SeqCst));

    let snapshot = load_snapshot(&path).unwrap();
    assert_eq!(snapshot.prices.len(), 1);
    assert_eq!(snapshot.config_fingerprint, m.config().fingerprint());
}

#[test]
fn preset_shutdown_runs_nothing() {
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &flat(100.0, 30), 10.0);
    let m = monitor(config(&["BTCUSDT"]), &market, &notifier);

    let stats = m.run(Arc::new(AtomicBool::new(true)), None).unwrap();
    assert_eq!(stats.fast_cycles, 0);
    assert!(notifier.sent().is_empty());
}

#[test]
fn external_stop_writes_final_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let market = Arc::new(ScriptedMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    market.set("BTCUSDT", &flat(100.0, 30), 10.0);
    let cfg = MonitorConfig {
        state_file: Some(path.clone()),
        snapshot_interval_sec: 3_600,
        ..config(&["BTCUSDT"])
    };
    let m = monitor(cfg, &market, &notifier);
    let shutdown = Arc::new(AtomicBool::new(false));

    let stats = std::thread::scope(|s| {
        let running = s.spawn(|| m.run(Arc::clone(&shutdown), None));
        while m.stats().fast_cycles == 0 {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(load_snapshot(&path).is_none());
        shutdown.store(true, Ordering::SeqCst);
        running.join().unwrap().unwrap()
    });

    assert!(stats.fast_cycles >= 1);
    let snapshot = load_snapshot(&path).unwrap();
    assert_eq!(snapshot.prices.len(), 1);
}
