//! The monitor: every cadence driven from its own named thread.
//!
//! The fast loop scans all symbols on the fast timeframes every
//! `loop_delay_sec`. Slow scans, reports, heartbeats, universe refreshes and
//! snapshots run on independent threads at their own intervals. Fetching is
//! fanned out over a private rayon pool sized by `max_workers`, so the
//! global rayon pool is never touched.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use signalwatch_core::alerts::{format_heartbeat, HeartbeatInfo};
use signalwatch_core::data::{MarketData, SymbolSource, Universe};
use signalwatch_core::domain::{SymbolTimeframeKey, Timeframe};
use signalwatch_core::notify::Notifier;
use signalwatch_core::report::{format_report, Report, ReportBuilder, ReportEntry};
use signalwatch_core::state::{MonitorState, SharedState};
use signalwatch_core::MonitorConfig;

use crate::evaluator::{EvalError, Evaluation, Evaluator};
use crate::persistence::{load_snapshot, save_snapshot};
use crate::stats::{MonitorStats, StatsSnapshot};

/// Granularity of interruptible sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("a monitor thread panicked")]
    ThreadPanicked,
}

/// Totals for one pass over a set of keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub keys: usize,
    pub evaluated: usize,
    pub seeded: usize,
    pub skipped: usize,
    pub fired: usize,
    pub suppressed: usize,
    pub notify_failures: usize,
}

impl CycleSummary {
    fn absorb(&mut self, result: &Result<Evaluation, EvalError>) {
        match result {
            Ok(ev) if ev.score.is_none() => self.seeded += 1,
            Ok(ev) => {
                self.evaluated += 1;
                self.fired += ev.fired.len();
                self.suppressed += ev.suppressed.len();
                self.notify_failures += ev.notify_failures;
            }
            Err(_) => self.skipped += 1,
        }
    }
}

pub struct Monitor {
    config: MonitorConfig,
    fingerprint: String,
    market: Arc<dyn MarketData>,
    notifier: Arc<dyn Notifier>,
    universe: Universe,
    state: SharedState,
    stats: Arc<MonitorStats>,
    evaluator: Evaluator,
    reports: ReportBuilder,
    pool: rayon::ThreadPool,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        market: Arc<dyn MarketData>,
        symbols: Arc<dyn SymbolSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, MonitorError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_workers.max(1))
            .thread_name(|i| format!("signalwatch-fetch-{i}"))
            .build()?;
        let state = SharedState::new(MonitorState::new(config.volume_history_capacity));
        let stats = Arc::new(MonitorStats::new());
        let evaluator = Evaluator::new(
            &config,
            Arc::clone(&market),
            Arc::clone(&notifier),
            state.clone(),
            Arc::clone(&stats),
        );

        Ok(Self {
            fingerprint: config.fingerprint(),
            universe: Universe::new(symbols, config.max_symbols),
            reports: ReportBuilder::from_config(&config),
            market,
            notifier,
            state,
            stats,
            evaluator,
            pool,
            config,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    // ── Cycles ──────────────────────────────────────────────────────

    /// Evaluate every symbol on the fast timeframes.
    pub fn fast_cycle(&self, now: DateTime<Utc>) -> CycleSummary {
        let summary = self.scan_keys(&self.config.fast_timeframes, now);
        self.stats.record_fast_cycle(Utc::now());
        tracing::info!(
            keys = summary.keys,
            evaluated = summary.evaluated,
            seeded = summary.seeded,
            skipped = summary.skipped,
            fired = summary.fired,
            "fast cycle complete"
        );
        summary
    }

    /// Evaluate every symbol on the slow timeframes.
    pub fn slow_cycle(&self, now: DateTime<Utc>) -> CycleSummary {
        let summary = self.scan_keys(&self.config.slow_timeframes, now);
        self.stats.record_slow_cycle();
        tracing::info!(
            keys = summary.keys,
            evaluated = summary.evaluated,
            skipped = summary.skipped,
            fired = summary.fired,
            "slow cycle complete"
        );
        summary
    }

    fn scan_keys(&self, timeframes: &[Timeframe], now: DateTime<Utc>) -> CycleSummary {
        let symbols = self.universe.symbols();
        let keys: Vec<SymbolTimeframeKey> = symbols
            .iter()
            .flat_map(|s| timeframes.iter().map(move |&tf| SymbolTimeframeKey::new(s.as_str(), tf)))
            .collect();

        let results: Vec<_> = self.pool.install(|| {
            keys.par_iter()
                .map(|key| self.evaluator.evaluate(key, now))
                .collect()
        });

        let mut summary = CycleSummary {
            keys: keys.len(),
            ..CycleSummary::default()
        };
        for result in &results {
            summary.absorb(result);
        }
        summary
    }

    /// Score every symbol on `timeframe` and rank them with `builder`.
    /// Symbols whose fetch fails are left out.
    fn rank(&self, builder: &ReportBuilder, now: DateTime<Utc>) -> Report {
        let symbols = self.universe.symbols();
        let engine = self.config.score_engine();
        let entries: Vec<ReportEntry> = self.pool.install(|| {
            symbols
                .par_iter()
                .filter_map(|symbol| {
                    match self
                        .market
                        .fetch_candles(symbol, builder.timeframe, builder.candle_limit)
                    {
                        Ok(candles) => builder.score_symbol(&engine, symbol, &candles),
                        Err(e) => {
                            self.stats.record_fetch_failure();
                            tracing::debug!(symbol = %symbol, error = %e, "report fetch failed");
                            None
                        }
                    }
                })
                .collect()
        });
        builder.build(entries, now)
    }

    /// Build the ranked report and send it as one message.
    pub fn report_cycle(&self, now: DateTime<Utc>) -> Report {
        let report = self.rank(&self.reports, now);
        tracing::info!(
            scanned = report.scanned,
            qualified = report.entries.len(),
            min_score = report.min_score,
            "report built"
        );
        match self.notifier.notify(&format_report(&report)) {
            Ok(()) => self.stats.record_report(),
            Err(e) => {
                self.stats.record_notify_failure();
                tracing::warn!(notifier = self.notifier.name(), error = %e, "report dispatch failed");
            }
        }
        report
    }

    /// Every symbol scored on `timeframe`, best first, nothing filtered out.
    pub fn scan(&self, timeframe: Timeframe, now: DateTime<Utc>) -> Report {
        let builder = ReportBuilder {
            timeframe,
            min_score: 0,
            top_n: usize::MAX,
            ..self.reports.clone()
        };
        self.rank(&builder, now)
    }

    pub fn heartbeat(&self, now: DateTime<Utc>) {
        let info = HeartbeatInfo {
            symbols: self.universe.len(),
            timeframes: self
                .config
                .fast_timeframes
                .iter()
                .chain(&self.config.slow_timeframes)
                .copied()
                .collect(),
            last_cycle: self.stats.last_cycle(),
            last_refresh: self.universe.last_refresh(),
            alerts_sent: self.stats.alerts_fired(),
        };
        match self.notifier.notify(&format_heartbeat(&info, now)) {
            Ok(()) => {
                self.stats.record_heartbeat();
                tracing::info!(symbols = info.symbols, "heartbeat sent");
            }
            Err(e) => {
                self.stats.record_notify_failure();
                tracing::warn!(notifier = self.notifier.name(), error = %e, "heartbeat dispatch failed");
            }
        }
    }

    /// Reload the symbol universe. A failure keeps the previous list.
    pub fn refresh_universe(&self, now: DateTime<Utc>) -> bool {
        match self.universe.refresh(now) {
            Ok(count) => {
                tracing::info!(symbols = count, "symbol universe refreshed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, kept = self.universe.len(), "symbol universe refresh failed");
                false
            }
        }
    }

    // ── Persistence ─────────────────────────────────────────────────

    fn state_file(&self) -> Option<&PathBuf> {
        self.config.state_file.as_ref()
    }

    /// Restore the state file, if configured and readable. Returns whether a
    /// snapshot was applied.
    pub fn restore(&self) -> bool {
        let Some(path) = self.state_file() else {
            return false;
        };
        let Some(snapshot) = load_snapshot(path) else {
            tracing::info!(path = %path.display(), "no usable state file, starting fresh");
            return false;
        };
        if snapshot.config_fingerprint != self.fingerprint {
            tracing::warn!(
                saved = %snapshot.config_fingerprint,
                current = %self.fingerprint,
                "state file was written under a different configuration"
            );
        }
        self.state.with(|s| s.restore(&snapshot));
        tracing::info!(
            path = %path.display(),
            prices = snapshot.prices.len(),
            cooldowns = snapshot.cooldowns.len(),
            taken_at = %snapshot.taken_at,
            "state restored"
        );
        true
    }

    /// Write the state file, if configured. Failures are logged.
    pub fn snapshot(&self, now: DateTime<Utc>) -> bool {
        let Some(path) = self.state_file() else {
            return false;
        };
        let snapshot = self.state.lock().snapshot(&self.fingerprint, now);
        match save_snapshot(path, &snapshot) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), keys = snapshot.prices.len(), "state saved");
                true
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "state save failed");
                false
            }
        }
    }

    // ── Loops ───────────────────────────────────────────────────────

    /// Run until `shutdown` is set, or until the fast loop has completed
    /// `max_cycles` cycles (which then sets `shutdown` itself).
    ///
    /// The state file is restored before the first cycle and written once
    /// more after every loop has stopped.
    pub fn run(&self, shutdown: Arc<AtomicBool>, max_cycles: Option<u64>) -> Result<StatsSnapshot, MonitorError> {
        self.restore();
        self.refresh_universe(Utc::now());
        tracing::info!(
            symbols = self.universe.len(),
            fast = ?self.config.fast_timeframes,
            slow = ?self.config.slow_timeframes,
            notifier = self.notifier.name(),
            market = self.market.name(),
            "monitor starting"
        );

        let cfg = &self.config;
        let shutdown = shutdown.as_ref();
        let mut jobs: Vec<(&'static str, Box<dyn FnOnce() + Send + '_>)> = Vec::new();
        jobs.push((
            "signalwatch-fast",
            Box::new(move || self.fast_loop(shutdown, max_cycles)),
        ));
        if !cfg.slow_timeframes.is_empty() {
            jobs.push((
                "signalwatch-slow",
                Box::new(move || {
                    every(shutdown, secs(cfg.slow_interval_sec), true, || {
                        self.slow_cycle(Utc::now());
                    })
                }),
            ));
        }
        jobs.push((
            "signalwatch-report",
            Box::new(move || {
                every(shutdown, secs(cfg.report_interval_sec), false, || {
                    self.report_cycle(Utc::now());
                })
            }),
        ));
        if cfg.heartbeat_interval_sec > 0 {
            jobs.push((
                "signalwatch-heartbeat",
                Box::new(move || {
                    every(shutdown, secs(cfg.heartbeat_interval_sec), false, || {
                        self.heartbeat(Utc::now())
                    })
                }),
            ));
        }
        if cfg.symbols.is_empty() {
            jobs.push((
                "signalwatch-universe",
                Box::new(move || {
                    every(shutdown, secs(cfg.symbol_refresh_sec), false, || {
                        self.refresh_universe(Utc::now());
                    })
                }),
            ));
        }
        if cfg.state_file.is_some() {
            jobs.push((
                "signalwatch-snapshot",
                Box::new(move || {
                    every(shutdown, secs(cfg.snapshot_interval_sec), false, || {
                        self.snapshot(Utc::now());
                    })
                }),
            ));
        }

        let outcome = thread::scope(|s| {
            let mut handles = Vec::with_capacity(jobs.len());
            for (name, job) in jobs {
                let guarded = move || {
                    let _stop = StopOnPanic(shutdown);
                    job()
                };
                match thread::Builder::new().name(name.into()).spawn_scoped(s, guarded) {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        // Threads already running must stop before the scope can end.
                        shutdown.store(true, Ordering::SeqCst);
                        return Err(MonitorError::Spawn { name, source });
                    }
                }
            }
            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            if panicked {
                Err(MonitorError::ThreadPanicked)
            } else {
                Ok(())
            }
        });

        self.snapshot(Utc::now());
        let stats = self.stats();
        tracing::info!(
            fast_cycles = stats.fast_cycles,
            alerts_fired = stats.alerts_fired,
            notify_failures = stats.notify_failures,
            "monitor stopped"
        );
        outcome.map(|()| stats)
    }

    fn fast_loop(&self, shutdown: &AtomicBool, max_cycles: Option<u64>) {
        let delay = secs(self.config.loop_delay_sec);
        let mut done = 0u64;
        while !shutdown.load(Ordering::SeqCst) {
            self.fast_cycle(Utc::now());
            done += 1;
            if max_cycles.is_some_and(|max| done >= max) {
                tracing::info!(cycles = done, "cycle limit reached");
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            sleep_until_shutdown(shutdown, delay);
        }
    }
}

/// Stops every loop when the thread holding it unwinds.
struct StopOnPanic<'a>(&'a AtomicBool);

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!("monitor thread panicked, stopping all loops");
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Run `f` every `interval` until shutdown, optionally once up front.
fn every(shutdown: &AtomicBool, interval: Duration, immediately: bool, mut f: impl FnMut()) {
    if immediately && !shutdown.load(Ordering::SeqCst) {
        f();
    }
    while sleep_until_shutdown(shutdown, interval) {
        f();
    }
}

/// Sleep for `duration` in short slices. Returns `false` if shutdown was
/// requested before the time was up.
fn sleep_until_shutdown(shutdown: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
