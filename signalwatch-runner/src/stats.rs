//! Lock-free counters shared by the monitor loops.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

const NEVER: i64 = i64::MIN;

#[derive(Debug)]
pub struct MonitorStats {
    fast_cycles: AtomicU64,
    slow_cycles: AtomicU64,
    evaluations: AtomicU64,
    fetch_failures: AtomicU64,
    alerts_fired: AtomicU64,
    alerts_suppressed: AtomicU64,
    notify_failures: AtomicU64,
    reports_sent: AtomicU64,
    heartbeats_sent: AtomicU64,
    /// Unix millis of the last completed fast cycle, `NEVER` before the first.
    last_cycle_ms: AtomicI64,
}

/// Point-in-time copy of [`MonitorStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub fast_cycles: u64,
    pub slow_cycles: u64,
    pub evaluations: u64,
    pub fetch_failures: u64,
    pub alerts_fired: u64,
    pub alerts_suppressed: u64,
    pub notify_failures: u64,
    pub reports_sent: u64,
    pub heartbeats_sent: u64,
    pub last_cycle: Option<DateTime<Utc>>,
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self {
            fast_cycles: AtomicU64::new(0),
            slow_cycles: AtomicU64::new(0),
            evaluations: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            alerts_fired: AtomicU64::new(0),
            alerts_suppressed: AtomicU64::new(0),
            notify_failures: AtomicU64::new(0),
            reports_sent: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
            last_cycle_ms: AtomicI64::new(NEVER),
        }
    }
}

impl MonitorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fast_cycle(&self, finished_at: DateTime<Utc>) {
        self.fast_cycles.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_ms
            .store(finished_at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_slow_cycle(&self) {
        self.slow_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evaluation(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fired(&self, n: usize) {
        self.alerts_fired.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self, n: usize) {
        self.alerts_suppressed.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_notify_failure(&self) {
        self.notify_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_report(&self) {
        self.reports_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fast_cycles(&self) -> u64 {
        self.fast_cycles.load(Ordering::Relaxed)
    }

    pub fn alerts_fired(&self) -> u64 {
        self.alerts_fired.load(Ordering::Relaxed)
    }

    pub fn last_cycle(&self) -> Option<DateTime<Utc>> {
        match self.last_cycle_ms.load(Ordering::Relaxed) {
            NEVER => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fast_cycles: self.fast_cycles(),
            slow_cycles: self.slow_cycles.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            alerts_fired: self.alerts_fired(),
            alerts_suppressed: self.alerts_suppressed.load(Ordering::Relaxed),
            notify_failures: self.notify_failures.load(Ordering::Relaxed),
            reports_sent: self.reports_sent.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            last_cycle: self.last_cycle(),
        }
    }
}
