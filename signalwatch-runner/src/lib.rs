//! signalwatch runner: drives the core engine against live collaborators.
//!
//! - Per-key evaluation (fetch, observe, score, decide, dispatch)
//! - The monitor's fast/slow/report/heartbeat/universe/snapshot loops
//! - Lock-free counters
//! - Atomic JSON snapshot persistence
//! - Ctrl-C / SIGTERM to graceful shutdown

pub mod evaluator;
pub mod monitor;
pub mod persistence;
pub mod signals;
pub mod stats;

pub use evaluator::{EvalError, Evaluation, Evaluator};
pub use monitor::{CycleSummary, Monitor, MonitorError};
pub use persistence::{load_snapshot, save_snapshot};
pub use signals::stop_on_signal;
pub use stats::{MonitorStats, StatsSnapshot};
