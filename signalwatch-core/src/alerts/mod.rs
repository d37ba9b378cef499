//! Alert decisions and message composition.
//!
//! [`AlertDecider`] is the cooldown state machine: one (symbol, alert type)
//! pair is either cooling or cooled down, and only a cooled-down pair with a
//! true condition fires. [`message`] renders fired alerts, heartbeats and
//! test pings as chat text.

pub mod decider;
pub mod message;

pub use decider::{Alert, AlertDecider, AlertEvent, Decision, Trigger};
pub use message::{format_alert, format_heartbeat, format_test_message, HeartbeatInfo, TIMESTAMP_FORMAT};
