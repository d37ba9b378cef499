//! Chat text for alerts, heartbeats and test pings.
//!
//! Plain text with Telegram-flavoured Markdown (`*bold*`). Symbols and
//! reasons are inserted verbatim; none of them contain Markdown control
//! characters in practice.

use chrono::{DateTime, Utc};

use crate::domain::{AlertType, Timeframe};

use super::decider::Alert;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

fn stamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn headline(t: AlertType) -> &'static str {
    match t {
        AlertType::PriceMoveFast => "Fast price move",
        AlertType::PriceMoveSlow => "Slow price move",
        AlertType::VolumeSpike => "Volume spike",
        AlertType::RsiOverbought => "RSI overbought",
        AlertType::RsiOversold => "RSI oversold",
        AlertType::BreakoutUp => "Breakout up",
        AlertType::BreakoutDown => "Breakdown",
        AlertType::EmaTrendUp => "EMA trend up",
        AlertType::EmaTrendDown => "EMA trend down",
        AlertType::WyckoffCompression => "Compression",
    }
}

pub fn format_alert(alert: &Alert) -> String {
    let icon = if alert.variation_pct >= 0.0 { "🟢" } else { "🔴" };
    let (t_lo, t_hi) = alert.tier.target_range_pct();
    let (s_lo, s_hi) = alert.tier.stop_range_pct();

    let mut text = format!(
        "🔔 {icon} *{}* | *{}* ({})\n",
        headline(alert.alert_type),
        alert.symbol,
        alert.timeframe
    );
    text.push_str(&format!(
        "Move: {:+.2}% | Price: {:.6}\n",
        alert.variation_pct, alert.price
    ));
    text.push_str(&format!(
        "Score: *{}/100* | Volatility: {}\n",
        alert.score, alert.tier
    ));
    text.push_str(&format!(
        "Target {t_lo}-{t_hi}% | Stop {s_lo}-{s_hi}%\n"
    ));
    if !alert.reasons.is_empty() {
        text.push_str("▪ ");
        text.push_str(&alert.reasons.join("; "));
        text.push('\n');
    }
    text.push_str(&stamp(alert.fired_at));
    text
}

/// Liveness summary sent on the heartbeat cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatInfo {
    pub symbols: usize,
    pub timeframes: Vec<Timeframe>,
    pub last_cycle: Option<DateTime<Utc>>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub alerts_sent: u64,
}

pub fn format_heartbeat(info: &HeartbeatInfo, now: DateTime<Utc>) -> String {
    let tfs: Vec<&str> = info.timeframes.iter().map(|t| t.as_str()).collect();
    let never = || "never".to_string();
    format!(
        "💓 *Heartbeat* | monitor running\n\
         Symbols: {}\n\
         Timeframes: {}\n\
         Last cycle: {}\n\
         Last universe refresh: {}\n\
         Alerts sent: {}\n\
         {}",
        info.symbols,
        tfs.join(", "),
        info.last_cycle.map(stamp).unwrap_or_else(never),
        info.last_refresh.map(stamp).unwrap_or_else(never),
        info.alerts_sent,
        stamp(now)
    )
}

pub fn format_test_message(now: DateTime<Utc>) -> String {
    format!("🧪 *Test alert* | notifier online\n{}", stamp(now))
}
