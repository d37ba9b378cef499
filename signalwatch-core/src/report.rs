//! Periodic ranked report: score every symbol on one timeframe, keep the best.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::TIMESTAMP_FORMAT;
use crate::classifier::VolatilityTier;
use crate::config::MonitorConfig;
use crate::domain::{closes, volumes, Candle, Symbol, Timeframe};
use crate::score::{ScoreEngine, ScoreInput, ScoreResult, Trend};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub symbol: Symbol,
    pub score: u8,
    pub price: f64,
    /// Last close against the previous close.
    pub variation_pct: f64,
    pub reasons: Vec<String>,
    pub tier: VolatilityTier,
    /// Calm volatility with converging EMAs. Decorates the message only.
    pub compressing: bool,
    pub trend: Option<Trend>,
    pub rsi: Option<f64>,
    pub volume_ratio: f64,
}

impl ReportEntry {
    pub fn tier_label(&self) -> &'static str {
        self.tier.label()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub timeframe: Timeframe,
    pub generated_at: DateTime<Utc>,
    /// Symbols that produced a score, qualifying or not.
    pub scanned: usize,
    pub min_score: u8,
    pub entries: Vec<ReportEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportBuilder {
    pub top_n: usize,
    pub min_score: u8,
    pub compression_gap_pct: f64,
    pub timeframe: Timeframe,
    pub candle_limit: usize,
}

/// Percent change of the last close over the one before it; 0 with fewer
/// than two closes or a non-positive previous close.
pub fn last_change_pct(closes: &[f64]) -> f64 {
    match closes {
        [.., prev, last] if *prev > 0.0 => (last - prev) / prev * 100.0,
        _ => 0.0,
    }
}

impl ReportBuilder {
    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self {
            top_n: cfg.report_top_n,
            min_score: cfg.report_score_min,
            compression_gap_pct: cfg.compression_gap_pct,
            timeframe: cfg.report_timeframe,
            candle_limit: cfg.report_candle_limit,
        }
    }

    pub fn is_compressing(&self, score: &ScoreResult) -> bool {
        match score.ema_gap_pct {
            Some(gap) => score.profile.tier.is_calm() && gap.abs() < self.compression_gap_pct,
            None => false,
        }
    }

    /// Score one symbol's candles. `None` when there are no candles.
    pub fn score_symbol(
        &self,
        engine: &ScoreEngine,
        symbol: &str,
        candles: &[Candle],
    ) -> Option<ReportEntry> {
        let last = candles.last()?;
        let c = closes(candles);
        let v = volumes(candles);
        let variation_pct = last_change_pct(&c);

        let score = engine.score(ScoreInput {
            closes: &c,
            volumes: &v,
            variation_pct,
            timeframe: self.timeframe,
        });

        Some(ReportEntry {
            symbol: symbol.to_string(),
            score: score.normalized_score,
            price: last.close,
            variation_pct,
            compressing: self.is_compressing(&score),
            tier: score.profile.tier,
            trend: score.trend,
            rsi: score.components.rsi,
            volume_ratio: score.components.volume_ratio,
            reasons: score.reasons,
        })
    }

    /// Keep entries at or above the minimum, best first (ties by symbol),
    /// truncated to `top_n`.
    pub fn build(&self, candidates: Vec<ReportEntry>, now: DateTime<Utc>) -> Report {
        let scanned = candidates.len();
        let mut entries: Vec<ReportEntry> = candidates
            .into_iter()
            .filter(|e| e.score >= self.min_score)
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.symbol.cmp(&b.symbol)));
        entries.truncate(self.top_n);

        Report {
            timeframe: self.timeframe,
            generated_at: now,
            scanned,
            min_score: self.min_score,
            entries,
        }
    }
}

pub fn format_report(report: &Report) -> String {
    let stamp = report.generated_at.format(TIMESTAMP_FORMAT);
    if report.entries.is_empty() {
        return format!(
            "🏆 *Top report ({})*\nNo candidates scored {}+ across {} symbols.\n🕒 {stamp}",
            report.timeframe, report.min_score, report.scanned
        );
    }

    let mut text = format!(
        "🏆 *Top {} ({})* | {} symbols scanned\n",
        report.entries.len(),
        report.timeframe,
        report.scanned
    );
    for (i, e) in report.entries.iter().enumerate() {
        let trend = e.trend.map(Trend::label).unwrap_or("flat");
        let rsi = e
            .rsi
            .map(|r| format!("{r:.1}"))
            .unwrap_or_else(|| "n/a".to_string());
        text.push_str(&format!(
            "{}. *{}* | Score {}/100 | {:+.2}% | {:.6} | {} | RSI {} | Vol×{:.1} | {}\n",
            i + 1,
            e.symbol,
            e.score,
            e.variation_pct,
            e.price,
            trend,
            rsi,
            e.volume_ratio,
            e.tier_label()
        ));
        if e.compressing {
            text.push_str("   🌀 compressing, watch for a breakout\n");
        }
        if !e.reasons.is_empty() {
            text.push_str(&format!("   ▪ {}\n", e.reasons.join("; ")));
        }
    }
    text.push_str(&format!("🕒 {stamp}"));
    text
}

// ─── Tests ───────────────────────────────────────────────────────────
