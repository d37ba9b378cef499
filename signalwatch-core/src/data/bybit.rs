//! Bybit v5 market-data adapter (linear USDT perpetuals).
//!
//! Candles come from `/v5/market/kline`, the symbol universe from
//! `/v5/market/tickers`. Both are public endpoints. Requests retry with
//! exponential backoff plus random jitter and sit behind a shared
//! [`CircuitBreaker`].

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, MarketData, SymbolSource};
use crate::domain::{Candle, Timeframe};

/// `retCode` Bybit uses for "too many visits".
const RATE_LIMIT_CODE: i64 = 10006;
/// Largest page `/v5/market/kline` serves.
const MAX_KLINE_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    #[serde(default)]
    list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
}

/// Interval label used by the kline endpoint.
pub fn interval_param(tf: Timeframe) -> &'static str {
    match tf {
        Timeframe::M1 => "1",
        Timeframe::M3 => "3",
        Timeframe::M5 => "5",
        Timeframe::M15 => "15",
        Timeframe::M30 => "30",
        Timeframe::H1 => "60",
        Timeframe::H2 => "120",
        Timeframe::H4 => "240",
        Timeframe::H6 => "360",
        Timeframe::H12 => "720",
        Timeframe::D1 => "D",
        Timeframe::W1 => "W",
    }
}

fn unwrap_envelope<T>(symbol: &str, env: Envelope<T>) -> Result<T, DataError> {
    match env.ret_code {
        0 => env
            .result
            .ok_or_else(|| DataError::ResponseFormatChanged("missing result".into())),
        RATE_LIMIT_CODE => Err(DataError::RateLimited { retry_after_secs: 1 }),
        10001 if env.ret_msg.to_lowercase().contains("symbol") => Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        }),
        code => Err(DataError::Api {
            code,
            message: env.ret_msg,
        }),
    }
}

fn field(row: &[String], idx: usize, name: &str) -> Result<f64, DataError> {
    row.get(idx)
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("kline row missing {name}")))?
        .parse::<f64>()
        .map_err(|e| DataError::ResponseFormatChanged(format!("bad kline {name}: {e}")))
}

/// Parse a kline body into candles, oldest first.
///
/// Bybit lists rows newest first as
/// `[startTimeMs, open, high, low, close, volume, turnover]`.
pub fn parse_klines(symbol: &str, timeframe: Timeframe, body: &str) -> Result<Vec<Candle>, DataError> {
    let env: Envelope<KlineResult> = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("kline body for {symbol}: {e}")))?;
    let result = unwrap_envelope(symbol, env)?;

    let mut candles = Vec::with_capacity(result.list.len());
    for row in result.list.iter().rev() {
        let start_ms = row
            .first()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| DataError::ResponseFormatChanged("bad kline start time".into()))?;
        let open_time = DateTime::from_timestamp_millis(start_ms).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("invalid timestamp: {start_ms}"))
        })?;
        candles.push(Candle {
            open_time,
            open: field(row, 1, "open")?,
            high: field(row, 2, "high")?,
            low: field(row, 3, "low")?,
            close: field(row, 4, "close")?,
            volume: field(row, 5, "volume")?,
        });
    }

    if candles.is_empty() {
        return Err(DataError::Empty {
            symbol: symbol.to_string(),
            timeframe,
        });
    }
    Ok(candles)
}

/// USDT-quoted symbols from a tickers body, sorted and deduplicated.
pub fn parse_tickers(body: &str) -> Result<Vec<String>, DataError> {
    let env: Envelope<TickerResult> = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("tickers body: {e}")))?;
    let result = unwrap_envelope("*", env)?;
    let mut symbols: Vec<String> = result
        .list
        .into_iter()
        .map(|t| t.symbol)
        .filter(|s| s.ends_with("USDT"))
        .collect();
    symbols.sort();
    symbols.dedup();
    Ok(symbols)
}

pub struct BybitProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl BybitProvider {
    pub fn new(base_url: &str, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("signalwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay * 2u32.pow(attempt.saturating_sub(1));
        let jitter_ms = rand::thread_rng().gen_range(0..=self.base_delay.as_millis() as u64 / 2);
        base + Duration::from_millis(jitter_ms)
    }

    /// Retry policy: `max_retries` extra attempts, backoff doubling from
    /// `base_delay`.
    pub fn with_retry_policy(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// GET `path` and decode the body with `parse`, retrying transient
    /// failures.
    ///
    /// The breaker sees one failure per fetch that exhausted its retries,
    /// not one per attempt.
    fn get_with_retry<T>(
        &self,
        symbol: &str,
        path: &str,
        query: &[(&str, String)],
        parse: impl Fn(&str) -> Result<T, DataError>,
    ) -> Result<T, DataError> {
        let url = format!("{}{path}", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.backoff(attempt));
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.attempt(symbol, &url, query, &parse) {
                Ok(v) => {
                    self.circuit_breaker.record_success();
                    return Ok(v);
                }
                Err(Attempt::Retry(e)) => {
                    tracing::debug!(symbol, attempt, error = %e, "request failed, will retry");
                    last_error = Some(e);
                }
                Err(Attempt::Fatal(e)) => return Err(e),
            }
        }

        self.circuit_breaker.record_failure();
        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn attempt<T>(
        &self,
        symbol: &str,
        url: &str,
        query: &[(&str, String)],
        parse: &impl Fn(&str) -> Result<T, DataError>,
    ) -> Result<T, Attempt> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| Attempt::Retry(DataError::NetworkUnreachable(e.to_string())))?;

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(Attempt::Fatal(DataError::CircuitBreakerTripped));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(Attempt::Retry(DataError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }
        if !status.is_success() {
            return Err(Attempt::Retry(DataError::Other(format!(
                "HTTP {status} for {symbol}"
            ))));
        }

        let body = resp
            .text()
            .map_err(|e| Attempt::Retry(DataError::NetworkUnreachable(e.to_string())))?;
        parse(&body).map_err(|e| match e {
            e @ DataError::RateLimited { .. } => Attempt::Retry(e),
            other => Attempt::Fatal(other),
        })
    }
}

/// Outcome of a single failed request.
enum Attempt {
    Retry(DataError),
    Fatal(DataError),
}

impl MarketData for BybitProvider {
    fn name(&self) -> &str {
        "bybit"
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let query = [
            ("category", "linear".to_string()),
            ("symbol", symbol.to_string()),
            ("interval", interval_param(timeframe).to_string()),
            ("limit", limit.clamp(1, MAX_KLINE_LIMIT).to_string()),
        ];
        self.get_with_retry(symbol, "/v5/market/kline", &query, |body| {
            parse_klines(symbol, timeframe, body)
        })
    }
}

impl SymbolSource for BybitProvider {
    fn list_symbols(&self) -> Result<Vec<String>, DataError> {
        let query = [("category", "linear".to_string())];
        self.get_with_retry("*", "/v5/market/tickers", &query, parse_tickers)
    }
}
