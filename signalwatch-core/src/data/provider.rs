//! Market-data traits and structured error types.
//!
//! [`MarketData`] and [`SymbolSource`] abstract over the exchange so the
//! monitor can run against Bybit in production and an in-memory double in
//! tests.

use thiserror::Error;

use crate::domain::{Candle, Timeframe};

/// Structured error types for market-data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("provider rejected request (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: provider has blocked requests (circuit breaker open)")]
    CircuitBreakerTripped,

    #[error("no candles returned for {symbol}@{timeframe}")]
    Empty { symbol: String, timeframe: Timeframe },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. }
        )
    }
}

/// Source of OHLCV candles.
pub trait MarketData: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Up to `limit` most recent candles, oldest first.
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError>;
}

/// Source of the tradable symbol universe.
pub trait SymbolSource: Send + Sync {
    fn list_symbols(&self) -> Result<Vec<String>, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(DataError::NetworkUnreachable("x".into()).is_retryable());
        assert!(DataError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(!DataError::CircuitBreakerTripped.is_retryable());
        assert!(!DataError::SymbolNotFound { symbol: "X".into() }.is_retryable());
    }

    #[test]
    fn empty_error_names_the_key() {
        let e = DataError::Empty {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M3,
        };
        assert_eq!(e.to_string(), "no candles returned for BTCUSDT@3m");
    }
}
