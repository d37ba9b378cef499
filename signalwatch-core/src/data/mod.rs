//! Market data: collaborator traits, the Bybit adapter and the symbol universe.

pub mod bybit;
pub mod circuit_breaker;
pub mod provider;
pub mod universe;

pub use bybit::{interval_param, parse_klines, parse_tickers, BybitProvider};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use provider::{DataError, MarketData, SymbolSource};
pub use universe::{StaticSymbols, Universe};
