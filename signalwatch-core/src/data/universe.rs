//! Symbol universe: the set of symbols the monitor scans.
//!
//! Either a fixed list ([`StaticSymbols`]) or whatever the exchange lists,
//! capped at `max_symbols`. A failed refresh keeps the previous list.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::provider::{DataError, SymbolSource};

/// A configured, never-changing symbol list.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols {
    symbols: Vec<String>,
}

impl StaticSymbols {
    pub fn new(symbols: Vec<String>) -> Self {
        Self { symbols }
    }
}

impl SymbolSource for StaticSymbols {
    fn list_symbols(&self) -> Result<Vec<String>, DataError> {
        Ok(self.symbols.clone())
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    symbols: Arc<Vec<String>>,
    refreshed_at: Option<DateTime<Utc>>,
}

pub struct Universe {
    source: Arc<dyn SymbolSource>,
    max_symbols: usize,
    current: RwLock<Snapshot>,
}

impl Universe {
    pub fn new(source: Arc<dyn SymbolSource>, max_symbols: usize) -> Self {
        Self {
            source,
            max_symbols,
            current: RwLock::new(Snapshot::default()),
        }
    }

    /// Reload from the source. Symbols are upper-cased, sorted, deduplicated
    /// and truncated to the cap. Returns the new count.
    pub fn refresh(&self, now: DateTime<Utc>) -> Result<usize, DataError> {
        let mut symbols: Vec<String> = self
            .source
            .list_symbols()?
            .into_iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        symbols.sort();
        symbols.dedup();
        if symbols.len() > self.max_symbols {
            tracing::debug!(
                listed = symbols.len(),
                cap = self.max_symbols,
                "symbol universe truncated"
            );
            symbols.truncate(self.max_symbols);
        }

        let count = symbols.len();
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        current.symbols = Arc::new(symbols);
        current.refreshed_at = Some(now);
        Ok(count)
    }

    /// Current list. Cheap to clone; later refreshes do not affect it.
    pub fn symbols(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()).symbols)
    }

    pub fn len(&self) -> usize {
        self.symbols().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).refreshed_at
    }
}
