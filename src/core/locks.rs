// src/core/locks.rs
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Advisory per-symbol locks. Two webhook deliveries for the same symbol
/// must not interleave their read-decide-act sequences, or both can pass
/// the "not already positioned" check and double-buy. Different symbols
/// stay independent.
#[derive(Default)]
pub struct SymbolLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for one symbol, created on first use and kept for the
    /// process lifetime (the symbol universe is small).
    pub fn for_symbol(&self, symbol: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_symbol_serializes() {
        let locks = SymbolLocks::new();
        let lock = locks.for_symbol("MATICUSDT");
        let guard = lock.lock().await;
        assert!(locks.for_symbol("MATICUSDT").try_lock().is_err());
        drop(guard);
        assert!(locks.for_symbol("MATICUSDT").try_lock().is_ok());
    }

    #[tokio::test]
    async fn different_symbols_do_not_contend() {
        let locks = SymbolLocks::new();
        let matic = locks.for_symbol("MATICUSDT");
        let _guard = matic.lock().await;
        assert!(locks.for_symbol("BTCUSDT").try_lock().is_ok());
    }
}
