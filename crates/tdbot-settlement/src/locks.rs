//! Per-scope settlement exclusivity.
//!
//! At most one settlement pass per [`LedgerScope`]. Acquisition never
//! waits: a held scope reports [`SettlementError::LedgerContention`] and the
//! caller decides when to retry. Release happens when the guard drops, on
//! every exit path.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tdbot_core::LedgerScope;
use tracing::trace;

use crate::error::{SettlementError, SettlementResult};

/// Registry of scopes with a pass in flight.
#[derive(Debug, Default)]
pub struct ScopeLocks {
    /// scope -> acquisition time.
    held: DashMap<LedgerScope, DateTime<Utc>>,
}

impl ScopeLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `scope` or fail immediately if it is held.
    pub fn try_acquire(&self, scope: &LedgerScope) -> SettlementResult<ScopeGuard<'_>> {
        match self.held.entry(scope.clone()) {
            Entry::Occupied(_) => Err(SettlementError::LedgerContention {
                scope: scope.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                trace!(scope = %scope, "Scope acquired");
                Ok(ScopeGuard {
                    locks: self,
                    scope: scope.clone(),
                })
            }
        }
    }

    pub fn is_held(&self, scope: &LedgerScope) -> bool {
        self.held.contains_key(scope)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

/// Releases its scope on drop.
#[derive(Debug)]
#[must_use = "the scope is released as soon as the guard is dropped"]
pub struct ScopeGuard<'a> {
    locks: &'a ScopeLocks,
    scope: LedgerScope,
}

impl ScopeGuard<'_> {
    pub fn scope(&self) -> &LedgerScope {
        &self.scope
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.remove(&self.scope);
        trace!(scope = %self.scope, "Scope released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fixtures::scope;
    use std::sync::Arc;
    use tdbot_core::{Instrument, Timeframe, TimeframeFamily};

    #[test]
    fn test_second_acquire_is_contention() {
        let locks = ScopeLocks::new();
        let _guard = locks.try_acquire(&scope()).unwrap();
        let err = locks.try_acquire(&scope()).unwrap_err();
        assert!(matches!(err, SettlementError::LedgerContention { .. }));
    }

    #[test]
    fn test_guard_drop_releases() {
        let locks = ScopeLocks::new();
        {
            let guard = locks.try_acquire(&scope()).unwrap();
            assert_eq!(guard.scope(), &scope());
            assert!(locks.is_held(&scope()));
        }
        assert!(!locks.is_held(&scope()));
        assert!(locks.try_acquire(&scope()).is_ok());
    }

    #[test]
    fn test_release_on_error_path() {
        fn failing(locks: &ScopeLocks) -> SettlementResult<()> {
            let _guard = locks.try_acquire(&scope())?;
            Err(SettlementError::Storage {
                scope: scope().to_string(),
                message: "disk full".to_string(),
            })
        }
        let locks = ScopeLocks::new();
        assert!(failing(&locks).is_err());
        assert_eq!(locks.held_count(), 0);
    }

    #[test]
    fn test_distinct_scopes_independent() {
        let locks = ScopeLocks::new();
        let other = LedgerScope::new(Instrument::new("BTCUSDT"), TimeframeFamily::new(Timeframe::H4));
        let _a = locks.try_acquire(&scope()).unwrap();
        let _b = locks.try_acquire(&other).unwrap();
        assert_eq!(locks.held_count(), 2);
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let locks = Arc::new(ScopeLocks::new());
        let tried = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let tried = Arc::clone(&tried);
                std::thread::spawn(move || {
                    let attempt = locks.try_acquire(&scope());
                    // the winner keeps its guard until every thread has tried
                    tried.wait();
                    attempt.is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(locks.held_count(), 0);
    }
}
