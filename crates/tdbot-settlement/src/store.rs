//! Ledger storage boundary.
//!
//! A store loads a scope's ledger and commits the result of a settlement
//! pass. Commits are all-or-nothing and the store itself rejects a match
//! pair it already holds, independent of any check the caller made.
//!
//! A pass holds the store's lease on the scope from load through commit.
//! The lease spans every handle on the same storage, so two processes
//! sharing a data directory cannot both settle one scope.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tdbot_core::{Fill, LedgerScope, Match, OrderNo};

use crate::error::{SettlementError, SettlementResult};
use crate::ledger::Ledger;

/// Persistent home of per-scope ledgers.
pub trait LedgerStore: Send + Sync {
    /// Exclusive hold on one scope, released on drop.
    type Lease;

    /// Take `scope` or fail immediately with
    /// [`SettlementError::LedgerContention`] if any handle holds it.
    fn acquire(&self, scope: &LedgerScope) -> SettlementResult<Self::Lease>;

    /// Load the scope's ledger. A scope never written loads empty; a scope
    /// that cannot be read is an error, never an empty ledger.
    fn load(&self, scope: &LedgerScope) -> SettlementResult<Ledger>;

    /// Replace the scope's fills with `ledger.fills()` and append
    /// `new_matches`.
    ///
    /// Fails with [`SettlementError::DuplicateMatch`] without writing
    /// anything if any pair in `new_matches` is already stored or repeats
    /// within the batch.
    fn commit(&self, ledger: &Ledger, new_matches: &[Match]) -> SettlementResult<()>;
}

/// Reject pairs already in `stored` or repeated within `new_matches`.
pub fn check_unique_pairs(
    scope: &LedgerScope,
    stored: &HashSet<(OrderNo, OrderNo)>,
    new_matches: &[Match],
) -> SettlementResult<()> {
    let mut batch = HashSet::with_capacity(new_matches.len());
    for m in new_matches {
        let pair = m.pair();
        if stored.contains(&pair) || !batch.insert(pair) {
            return Err(SettlementError::DuplicateMatch {
                scope: scope.to_string(),
                sell: m.sell_order_no.to_string(),
                buy: m.buy_order_no.to_string(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct StoredScope {
    fills: Vec<Fill>,
    matches: Vec<Match>,
    pairs: HashSet<(OrderNo, OrderNo)>,
}

/// In-process store keyed by scope.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    scopes: RwLock<HashMap<LedgerScope, StoredScope>>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of matches stored for `scope`.
    pub fn match_count(&self, scope: &LedgerScope) -> usize {
        self.scopes
            .read()
            .get(scope)
            .map(|s| s.matches.len())
            .unwrap_or(0)
    }
}

impl LedgerStore for MemoryLedgerStore {
    /// One process owns the map; the engine's [`ScopeLocks`](crate::ScopeLocks)
    /// already cover it.
    type Lease = ();

    fn acquire(&self, _scope: &LedgerScope) -> SettlementResult<()> {
        Ok(())
    }

    fn load(&self, scope: &LedgerScope) -> SettlementResult<Ledger> {
        match self.scopes.read().get(scope) {
            Some(stored) => Ledger::from_parts(
                scope.clone(),
                stored.fills.clone(),
                stored.matches.clone(),
            ),
            None => Ok(Ledger::new(scope.clone())),
        }
    }

    fn commit(&self, ledger: &Ledger, new_matches: &[Match]) -> SettlementResult<()> {
        let mut scopes = self.scopes.write();
        let stored = scopes.entry(ledger.scope().clone()).or_default();
        check_unique_pairs(ledger.scope(), &stored.pairs, new_matches)?;

        stored.fills = ledger.fills().to_vec();
        stored.pairs.extend(new_matches.iter().map(Match::pair));
        stored.matches.extend_from_slice(new_matches);
        Ok(())
    }
}
