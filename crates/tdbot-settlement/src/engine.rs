//! Settlement engine: exclusivity, storage and the matcher wired together.
//!
//! Every pass over a scope runs as `acquire -> load -> match -> commit`
//! while holding that scope's guard and the store's lease on it. A failure
//! at any step releases both and leaves the stored ledger untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tdbot_core::{Fill, LedgerScope, Price, Size};
use tracing::{debug, info, warn};

use crate::config::SettlementConfig;
use crate::error::{SettlementError, SettlementResult};
use crate::ledger::Ledger;
use crate::locks::{ScopeGuard, ScopeLocks};
use crate::matcher::{self, SettlementReport};
use crate::proxy::{self, ProxyOutcome, ProxyRun};
use crate::store::LedgerStore;

/// Settles fills into per-scope ledgers held by a [`LedgerStore`].
pub struct SettlementEngine<S> {
    store: Arc<S>,
    locks: ScopeLocks,
    config: SettlementConfig,
}

impl<S: LedgerStore> SettlementEngine<S> {
    pub fn new(store: Arc<S>, config: SettlementConfig) -> Self {
        Self {
            store,
            locks: ScopeLocks::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn locks(&self) -> &ScopeLocks {
        &self.locks
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Current ledger of `scope`, read without taking the scope.
    pub fn ledger(&self, scope: &LedgerScope) -> SettlementResult<Ledger> {
        self.store.load(scope)
    }

    /// Claim `scope` in this engine, then in the store.
    fn take(&self, scope: &LedgerScope) -> SettlementResult<(ScopeGuard<'_>, S::Lease)> {
        let guard = self.locks.try_acquire(scope)?;
        let lease = self.store.acquire(scope)?;
        Ok((guard, lease))
    }

    /// Settle `new_fills` into `scope`.
    ///
    /// Fails with [`SettlementError::LedgerContention`] if a pass on the
    /// scope is already running here or through another store handle.
    pub fn settle(
        &self,
        scope: &LedgerScope,
        new_fills: Vec<Fill>,
    ) -> SettlementResult<SettlementReport> {
        let _held = self.take(scope)?;
        self.settle_locked(scope, new_fills)
    }

    /// Add fills to `scope` without matching them.
    ///
    /// Used when fills are observed by a process that does not settle; the
    /// next native or proxy pass matches them. Returns how many were new.
    pub fn record(&self, scope: &LedgerScope, fills: Vec<Fill>) -> SettlementResult<usize> {
        let _held = self.take(scope)?;
        let mut ledger = self.store.load(scope)?;

        let mut recorded = 0;
        for fill in fills {
            ledger.check_fill(&fill)?;
            if ledger.contains_order(&fill.order_no) {
                debug!(scope = %scope, order_no = %fill.order_no, "Skipping known fill");
                continue;
            }
            ledger.push_fill(fill);
            recorded += 1;
        }

        if recorded > 0 {
            self.store.commit(&ledger, &[])?;
        }
        debug!(scope = %scope, recorded, "Recorded fills");
        Ok(recorded)
    }

    /// Settle pending SELL inventory of coarser `targets` on behalf of
    /// `driver`.
    ///
    /// Each target is its own transaction: a contended or out-of-window
    /// target is skipped and the rest proceed. Storage and validation
    /// failures abort the run; targets settled before the failure stay
    /// committed.
    pub fn settle_proxies(
        &self,
        driver: &LedgerScope,
        targets: &[LedgerScope],
        now: DateTime<Utc>,
    ) -> SettlementResult<Vec<ProxyRun>> {
        let mut runs = Vec::with_capacity(targets.len());

        for target in targets {
            let outcome = match proxy::precheck(
                &self.config.proxy,
                driver.timeframe(),
                target.timeframe(),
                now,
            ) {
                Some(skip) => skip,
                None => match self.take(target) {
                    Ok(_held) => ProxyOutcome::Settled {
                        report: self.settle_locked(target, Vec::new())?,
                    },
                    Err(SettlementError::LedgerContention { .. }) => {
                        ProxyOutcome::SkippedContended
                    }
                    Err(e) => return Err(e),
                },
            };

            debug!(
                driver = %driver,
                target = %target,
                outcome = outcome.label(),
                "Proxy settlement"
            );
            runs.push(ProxyRun {
                target: target.clone(),
                outcome,
            });
        }

        Ok(runs)
    }

    /// Profit-lock query against the stored ledger.
    pub fn lockable_quantity(
        &self,
        scope: &LedgerScope,
        candidate: Price,
        min_profit_pct: Decimal,
    ) -> SettlementResult<Size> {
        Ok(self
            .store
            .load(scope)?
            .lockable_quantity(candidate, min_profit_pct))
    }

    /// Load, match and commit. Caller holds the scope.
    fn settle_locked(
        &self,
        scope: &LedgerScope,
        new_fills: Vec<Fill>,
    ) -> SettlementResult<SettlementReport> {
        let ledger = self.store.load(scope)?;
        let (ledger, report) = matcher::settle(ledger, new_fills)?;

        if report.is_noop() {
            debug!(scope = %scope, skipped = report.skipped_duplicates.len(), "Nothing to settle");
            return Ok(report);
        }

        self.store.commit(&ledger, &report.matches)?;

        if !report.forced.is_empty() {
            warn!(
                scope = %scope,
                forced = %report.forced_quantity(),
                "Sell quantity exceeded held inventory"
            );
        }
        info!(
            scope = %scope,
            recorded = report.recorded,
            matches = report.matches.len(),
            matched = %report.matched_quantity(),
            profit = %report.realized_profit(),
            held = %ledger.held_quantity(),
            "Settlement pass committed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use crate::ledger::fixtures::*;
    use crate::store::MemoryLedgerStore;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tdbot_core::{Instrument, Match, OrderNo, Timeframe, TimeframeFamily};

    fn engine() -> SettlementEngine<MemoryLedgerStore> {
        SettlementEngine::new(Arc::new(MemoryLedgerStore::new()), SettlementConfig::default())
    }

    fn driver() -> LedgerScope {
        LedgerScope::new(Instrument::new("BTCUSDT"), TimeframeFamily::new(Timeframe::M15))
    }

    fn half_past() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_settle_persists_matches_and_ledger() {
        let engine = engine();
        let report = engine
            .settle(
                &scope(),
                vec![
                    buy("A", dec!(10), dec!(5), 0),
                    buy("B", dec!(12), dec!(5), 1),
                    sell("C", dec!(14), dec!(8), 2),
                ],
            )
            .unwrap();
        assert_eq!(report.realized_profit(), dec!(26));

        let ledger = engine.ledger(&scope()).unwrap();
        assert_eq!(ledger.matches().len(), 2);
        assert_eq!(ledger.held_quantity(), Size::new(dec!(2)));
        assert!(!engine.locks().is_held(&scope()));
    }

    #[test]
    fn test_replay_across_passes_yields_one_match() {
        let engine = engine();
        let fills = vec![buy("A", dec!(10), dec!(5), 0), sell("C", dec!(14), dec!(5), 1)];
        engine.settle(&scope(), fills.clone()).unwrap();
        let replay = engine.settle(&scope(), fills).unwrap();

        assert!(replay.is_noop());
        assert_eq!(engine.store().match_count(&scope()), 1);
    }

    #[test]
    fn test_held_scope_reports_contention() {
        let engine = engine();
        let _guard = engine.locks().try_acquire(&scope()).unwrap();
        let err = engine
            .settle(&scope(), vec![buy("A", dec!(10), dec!(5), 0)])
            .unwrap_err();
        assert!(matches!(err, SettlementError::LedgerContention { .. }));
        assert!(engine.ledger(&scope()).unwrap().fills().is_empty());
    }

    #[test]
    fn test_record_defers_matching() {
        let engine = engine();
        let recorded = engine
            .record(
                &scope(),
                vec![buy("A", dec!(10), dec!(5), 0), sell("C", dec!(12), dec!(2), 1)],
            )
            .unwrap();
        assert_eq!(recorded, 2);
        let ledger = engine.ledger(&scope()).unwrap();
        assert_eq!(ledger.pending_sells().len(), 1);
        assert!(ledger.matches().is_empty());

        let again = engine
            .record(&scope(), vec![buy("A", dec!(10), dec!(5), 0)])
            .unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn test_proxy_settles_pending_sells_of_coarser_scope() {
        let engine = engine();
        engine
            .record(
                &scope(),
                vec![buy("A", dec!(10), dec!(5), 0), sell("C", dec!(12), dec!(2), 1)],
            )
            .unwrap();

        let runs = engine
            .settle_proxies(&driver(), &[scope()], half_past())
            .unwrap();
        assert_eq!(runs.len(), 1);
        match &runs[0].outcome {
            ProxyOutcome::Settled { report } => {
                assert_eq!(report.matches.len(), 1);
                assert_eq!(report.realized_profit(), dec!(4));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(engine.ledger(&scope()).unwrap().pending_sells().is_empty());
    }

    #[test]
    fn test_proxy_skips_near_trigger() {
        let engine = engine();
        engine
            .record(&scope(), vec![buy("A", dec!(10), dec!(5), 0), sell("C", dec!(12), dec!(2), 1)])
            .unwrap();

        let near = Utc.with_ymd_and_hms(2024, 3, 4, 10, 59, 30).unwrap();
        let runs = engine.settle_proxies(&driver(), &[scope()], near).unwrap();
        assert_eq!(runs[0].outcome, ProxyOutcome::SkippedWindow);
        assert_eq!(engine.ledger(&scope()).unwrap().pending_sells().len(), 1);
    }

    #[test]
    fn test_proxy_skips_contended_target_and_continues() {
        let engine = engine();
        let other = LedgerScope::new(Instrument::new("ETHUSDT"), TimeframeFamily::new(Timeframe::H4));
        let _native = engine.locks().try_acquire(&scope()).unwrap();

        let runs = engine
            .settle_proxies(&driver(), &[scope(), other.clone()], half_past())
            .unwrap();
        assert_eq!(runs[0].outcome, ProxyOutcome::SkippedContended);
        assert_eq!(runs[1].target, other);
        assert!(runs[1].outcome.is_settled());
        assert!(engine.locks().is_held(&scope()));
        assert!(!engine.locks().is_held(&other));
    }

    #[test]
    fn test_proxy_rejects_finer_or_equal_targets() {
        let engine = SettlementEngine::new(
            Arc::new(MemoryLedgerStore::new()),
            SettlementConfig {
                proxy: ProxyConfig::default(),
            },
        );
        let runs = engine
            .settle_proxies(&scope(), &[driver(), scope()], half_past())
            .unwrap();
        assert!(runs
            .iter()
            .all(|r| r.outcome == ProxyOutcome::SkippedNotCoarser));
    }

    /// Store whose reads always fail.
    struct BrokenStore;

    impl LedgerStore for BrokenStore {
        type Lease = ();

        fn acquire(&self, _scope: &LedgerScope) -> SettlementResult<()> {
            Ok(())
        }

        fn load(&self, scope: &LedgerScope) -> SettlementResult<Ledger> {
            Err(SettlementError::Storage {
                scope: scope.to_string(),
                message: "unreadable".to_string(),
            })
        }

        fn commit(&self, _ledger: &Ledger, _new_matches: &[Match]) -> SettlementResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_load_failure_propagates_and_releases_scope() {
        let engine = SettlementEngine::new(Arc::new(BrokenStore), SettlementConfig::default());
        let err = engine
            .settle(&scope(), vec![buy("A", dec!(10), dec!(5), 0)])
            .unwrap_err();
        assert!(matches!(err, SettlementError::Storage { .. }));
        assert!(!engine.locks().is_held(&scope()));

        let err = engine
            .settle_proxies(&driver(), &[scope()], half_past())
            .unwrap_err();
        assert!(matches!(err, SettlementError::Storage { .. }));
        assert!(!engine.locks().is_held(&scope()));
    }

    /// Store whose scopes are always held by another handle.
    struct HeldElsewhere(MemoryLedgerStore);

    impl LedgerStore for HeldElsewhere {
        type Lease = ();

        fn acquire(&self, scope: &LedgerScope) -> SettlementResult<()> {
            Err(SettlementError::LedgerContention {
                scope: scope.to_string(),
            })
        }

        fn load(&self, scope: &LedgerScope) -> SettlementResult<Ledger> {
            self.0.load(scope)
        }

        fn commit(&self, ledger: &Ledger, new_matches: &[Match]) -> SettlementResult<()> {
            self.0.commit(ledger, new_matches)
        }
    }

    #[test]
    fn test_store_lease_contention_blocks_every_pass() {
        let engine = SettlementEngine::new(
            Arc::new(HeldElsewhere(MemoryLedgerStore::new())),
            SettlementConfig::default(),
        );
        let err = engine
            .settle(&scope(), vec![buy("A", dec!(10), dec!(5), 0)])
            .unwrap_err();
        assert!(matches!(err, SettlementError::LedgerContention { .. }));
        assert!(!engine.locks().is_held(&scope()));

        let err = engine
            .record(&scope(), vec![buy("A", dec!(10), dec!(5), 0)])
            .unwrap_err();
        assert!(matches!(err, SettlementError::LedgerContention { .. }));

        let runs = engine
            .settle_proxies(&driver(), &[scope()], half_past())
            .unwrap();
        assert_eq!(runs[0].outcome, ProxyOutcome::SkippedContended);
        assert!(engine.ledger(&scope()).unwrap().fills().is_empty());
    }

    #[test]
    fn test_lockable_quantity_reads_store() {
        let engine = engine();
        engine
            .settle(
                &scope(),
                vec![buy("A", dec!(10), dec!(5), 0), buy("B", dec!(8), dec!(5), 1)],
            )
            .unwrap();
        let qty = engine
            .lockable_quantity(&scope(), Price::new(dec!(11)), dec!(10))
            .unwrap();
        assert_eq!(qty, Size::new(dec!(5)));
        assert!(engine
            .ledger(&scope())
            .unwrap()
            .fill(&OrderNo::new("B"))
            .is_some());
    }
}
