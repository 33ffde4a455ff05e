//! Inventory ledger for one instrument + timeframe family.
//!
//! Holds every fill the scope has seen (arrival order) and every match it
//! produced. Open BUY fills are the held inventory ("lots").

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tdbot_core::{Fill, LedgerScope, Match, OrderNo, OrderSide, Price, Size};

use crate::error::{SettlementError, SettlementResult};
use crate::profit_lock;

/// Fills and matches of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    scope: LedgerScope,
    /// Arrival order.
    fills: Vec<Fill>,
    /// Append-only.
    matches: Vec<Match>,
}

impl Ledger {
    /// Empty ledger.
    #[must_use]
    pub fn new(scope: LedgerScope) -> Self {
        Self {
            scope,
            fills: Vec::new(),
            matches: Vec::new(),
        }
    }

    /// Rebuild a ledger from stored fills and matches.
    ///
    /// Every fill is validated and must belong to the scope.
    pub fn from_parts(
        scope: LedgerScope,
        fills: Vec<Fill>,
        matches: Vec<Match>,
    ) -> SettlementResult<Self> {
        let ledger = Self {
            scope,
            fills,
            matches,
        };
        for fill in &ledger.fills {
            ledger.check_fill(fill)?;
        }
        Ok(ledger)
    }

    pub fn scope(&self) -> &LedgerScope {
        &self.scope
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn fill(&self, order_no: &OrderNo) -> Option<&Fill> {
        self.fills.iter().find(|f| &f.order_no == order_no)
    }

    pub fn contains_order(&self, order_no: &OrderNo) -> bool {
        self.fill(order_no).is_some()
    }

    /// True if a match for this pair was ever recorded.
    pub fn has_match(&self, sell: &OrderNo, buy: &OrderNo) -> bool {
        self.matches
            .iter()
            .any(|m| &m.sell_order_no == sell && &m.buy_order_no == buy)
    }

    /// Open BUY fills, cheapest first, ties in arrival order.
    pub fn open_lots(&self) -> Vec<&Fill> {
        let mut lots: Vec<&Fill> = self
            .fills
            .iter()
            .filter(|f| f.side == OrderSide::Buy && f.is_open())
            .collect();
        // stable: equal prices keep arrival order
        lots.sort_by_key(|f| f.price);
        lots
    }

    /// SELL fills recorded but not yet settled.
    pub fn pending_sells(&self) -> Vec<&Fill> {
        self.fills
            .iter()
            .filter(|f| f.side == OrderSide::Sell && f.is_open())
            .collect()
    }

    pub fn open_lot_count(&self) -> usize {
        self.open_lots().len()
    }

    /// Total unmatched BUY quantity.
    pub fn held_quantity(&self) -> Size {
        self.open_lots().iter().map(|f| f.unmatched_quantity).sum()
    }

    /// Quantity-weighted cost of held inventory; `None` when nothing is held.
    pub fn average_cost(&self) -> Option<Price> {
        let held = self.held_quantity();
        if held.is_zero() {
            return None;
        }
        let cost: Decimal = self
            .open_lots()
            .iter()
            .map(|f| f.unmatched_quantity.notional(f.price))
            .sum();
        Some(Price::new(cost / held.inner()))
    }

    /// Sum of realized profit over all recorded matches.
    pub fn realized_profit(&self) -> Decimal {
        self.matches.iter().map(|m| m.profit).sum()
    }

    /// Quantity that can be sold at `candidate` while locking in at least
    /// `min_profit_pct` on every lot it consumes.
    pub fn lockable_quantity(&self, candidate: Price, min_profit_pct: Decimal) -> Size {
        profit_lock::lockable_quantity(self.open_lots(), candidate, min_profit_pct)
    }

    /// Profit that selling the lockable quantity at `candidate` would realize.
    pub fn locked_profit_preview(&self, candidate: Price, min_profit_pct: Decimal) -> Decimal {
        profit_lock::locked_profit_preview(self.open_lots(), candidate, min_profit_pct)
    }

    /// Set of recorded match pairs.
    pub fn match_pairs(&self) -> HashSet<(OrderNo, OrderNo)> {
        self.matches.iter().map(Match::pair).collect()
    }

    /// Validate a fill and check it belongs to this scope.
    pub(crate) fn check_fill(&self, fill: &Fill) -> SettlementResult<()> {
        fill.validate()?;
        if !self.scope.covers(&fill.instrument, &fill.timeframe) {
            return Err(SettlementError::ScopeMismatch {
                scope: self.scope.to_string(),
                order_no: fill.order_no.to_string(),
                instrument: fill.instrument.to_string(),
                timeframe: fill.timeframe.to_string(),
            });
        }
        Ok(())
    }

    /// Reassemble parts already checked by a settlement pass.
    pub(crate) fn from_trusted(scope: LedgerScope, fills: Vec<Fill>, matches: Vec<Match>) -> Self {
        Self {
            scope,
            fills,
            matches,
        }
    }

    pub(crate) fn into_parts(self) -> (LedgerScope, Vec<Fill>, Vec<Match>) {
        (self.scope, self.fills, self.matches)
    }

    pub(crate) fn push_fill(&mut self, fill: Fill) {
        self.fills.push(fill);
    }
}
