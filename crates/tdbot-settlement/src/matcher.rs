//! Price-priority FIFO matching.
//!
//! [`settle`] is a pure function of the ledger and the new fills: it returns
//! the updated ledger and a report of what the pass did, and never touches
//! storage. Exclusivity and persistence are the engine's job.
//!
//! # Algorithm
//!
//! 1. New fills whose order number is already known are skipped.
//! 2. The buy pool starts with the ledger's open BUY lots, cheapest first,
//!    equal prices in arrival order.
//! 3. Pending ledger SELLs and new fills are processed in fill-time order.
//!    A BUY joins the pool at its sorted position; a SELL consumes the pool
//!    from the front, one [`Match`] per lot touched.
//! 4. A lot that reaches exactly zero leaves the pool and is stamped
//!    complete at the SELL's fill time.
//! 5. A SELL that outlives the pool has its remainder forced to zero.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tdbot_core::{Fill, LedgerScope, Match, OrderNo, OrderSide, Size};
use tracing::{debug, trace, warn};

use crate::error::SettlementResult;
use crate::ledger::Ledger;

/// SELL quantity left over after the pool ran dry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedRemainder {
    pub order_no: OrderNo,
    pub quantity: Size,
    pub fill_time: DateTime<Utc>,
}

/// Outcome of one settlement pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub scope: LedgerScope,
    /// Matches produced by this pass, in creation order.
    pub matches: Vec<Match>,
    /// SELL remainders forced to zero.
    pub forced: Vec<ForcedRemainder>,
    /// BUY lots that reached zero in this pass.
    pub cleared_lots: Vec<OrderNo>,
    /// New fills ignored because their order number was already known.
    pub skipped_duplicates: Vec<OrderNo>,
    /// New fills added to the ledger.
    pub recorded: usize,
}

impl SettlementReport {
    #[must_use]
    pub fn empty(scope: LedgerScope) -> Self {
        Self {
            scope,
            matches: Vec::new(),
            forced: Vec::new(),
            cleared_lots: Vec::new(),
            skipped_duplicates: Vec::new(),
            recorded: 0,
        }
    }

    pub fn matched_quantity(&self) -> Size {
        self.matches.iter().map(|m| m.matched_quantity).sum()
    }

    pub fn realized_profit(&self) -> Decimal {
        self.matches.iter().map(|m| m.profit).sum()
    }

    pub fn forced_quantity(&self) -> Size {
        self.forced.iter().map(|f| f.quantity).sum()
    }

    /// True if the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.matches.is_empty() && self.forced.is_empty() && self.recorded == 0
    }
}

/// Buy pool: indices into the working fill list, cheapest first.
struct BuyPool {
    lots: Vec<usize>,
}

impl BuyPool {
    fn from_ledger(fills: &[Fill]) -> Self {
        let mut lots: Vec<usize> = fills
            .iter()
            .enumerate()
            .filter(|(_, f)| f.side == OrderSide::Buy && f.is_open())
            .map(|(i, _)| i)
            .collect();
        lots.sort_by_key(|&i| fills[i].price);
        Self { lots }
    }

    /// Insert after every lot with a price <= the new lot's price.
    fn insert(&mut self, fills: &[Fill], index: usize) {
        let price = fills[index].price;
        let at = self.lots.partition_point(|&i| fills[i].price <= price);
        self.lots.insert(at, index);
    }

    fn front(&self) -> Option<usize> {
        self.lots.first().copied()
    }

    fn pop_front(&mut self) {
        if !self.lots.is_empty() {
            self.lots.remove(0);
        }
    }
}

/// Run one settlement pass over `ledger` with `new_fills`.
///
/// Fails only on fills that are invalid or outside the ledger's scope; in
/// that case nothing is applied.
pub fn settle(ledger: Ledger, new_fills: Vec<Fill>) -> SettlementResult<(Ledger, SettlementReport)> {
    let mut report = SettlementReport::empty(ledger.scope().clone());

    let mut seen: HashSet<OrderNo> = ledger.fills().iter().map(|f| f.order_no.clone()).collect();
    let mut accepted = Vec::with_capacity(new_fills.len());
    for fill in new_fills {
        ledger.check_fill(&fill)?;
        if !seen.insert(fill.order_no.clone()) {
            debug!(scope = %ledger.scope(), order_no = %fill.order_no, "Skipping known fill");
            report.skipped_duplicates.push(fill.order_no);
            continue;
        }
        accepted.push(fill);
    }

    let (scope, mut fills, mut matches) = ledger.into_parts();
    let mut pool = BuyPool::from_ledger(&fills);

    // Pending SELLs from the ledger, then the new fills.
    let mut events: Vec<usize> = fills
        .iter()
        .enumerate()
        .filter(|(_, f)| f.side == OrderSide::Sell && f.is_open())
        .map(|(i, _)| i)
        .collect();
    report.recorded = accepted.len();
    for fill in accepted {
        events.push(fills.len());
        fills.push(fill);
    }
    // stable: equal fill times keep arrival order
    events.sort_by_key(|&i| fills[i].fill_time);

    for index in events {
        match fills[index].side {
            OrderSide::Buy => {
                if fills[index].is_open() {
                    pool.insert(&fills, index);
                }
            }
            OrderSide::Sell => {
                match_sell(&mut fills, &mut pool, index, &mut matches, &mut report);
            }
        }
    }

    Ok((Ledger::from_trusted(scope, fills, matches), report))
}

fn match_sell(
    fills: &mut [Fill],
    pool: &mut BuyPool,
    sell_index: usize,
    matches: &mut Vec<Match>,
    report: &mut SettlementReport,
) {
    let matched_at = fills[sell_index].fill_time;

    while fills[sell_index].is_open() {
        let Some(buy_index) = pool.front() else {
            break;
        };
        let quantity = fills[sell_index]
            .unmatched_quantity
            .min(fills[buy_index].unmatched_quantity);

        let m = Match::between(&fills[sell_index], &fills[buy_index], quantity, matched_at);
        trace!(
            sell = %m.sell_order_no,
            buy = %m.buy_order_no,
            quantity = %quantity,
            profit = %m.profit,
            "Matched"
        );
        matches.push(m.clone());
        report.matches.push(m);

        fills[sell_index].unmatched_quantity -= quantity;
        let buy = &mut fills[buy_index];
        buy.unmatched_quantity -= quantity;
        if buy.unmatched_quantity.is_zero() {
            buy.completed_at = Some(matched_at);
            report.cleared_lots.push(buy.order_no.clone());
            pool.pop_front();
        }
    }

    let sell = &mut fills[sell_index];
    if sell.is_open() {
        warn!(
            order_no = %sell.order_no,
            remainder = %sell.unmatched_quantity,
            "Buy pool exhausted, forcing sell remainder to zero"
        );
        report.forced.push(ForcedRemainder {
            order_no: sell.order_no.clone(),
            quantity: sell.unmatched_quantity,
            fill_time: sell.fill_time,
        });
        sell.unmatched_quantity = Size::ZERO;
    }
}
