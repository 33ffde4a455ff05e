//! Profit-lock sizing oracle.
//!
//! Answers "how much held inventory can be sold at this price while every
//! consumed lot clears its minimum profit margin". A lot qualifies when
//! `candidate > lot_price * (1 + min_profit_pct / 100)`; a candidate sitting
//! exactly on the threshold does not lock the lot.
//!
//! Every lot is examined. Qualification is not assumed to be monotonic in
//! lot order, so a failing lot never ends the scan.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tdbot_core::{Fill, OrderSide, Price, Size};

use crate::error::{SettlementError, SettlementResult};

/// Default minimum margin, in percent.
fn default_min_profit_pct() -> Decimal {
    Decimal::ONE
}

/// Profit-lock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitLockConfig {
    /// Minimum margin over each lot's price, in percent.
    #[serde(default = "default_min_profit_pct")]
    pub min_profit_pct: Decimal,
}

impl Default for ProfitLockConfig {
    fn default() -> Self {
        Self {
            min_profit_pct: default_min_profit_pct(),
        }
    }
}

impl ProfitLockConfig {
    pub fn validate(&self) -> SettlementResult<()> {
        if self.min_profit_pct.is_sign_negative() {
            return Err(SettlementError::InvalidConfig(format!(
                "min_profit_pct must not be negative, got {}",
                self.min_profit_pct
            )));
        }
        Ok(())
    }
}

fn qualifying<'a>(
    lots: impl IntoIterator<Item = &'a Fill>,
    candidate: Price,
    min_profit_pct: Decimal,
) -> impl Iterator<Item = &'a Fill> {
    lots.into_iter().filter(move |lot| {
        lot.side == OrderSide::Buy
            && lot.is_open()
            && candidate > lot.price.with_margin_pct(min_profit_pct)
    })
}

/// Remaining quantity of every lot that qualifies at `candidate`.
pub fn lockable_quantity<'a>(
    lots: impl IntoIterator<Item = &'a Fill>,
    candidate: Price,
    min_profit_pct: Decimal,
) -> Size {
    qualifying(lots, candidate, min_profit_pct)
        .map(|lot| lot.unmatched_quantity)
        .sum()
}

/// Profit realized by selling every qualifying lot's remainder at `candidate`.
pub fn locked_profit_preview<'a>(
    lots: impl IntoIterator<Item = &'a Fill>,
    candidate: Price,
    min_profit_pct: Decimal,
) -> Decimal {
    qualifying(lots, candidate, min_profit_pct)
        .map(|lot| lot.unmatched_quantity.notional(candidate - lot.price))
        .sum()
}
