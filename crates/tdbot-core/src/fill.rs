//! Executed fills and settled matches.
//!
//! A `Fill` is created by the order layer when an execution is reported and
//! afterwards only mutated by settlement (decrementing
//! `unmatched_quantity`, stamping `completed_at`). A `Match` is created once
//! and never mutated.

use crate::error::{CoreError, Result};
use crate::{Instrument, OrderNo, OrderSide, Price, Size, TimeframeId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An executed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Globally unique exchange order number.
    pub order_no: OrderNo,
    pub instrument: Instrument,
    /// Canonical or alternate timeframe id of the placing client.
    pub timeframe: TimeframeId,
    pub side: OrderSide,
    pub price: Price,
    /// Executed quantity.
    pub quantity: Size,
    /// Quantity not yet consumed by matches. Never negative.
    pub unmatched_quantity: Size,
    pub fill_time: DateTime<Utc>,
    /// Set when a BUY lot is fully consumed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Fill {
    /// A freshly reported fill: nothing matched yet.
    pub fn new(
        order_no: impl Into<OrderNo>,
        instrument: Instrument,
        timeframe: TimeframeId,
        side: OrderSide,
        price: Price,
        quantity: Size,
        fill_time: DateTime<Utc>,
    ) -> Self {
        Self {
            order_no: order_no.into(),
            instrument,
            timeframe,
            side,
            price,
            quantity,
            unmatched_quantity: quantity,
            fill_time,
            completed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.unmatched_quantity.is_positive()
    }

    /// Matched portion of the executed quantity.
    pub fn matched_quantity(&self) -> Size {
        self.quantity - self.unmatched_quantity
    }

    /// Check quantity invariants.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| CoreError::InvalidFill {
            order_no: self.order_no.to_string(),
            reason,
        };
        if !self.price.is_positive() {
            return Err(invalid(format!("non-positive price {}", self.price)));
        }
        if !self.quantity.is_positive() {
            return Err(invalid(format!("non-positive quantity {}", self.quantity)));
        }
        if self.unmatched_quantity.is_negative() {
            return Err(invalid(format!(
                "negative unmatched quantity {}",
                self.unmatched_quantity
            )));
        }
        if self.unmatched_quantity > self.quantity {
            return Err(invalid(format!(
                "unmatched {} exceeds quantity {}",
                self.unmatched_quantity, self.quantity
            )));
        }
        Ok(())
    }
}

/// A settled buy/sell pair.
///
/// Unique per `(sell_order_no, buy_order_no)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub sell_order_no: OrderNo,
    pub buy_order_no: OrderNo,
    pub sell_price: Price,
    pub buy_price: Price,
    pub matched_quantity: Size,
    /// `(sell_price - buy_price) * matched_quantity`.
    pub profit: Decimal,
    pub instrument: Instrument,
    /// Timeframe id of the SELL fill.
    pub timeframe: TimeframeId,
    pub matched_at: DateTime<Utc>,
}

impl Match {
    /// Pair a SELL with a BUY for `quantity`, computing profit exactly.
    pub fn between(sell: &Fill, buy: &Fill, quantity: Size, matched_at: DateTime<Utc>) -> Self {
        Self {
            sell_order_no: sell.order_no.clone(),
            buy_order_no: buy.order_no.clone(),
            sell_price: sell.price,
            buy_price: buy.price,
            matched_quantity: quantity,
            profit: quantity.notional(sell.price - buy.price),
            instrument: sell.instrument.clone(),
            timeframe: sell.timeframe.clone(),
            matched_at,
        }
    }

    /// Uniqueness key.
    pub fn pair(&self) -> (OrderNo, OrderNo) {
        (self.sell_order_no.clone(), self.buy_order_no.clone())
    }
}
