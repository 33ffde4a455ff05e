//! Core domain types for the tdbot trading core.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `Candle`, `CandleSeries`: Validated OHLC bar sequences
//! - `Fill`, `Match`: Executed orders and settled buy/sell pairs
//! - `Instrument`, `Timeframe`, `TimeframeFamily`, `LedgerScope`: Scoping keys
//! - `OrderSide`, `OrderNo`: Trading enums and identifiers

pub mod candle;
pub mod decimal;
pub mod error;
pub mod fill;
pub mod market;
pub mod order;
pub mod timeframe;

pub use candle::{Candle, CandleSeries};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use fill::{Fill, Match};
pub use market::{Instrument, LedgerScope, TimeframeFamily, TimeframeId};
pub use order::{OrderNo, OrderSide};
pub use timeframe::{Timeframe, TriggerWindow};
