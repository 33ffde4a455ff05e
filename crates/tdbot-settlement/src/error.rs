//! Settlement error types.

use tdbot_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    /// A match pair that already exists in the store.
    #[error("Duplicate match in {scope}: sell {sell} / buy {buy}")]
    DuplicateMatch {
        scope: String,
        sell: String,
        buy: String,
    },

    /// Another settlement pass holds the scope.
    #[error("Ledger contention on {scope}: settlement pass already in flight")]
    LedgerContention { scope: String },

    /// Fill does not belong to the scope being settled.
    #[error("Fill {order_no} ({instrument}/{timeframe}) is outside scope {scope}")]
    ScopeMismatch {
        scope: String,
        order_no: String,
        instrument: String,
        timeframe: String,
    },

    #[error("Storage failure for {scope}: {message}")]
    Storage { scope: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SettlementResult<T> = Result<T, SettlementError>;
