//! Error types for tdbot-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Candle series violates ordering or bar-shape invariants.
    ///
    /// Never repaired silently: a reordered or deduplicated series could mask
    /// an upstream feed bug.
    #[error("Malformed series {instrument}/{timeframe} at index {index}: {reason}")]
    MalformedSeries {
        instrument: String,
        timeframe: String,
        index: usize,
        reason: String,
    },

    #[error("Invalid fill {order_no}: {reason}")]
    InvalidFill { order_no: String, reason: String },

    #[error("Unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
