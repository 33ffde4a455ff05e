//! Detector error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    /// Series shorter than the variant's minimum. The caller must wait for
    /// more bars.
    #[error(
        "Insufficient data for {variant} on {instrument}/{timeframe}: need {required} bars, have {available}"
    )]
    InsufficientData {
        variant: &'static str,
        instrument: String,
        timeframe: String,
        required: usize,
        available: usize,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type DetectorResult<T> = Result<T, DetectorError>;
