//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No market configured for {instrument}/{timeframe}")]
    UnknownMarket {
        instrument: String,
        timeframe: String,
    },

    #[error("Invalid input in {path} at line {line}: {reason}")]
    Input {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Core error: {0}")]
    Core(#[from] tdbot_core::CoreError),

    #[error("Detector error: {0}")]
    Detector(#[from] tdbot_detector::DetectorError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] tdbot_settlement::SettlementError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tdbot_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] tdbot_persistence::PersistenceError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
