//! tdbot command-line driver.
//!
//! Wires the core crates together:
//! - Candle files in, sequence readings out (journaled)
//! - Fill files in, settlement passes against the file-backed ledger
//! - Proxy settlement of coarser timeframes
//! - Daily profit summary and profit-lock queries

pub mod app;
pub mod config;
pub mod error;
pub mod feed;

pub use app::{Application, LockableReport, MarketReading};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
