//! Prometheus metrics and structured logging for tdbot.
//!
//! - Structured logging with `tracing` (JSON in production, pretty otherwise)
//! - Prometheus counters and gauges for detection and settlement

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogFormat, DEFAULT_FILTER};
pub use metrics::Metrics;
