//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,tdbot=debug";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl LogFormat {
    /// JSON when `RUST_ENV=production`, pretty otherwise.
    pub fn from_env() -> Self {
        Self::for_environment(std::env::var("RUST_ENV").ok().as_deref())
    }

    fn for_environment(rust_env: Option<&str>) -> Self {
        match rust_env {
            Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Install the global subscriber.
///
/// Filter comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
/// Fails if a global subscriber is already set.
pub fn init_logging() -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
