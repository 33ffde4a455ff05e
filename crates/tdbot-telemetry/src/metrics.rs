//! Prometheus metrics for tdbot.
//!
//! Covers:
//! - Signal detection per variant and side
//! - Detector rejections (short or malformed series)
//! - Settlement passes, matches and realized profit
//! - Proxy settlement outcomes
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a fatal configuration error that should
//! crash at first use rather than fail silently. These panics only occur
//! during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Encoder, Gauge, GaugeVec, TextEncoder,
};

use crate::error::TelemetryResult;

/// Signals emitted.
/// Labels: variant (close/range/extended), side (buy/sell/none)
pub static SIGNALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tdbot_signals_total",
        "Total sequence signals emitted",
        &["variant", "side"]
    )
    .unwrap()
});

/// Detector calls that returned an error.
/// Labels: variant, reason (insufficient_data/malformed_series/...)
pub static DETECTOR_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tdbot_detector_rejected_total",
        "Total detector calls rejected",
        &["variant", "reason"]
    )
    .unwrap()
});

/// Latest countdown per market (extended variant).
pub static SIGNAL_COUNTDOWN: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tdbot_signal_countdown",
        "Countdown value at the latest bar",
        &["instrument", "timeframe"]
    )
    .unwrap()
});

/// Settlement passes.
/// Labels: outcome (committed/noop/contended/failed)
pub static SETTLEMENT_PASSES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tdbot_settlement_passes_total",
        "Total settlement passes by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Match records created.
pub static MATCHES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("tdbot_matches_total", "Total match records created").unwrap()
});

/// Quantity consumed by matches.
pub static MATCHED_QUANTITY_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tdbot_matched_quantity_total",
        "Total quantity matched between sells and buy lots"
    )
    .unwrap()
});

/// Realized profit of this process. May go negative.
pub static REALIZED_PROFIT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "tdbot_realized_profit",
        "Realized profit of matches created by this process"
    )
    .unwrap()
});

/// SELL quantity forced to zero after the buy pool ran dry.
pub static FORCED_REMAINDER_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tdbot_forced_remainder_total",
        "Total sell quantity forced to zero on pool exhaustion"
    )
    .unwrap()
});

/// Held inventory per ledger scope.
pub static LEDGER_HELD_QUANTITY: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tdbot_ledger_held_quantity",
        "Unmatched buy quantity per ledger scope",
        &["scope"]
    )
    .unwrap()
});

/// Proxy settlement runs.
/// Labels: outcome (settled/skipped_window/skipped_contended/...)
pub static PROXY_RUNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tdbot_proxy_runs_total",
        "Total proxy settlement targets by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Recording helpers.
pub struct Metrics;

impl Metrics {
    /// Record an emitted signal.
    pub fn signal_emitted(variant: &str, side: &str) {
        SIGNALS_TOTAL.with_label_values(&[variant, side]).inc();
    }

    /// Record a detector rejection.
    pub fn detector_rejected(variant: &str, reason: &str) {
        DETECTOR_REJECTED_TOTAL
            .with_label_values(&[variant, reason])
            .inc();
    }

    /// Set the latest countdown for a market.
    pub fn signal_countdown(instrument: &str, timeframe: &str, countdown: u32) {
        SIGNAL_COUNTDOWN
            .with_label_values(&[instrument, timeframe])
            .set(f64::from(countdown));
    }

    /// Record a settlement pass outcome.
    pub fn settlement_pass(outcome: &str) {
        SETTLEMENT_PASSES_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record the matches of one pass.
    pub fn matches_created(count: usize, quantity: f64, profit: f64) {
        MATCHES_TOTAL.inc_by(count as f64);
        if quantity > 0.0 {
            MATCHED_QUANTITY_TOTAL.inc_by(quantity);
        }
        REALIZED_PROFIT.add(profit);
    }

    /// Record a forced sell remainder.
    pub fn forced_remainder(quantity: f64) {
        if quantity > 0.0 {
            FORCED_REMAINDER_TOTAL.inc_by(quantity);
        }
    }

    /// Set held inventory for a scope.
    pub fn ledger_held(scope: &str, quantity: f64) {
        LEDGER_HELD_QUANTITY.with_label_values(&[scope]).set(quantity);
    }

    /// Record one proxy target outcome.
    pub fn proxy_run(outcome: &str) {
        PROXY_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_counter_increments() {
        let before = SIGNALS_TOTAL.with_label_values(&["close", "sell"]).get();
        Metrics::signal_emitted("close", "sell");
        let after = SIGNALS_TOTAL.with_label_values(&["close", "sell"]).get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_negative_profit_lowers_gauge() {
        let before = REALIZED_PROFIT.get();
        Metrics::matches_created(1, 2.0, -3.0);
        assert!((REALIZED_PROFIT.get() - (before - 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        Metrics::proxy_run("skipped_window");
        Metrics::settlement_pass("committed");
        let text = Metrics::render().unwrap();
        assert!(text.contains("tdbot_proxy_runs_total"));
        assert!(text.contains("tdbot_settlement_passes_total"));
    }
}
