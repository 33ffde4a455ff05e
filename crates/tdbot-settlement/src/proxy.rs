//! Proxy settlement window.
//!
//! A finer-timeframe driver may settle a coarser timeframe's pending SELL
//! inventory, but only while the clock is at least `min_distance` away from
//! both the previous and the next trigger instant of that coarser
//! timeframe. Near a trigger the coarser timeframe's own pass may be in
//! flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tdbot_core::{LedgerScope, Timeframe};

use crate::config::ProxyConfig;
use crate::matcher::SettlementReport;

/// Why a proxy target was or was not settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProxyOutcome {
    Settled { report: SettlementReport },
    /// Too close to one of the target's trigger instants.
    SkippedWindow,
    /// The target's own pass (or another proxy) holds the scope.
    SkippedContended,
    /// The target is not coarser than the driver.
    SkippedNotCoarser,
    /// Proxy settlement is switched off.
    SkippedDisabled,
}

impl ProxyOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Settled { .. } => "settled",
            Self::SkippedWindow => "skipped_window",
            Self::SkippedContended => "skipped_contended",
            Self::SkippedNotCoarser => "skipped_not_coarser",
            Self::SkippedDisabled => "skipped_disabled",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }
}

/// One proxy target and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRun {
    pub target: LedgerScope,
    pub outcome: ProxyOutcome,
}

/// True when `now` is far enough from both of `target`'s trigger instants.
pub fn proxy_window_clear(config: &ProxyConfig, target: Timeframe, now: DateTime<Utc>) -> bool {
    target
        .trigger_window(now, config.trigger_offset_secs)
        .is_clear(now, config.min_distance())
}

/// Pre-lock checks for a proxy target; `None` means it may be settled.
pub(crate) fn precheck(
    config: &ProxyConfig,
    driver: Timeframe,
    target: Timeframe,
    now: DateTime<Utc>,
) -> Option<ProxyOutcome> {
    if !config.enabled {
        return Some(ProxyOutcome::SkippedDisabled);
    }
    if !target.is_coarser_than(driver) {
        return Some(ProxyOutcome::SkippedNotCoarser);
    }
    if !proxy_window_clear(config, target, now) {
        return Some(ProxyOutcome::SkippedWindow);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
    }

    #[test]
    fn test_window_edges() {
        let config = ProxyConfig::default();
        // 1h triggers at 10:00 and 11:00
        assert!(!proxy_window_clear(&config, Timeframe::H1, at(10, 0, 0)));
        assert!(!proxy_window_clear(&config, Timeframe::H1, at(10, 1, 19)));
        assert!(proxy_window_clear(&config, Timeframe::H1, at(10, 1, 20)));
        assert!(proxy_window_clear(&config, Timeframe::H1, at(10, 58, 40)));
        assert!(!proxy_window_clear(&config, Timeframe::H1, at(10, 58, 41)));
    }

    #[test]
    fn test_offset_shifts_triggers() {
        let config = ProxyConfig {
            trigger_offset_secs: 30,
            ..Default::default()
        };
        // triggers at 10:00:30 and 11:00:30
        assert!(!proxy_window_clear(&config, Timeframe::H1, at(10, 1, 49)));
        assert!(proxy_window_clear(&config, Timeframe::H1, at(10, 1, 50)));
    }

    #[test]
    fn test_precheck_order() {
        let config = ProxyConfig::default();
        let mid = at(10, 30, 0);
        assert_eq!(precheck(&config, Timeframe::M15, Timeframe::H1, mid), None);
        assert_eq!(
            precheck(&config, Timeframe::H1, Timeframe::H1, mid),
            Some(ProxyOutcome::SkippedNotCoarser)
        );
        assert_eq!(
            precheck(&config, Timeframe::H4, Timeframe::H1, mid),
            Some(ProxyOutcome::SkippedNotCoarser)
        );
        assert_eq!(
            precheck(&config, Timeframe::M15, Timeframe::H1, at(11, 0, 30)),
            Some(ProxyOutcome::SkippedWindow)
        );

        let disabled = ProxyConfig {
            enabled: false,
            ..Default::default()
        };
        assert_eq!(
            precheck(&disabled, Timeframe::M15, Timeframe::H1, mid),
            Some(ProxyOutcome::SkippedDisabled)
        );
    }
}
