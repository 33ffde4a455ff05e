//! Candle timeframes and their trigger schedule.
//!
//! Every timeframe fires on UTC boundaries that are whole multiples of its
//! period (optionally shifted by an offset). Used for:
//! - Candle close-time arithmetic
//! - Proxy settlement race avoidance (distance to previous/next trigger)

use crate::error::{CoreError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// All timeframes, finest first.
    pub const ALL: [Timeframe; 11] = [
        Self::M1,
        Self::M3,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::H6,
        Self::H12,
        Self::D1,
    ];

    /// Canonical identifier (e.g. `"15m"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H12 => "12h",
            Self::D1 => "1d",
        }
    }

    /// Period length in seconds.
    pub fn period_secs(&self) -> i64 {
        match self {
            Self::M1 => 60,
            Self::M3 => 180,
            Self::M5 => 300,
            Self::M15 => 900,
            Self::M30 => 1_800,
            Self::H1 => 3_600,
            Self::H2 => 7_200,
            Self::H4 => 14_400,
            Self::H6 => 21_600,
            Self::H12 => 43_200,
            Self::D1 => 86_400,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::seconds(self.period_secs())
    }

    /// True if this timeframe has a longer period than `other`.
    pub fn is_coarser_than(&self, other: Timeframe) -> bool {
        self.period_secs() > other.period_secs()
    }

    /// Trigger instants surrounding `now`.
    ///
    /// `offset_secs` shifts the boundaries (e.g. a scheduler that fires a few
    /// seconds after the bar closes). An instant exactly on a boundary is
    /// its own previous trigger.
    pub fn trigger_window(&self, now: DateTime<Utc>, offset_secs: i64) -> TriggerWindow {
        let period = self.period_secs();
        let since_boundary = (now.timestamp() - offset_secs).rem_euclid(period);
        let previous = now
            - Duration::seconds(since_boundary)
            - Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos()));
        TriggerWindow {
            previous,
            next: previous + self.period(),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTimeframe(s.to_string()))
    }
}

/// The previous and next scheduled trigger instants around a moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerWindow {
    pub previous: DateTime<Utc>,
    pub next: DateTime<Utc>,
}

impl TriggerWindow {
    /// Time elapsed since the previous trigger.
    pub fn since_previous(&self, now: DateTime<Utc>) -> Duration {
        now - self.previous
    }

    /// Time remaining until the next trigger.
    pub fn until_next(&self, now: DateTime<Utc>) -> Duration {
        self.next - now
    }

    /// True when `now` is at least `min_distance` away from both triggers.
    pub fn is_clear(&self, now: DateTime<Utc>, min_distance: Duration) -> bool {
        self.since_previous(now) >= min_distance && self.until_next(now) >= min_distance
    }
}
