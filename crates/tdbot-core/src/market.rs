//! Instrument and ledger scope identification.
//!
//! Inventory is scoped per instrument and per timeframe family. A family is
//! a canonical timeframe plus at most one alternate id, used when two client
//! references run on the same timeframe concurrently.

use crate::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tradable instrument symbol (e.g. "BTCUSDT").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Instrument {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Timeframe identifier as carried on fills.
///
/// Either a canonical timeframe id (`"1h"`) or an alternate id registered
/// on a [`TimeframeFamily`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeframeId(String);

impl TimeframeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimeframeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Timeframe> for TimeframeId {
    fn from(tf: Timeframe) -> Self {
        Self(tf.as_str().to_string())
    }
}

impl From<&str> for TimeframeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Canonical timeframe plus an optional alternate id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeframeFamily {
    pub timeframe: Timeframe,
    #[serde(default)]
    pub alternate: Option<TimeframeId>,
}

impl TimeframeFamily {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            alternate: None,
        }
    }

    pub fn with_alternate(timeframe: Timeframe, alternate: impl Into<String>) -> Self {
        Self {
            timeframe,
            alternate: Some(TimeframeId::new(alternate)),
        }
    }

    pub fn canonical_id(&self) -> TimeframeId {
        TimeframeId::from(self.timeframe)
    }

    /// True if `id` is the canonical id or the alternate id.
    pub fn contains(&self, id: &TimeframeId) -> bool {
        id.as_str() == self.timeframe.as_str() || self.alternate.as_ref() == Some(id)
    }
}

impl fmt::Display for TimeframeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alternate {
            Some(alt) => write!(f, "{}|{}", self.timeframe, alt),
            None => write!(f, "{}", self.timeframe),
        }
    }
}

/// Unit of settlement exclusivity: one instrument, one timeframe family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerScope {
    pub instrument: Instrument,
    pub family: TimeframeFamily,
}

impl LedgerScope {
    pub fn new(instrument: Instrument, family: TimeframeFamily) -> Self {
        Self { instrument, family }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.family.timeframe
    }

    /// True if a fill with this instrument and timeframe id belongs here.
    pub fn covers(&self, instrument: &Instrument, timeframe: &TimeframeId) -> bool {
        &self.instrument == instrument && self.family.contains(timeframe)
    }

    /// Filesystem/label friendly key: `{instrument}_{timeframe}`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.instrument, self.family.timeframe)
    }
}

impl fmt::Display for LedgerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument, self.family)
    }
}
