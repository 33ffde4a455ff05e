//! Detector configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which sequence algorithm produces signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorVariant {
    /// Close vs close four bars back.
    #[default]
    Close,
    /// High/low vs high/low four bars back.
    Range,
    /// Setup + countdown with trend-line invalidation.
    Extended,
}

impl DetectorVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Range => "range",
            Self::Extended => "extended",
        }
    }
}

impl fmt::Display for DetectorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluation strategy for the range variant's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeScan {
    /// Running-maximum scan over reset markers.
    #[default]
    Batch,
    /// Reset/increment loop.
    Sequential,
}

/// Configuration for sequence detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Algorithm selection.
    #[serde(default)]
    pub variant: DetectorVariant,
    /// Counter evaluation for the range variant (ignored otherwise).
    #[serde(default)]
    pub range_scan: RangeScan,
}

impl DetectorConfig {
    pub fn new(variant: DetectorVariant) -> Self {
        Self {
            variant,
            ..Default::default()
        }
    }
}
