//! Sequence signal types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tdbot_core::OrderSide;

/// Direction suggested by a sequence count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalSide {
    Buy,
    Sell,
    None,
}

impl SignalSide {
    /// Order side to act on, if any.
    pub fn order_side(&self) -> Option<OrderSide> {
        match self {
            Self::Buy => Some(OrderSide::Buy),
            Self::Sell => Some(OrderSide::Sell),
            Self::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::None => "none",
        }
    }
}

impl fmt::Display for SignalSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional signal at the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub side: SignalSide,
    /// Counter value of the winning side at the latest bar.
    pub strength: u32,
    /// Latest close broke the prior bar's opposite extreme.
    pub confirmed: bool,
}

impl Signal {
    pub const NONE: Self = Self {
        side: SignalSide::None,
        strength: 0,
        confirmed: false,
    };

    pub fn new(side: SignalSide, strength: u32, confirmed: bool) -> Self {
        Self {
            side,
            strength,
            confirmed,
        }
    }

    pub fn is_none(&self) -> bool {
        self.side == SignalSide::None
    }
}

/// A signal plus the context downstream sizing needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReading {
    pub signal: Signal,
    /// Countdown of the winning side (extended variant); 0 for the classic
    /// variants. Sizing reads it to modulate aggressiveness.
    pub countdown: u32,
    /// Index of the bar the reading refers to (always the last bar).
    pub bar_index: usize,
    /// Open time of that bar.
    pub open_time: DateTime<Utc>,
}
