//! OHLC candles and validated candle series.
//!
//! A series belongs to one instrument and one timeframe and is ordered by
//! `open_time`, strictly increasing. Gaps between bars are tolerated;
//! duplicates and reordering are not.

use crate::error::{CoreError, Result};
use crate::{Instrument, Price, Size, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One closed OHLC bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time (UTC).
    pub open_time: DateTime<Utc>,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Size,
    /// Bar close time (UTC).
    pub close_time: DateTime<Utc>,
}

impl Candle {
    /// Create a candle whose close time is derived from the timeframe.
    pub fn new(
        open_time: DateTime<Utc>,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Size,
        timeframe: Timeframe,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time: open_time + timeframe.period() - chrono::Duration::milliseconds(1),
        }
    }

    /// Check that high/low bound open/close and no price is negative.
    fn shape_violation(&self) -> Option<String> {
        if self.low.inner().is_sign_negative() && !self.low.is_zero() {
            return Some(format!("negative low {}", self.low));
        }
        if self.high < self.low {
            return Some(format!("high {} below low {}", self.high, self.low));
        }
        for (name, px) in [("open", self.open), ("close", self.close)] {
            if px > self.high || px < self.low {
                return Some(format!(
                    "{name} {px} outside range [{}, {}]",
                    self.low, self.high
                ));
            }
        }
        if self.close_time < self.open_time {
            return Some("close_time before open_time".to_string());
        }
        None
    }
}

/// Ordered, validated candles for one instrument/timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleSeries {
    instrument: Instrument,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, rejecting non-monotonic or duplicate timestamps and
    /// malformed bars.
    pub fn new(instrument: Instrument, timeframe: Timeframe, candles: Vec<Candle>) -> Result<Self> {
        let malformed = |index: usize, reason: String| CoreError::MalformedSeries {
            instrument: instrument.to_string(),
            timeframe: timeframe.to_string(),
            index,
            reason,
        };

        for (index, candle) in candles.iter().enumerate() {
            if let Some(reason) = candle.shape_violation() {
                return Err(malformed(index, reason));
            }
        }

        for (index, pair) in candles.windows(2).enumerate() {
            let (prev, curr) = (&pair[0], &pair[1]);
            if curr.open_time == prev.open_time {
                return Err(malformed(
                    index + 1,
                    format!("duplicate open_time {}", curr.open_time),
                ));
            }
            if curr.open_time < prev.open_time {
                return Err(malformed(
                    index + 1,
                    format!(
                        "open_time {} precedes previous {}",
                        curr.open_time, prev.open_time
                    ),
                ));
            }
        }

        Ok(Self {
            instrument,
            timeframe,
            candles,
        })
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<Price> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<Price> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<Price> {
        self.candles.iter().map(|c| c.low).collect()
    }
}
