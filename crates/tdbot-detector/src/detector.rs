//! Detector contract and shared classic-variant logic.
//!
//! Every variant implements [`SequenceDetector`]; the active one is chosen
//! from [`DetectorConfig`] by [`build_detector`].

use crate::config::{DetectorConfig, DetectorVariant};
use crate::error::{DetectorError, DetectorResult};
use crate::signal::{SequenceReading, Signal, SignalSide};
use crate::{CloseSequence, ExtendedSequence, RangeSequence};
use serde::{Deserialize, Serialize};
use tdbot_core::CandleSeries;
use tracing::debug;

/// Distance, in bars, of the comparison bar for setup conditions.
pub const SETUP_LOOKBACK: usize = 4;

/// Minimum bars for the two classic variants.
pub const CLASSIC_MIN_BARS: usize = SETUP_LOOKBACK + 1;

/// A sequence signal algorithm.
pub trait SequenceDetector: Send + Sync {
    /// Short variant name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Minimum series length accepted.
    fn min_bars(&self) -> usize;

    /// Signal plus countdown at the latest bar.
    fn read(&self, series: &CandleSeries) -> DetectorResult<SequenceReading>;

    /// Signal at the latest bar.
    fn detect(&self, series: &CandleSeries) -> DetectorResult<Signal> {
        self.read(series).map(|reading| reading.signal)
    }
}

/// Instantiate the configured variant.
pub fn build_detector(config: &DetectorConfig) -> Box<dyn SequenceDetector> {
    debug!(variant = %config.variant, range_scan = ?config.range_scan, "Building detector");
    match config.variant {
        DetectorVariant::Close => Box::new(CloseSequence::new()),
        DetectorVariant::Range => Box::new(RangeSequence::new(config.range_scan)),
        DetectorVariant::Extended => Box::new(ExtendedSequence::new()),
    }
}

/// Up/down counters at one bar (classic variants).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCounters {
    /// Consecutive bars satisfying the up condition (SELL pressure).
    pub up: u32,
    /// Consecutive bars satisfying the down condition (BUY pressure).
    pub down: u32,
}

/// Reject series shorter than `required`.
pub(crate) fn ensure_min_bars(
    series: &CandleSeries,
    required: usize,
    variant: &'static str,
) -> DetectorResult<()> {
    if series.len() < required {
        return Err(DetectorError::InsufficientData {
            variant,
            instrument: series.instrument().to_string(),
            timeframe: series.timeframe().to_string(),
            required,
            available: series.len(),
        });
    }
    Ok(())
}

/// Latest close broke the prior bar's opposite extreme.
///
/// SELL: close below the prior low. BUY: close above the prior high.
pub(crate) fn is_confirmed(series: &CandleSeries, side: SignalSide) -> bool {
    let candles = series.candles();
    let (prior, last) = match candles {
        [.., prior, last] => (prior, last),
        _ => return false,
    };
    match side {
        SignalSide::Sell => last.close < prior.low,
        SignalSide::Buy => last.close > prior.high,
        SignalSide::None => false,
    }
}

/// Turn last-bar classic counters into a signal. SELL wins ties.
pub(crate) fn classic_signal(series: &CandleSeries, last: SideCounters) -> Signal {
    let (side, strength) = if last.up > 0 {
        (SignalSide::Sell, last.up)
    } else if last.down > 0 {
        (SignalSide::Buy, last.down)
    } else {
        return Signal::NONE;
    };
    Signal::new(side, strength, is_confirmed(series, side))
}

/// Wrap a signal computed at the last bar into a reading.
pub(crate) fn reading_at_last_bar(
    series: &CandleSeries,
    signal: Signal,
    countdown: u32,
) -> DetectorResult<SequenceReading> {
    let bar_index = series.len().saturating_sub(1);
    let last = series.last().ok_or_else(|| DetectorError::InsufficientData {
        variant: "any",
        instrument: series.instrument().to_string(),
        timeframe: series.timeframe().to_string(),
        required: 1,
        available: 0,
    })?;
    Ok(SequenceReading {
        signal,
        countdown,
        bar_index,
        open_time: last.open_time,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use tdbot_core::{Candle, CandleSeries, Instrument, Price, Size, Timeframe};

    /// Bar with explicit OHLC values.
    pub fn ohlc(index: usize, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Candle::new(
            start + Duration::hours(index as i64),
            Price::new(open),
            Price::new(high),
            Price::new(low),
            Price::new(close),
            Size::ONE,
            Timeframe::H1,
        )
    }

    /// Bar whose body is a single price, with a 1-unit wick on each side.
    pub fn flat(index: usize, close: Decimal) -> Candle {
        ohlc(index, close, close + Decimal::ONE, close - Decimal::ONE, close)
    }

    pub fn series(candles: Vec<Candle>) -> CandleSeries {
        CandleSeries::new(Instrument::new("BTCUSDT"), Timeframe::H1, candles).unwrap()
    }

    pub fn from_closes(closes: &[i64]) -> CandleSeries {
        series(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| flat(i, Decimal::from(c)))
                .collect(),
        )
    }
}
