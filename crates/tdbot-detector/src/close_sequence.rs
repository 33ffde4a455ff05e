//! Close-comparison sequence.
//!
//! Up condition: `close[i] > close[i-4]`; down condition:
//! `close[i] < close[i-4]`. Each side's counter resets on a false bar and
//! increments on a true bar. A positive up count reads as SELL (exhaustion
//! of a rise), a positive down count as BUY.

use crate::detector::{
    classic_signal, ensure_min_bars, reading_at_last_bar, SequenceDetector, SideCounters,
    CLASSIC_MIN_BARS, SETUP_LOOKBACK,
};
use crate::error::DetectorResult;
use crate::signal::SequenceReading;
use tdbot_core::{Candle, CandleSeries};

/// Close vs close four bars back.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseSequence;

impl CloseSequence {
    pub fn new() -> Self {
        Self
    }

    /// Counters at every bar.
    pub fn trace(&self, series: &CandleSeries) -> DetectorResult<Vec<SideCounters>> {
        ensure_min_bars(series, CLASSIC_MIN_BARS, self.name())?;
        Ok(close_counters(series.candles()))
    }
}

impl SequenceDetector for CloseSequence {
    fn name(&self) -> &'static str {
        "close"
    }

    fn min_bars(&self) -> usize {
        CLASSIC_MIN_BARS
    }

    fn read(&self, series: &CandleSeries) -> DetectorResult<SequenceReading> {
        let counters = self.trace(series)?;
        let last = counters.last().copied().unwrap_or_default();
        reading_at_last_bar(series, classic_signal(series, last), 0)
    }
}

/// Left fold of the reset/increment rule over the closes.
fn close_counters(candles: &[Candle]) -> Vec<SideCounters> {
    candles
        .iter()
        .enumerate()
        .scan(SideCounters::default(), |prev, (i, candle)| {
            let next = match i.checked_sub(SETUP_LOOKBACK) {
                Some(j) => {
                    let base = candles[j].close;
                    SideCounters {
                        up: if candle.close > base { prev.up + 1 } else { 0 },
                        down: if candle.close < base { prev.down + 1 } else { 0 },
                    }
                }
                None => SideCounters::default(),
            };
            *prev = next;
            Some(next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::fixtures::*;
    use crate::signal::{Signal, SignalSide};
    use rust_decimal_macros::dec;

    #[test]
    fn test_single_up_bar_reads_sell() {
        let s = from_closes(&[10, 10, 10, 10, 15]);
        let signal = CloseSequence::new().detect(&s).unwrap();
        assert_eq!(signal.side, SignalSide::Sell);
        assert_eq!(signal.strength, 1);
        assert!(!signal.confirmed);
    }

    #[test]
    fn test_falling_closes_read_buy() {
        let s = from_closes(&[20, 19, 18, 17, 16, 15, 14]);
        let trace = CloseSequence::new().trace(&s).unwrap();
        let downs: Vec<u32> = trace.iter().map(|c| c.down).collect();
        assert_eq!(downs, vec![0, 0, 0, 0, 1, 2, 3]);

        let signal = CloseSequence::new().detect(&s).unwrap();
        assert_eq!(signal, Signal::new(SignalSide::Buy, 3, false));
    }

    #[test]
    fn test_flat_series_reads_none() {
        let s = from_closes(&[10, 10, 10, 10, 10, 10]);
        assert_eq!(CloseSequence::new().detect(&s).unwrap(), Signal::NONE);
    }

    #[test]
    fn test_counter_resets_on_false_bar() {
        // i=4: 15>10 up=1, i=5: 16>10 up=2, i=6: 10 == 10 reset, i=7: 17>10 up=1
        let s = from_closes(&[10, 10, 10, 10, 15, 16, 10, 17]);
        let ups: Vec<u32> = CloseSequence::new()
            .trace(&s)
            .unwrap()
            .iter()
            .map(|c| c.up)
            .collect();
        assert_eq!(ups, vec![0, 0, 0, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_confirmed_buy_breaks_prior_high() {
        // closes fall, last bar closes above the prior bar's high
        let mut candles: Vec<_> = [30, 29, 28, 27, 26]
            .iter()
            .enumerate()
            .map(|(i, &c)| flat(i, rust_decimal::Decimal::from(c)))
            .collect();
        candles.push(ohlc(5, dec!(26), dec!(27.5), dec!(26), dec!(27.5)));
        let s = series(candles);

        let signal = CloseSequence::new().detect(&s).unwrap();
        assert_eq!(signal.side, SignalSide::Buy);
        assert_eq!(signal.strength, 2);
        assert!(signal.confirmed);
    }

    #[test]
    fn test_reading_points_at_last_bar() {
        let s = from_closes(&[10, 10, 10, 10, 15]);
        let reading = CloseSequence::new().read(&s).unwrap();
        assert_eq!(reading.bar_index, 4);
        assert_eq!(reading.countdown, 0);
        assert_eq!(reading.open_time, s.last().unwrap().open_time);
    }
}
