//! High/low-comparison sequence.
//!
//! Up condition: `high[i] >= high[i-4]`; down condition:
//! `low[i] <= low[i-4]`. Counters follow the same reset/increment rule as the
//! close variant but are evaluated as run lengths over the whole condition
//! array, by either scan in [`crate::run_length`].

use crate::config::RangeScan;
use crate::detector::{
    classic_signal, ensure_min_bars, reading_at_last_bar, SequenceDetector, SideCounters,
    CLASSIC_MIN_BARS, SETUP_LOOKBACK,
};
use crate::error::DetectorResult;
use crate::run_length::{batch_run_lengths, sequential_run_lengths};
use crate::signal::SequenceReading;
use tdbot_core::{Candle, CandleSeries};

/// High/low vs high/low four bars back.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeSequence {
    scan: RangeScan,
}

impl RangeSequence {
    pub fn new(scan: RangeScan) -> Self {
        Self { scan }
    }

    pub fn scan(&self) -> RangeScan {
        self.scan
    }

    /// Counters at every bar.
    pub fn trace(&self, series: &CandleSeries) -> DetectorResult<Vec<SideCounters>> {
        ensure_min_bars(series, CLASSIC_MIN_BARS, self.name())?;

        let candles = series.candles();
        let up = conditions(candles, |curr, base| curr.high >= base.high);
        let down = conditions(candles, |curr, base| curr.low <= base.low);

        let run_lengths = match self.scan {
            RangeScan::Batch => batch_run_lengths,
            RangeScan::Sequential => sequential_run_lengths,
        };

        Ok(run_lengths(&up)
            .into_iter()
            .zip(run_lengths(&down))
            .map(|(up, down)| SideCounters { up, down })
            .collect())
    }
}

impl SequenceDetector for RangeSequence {
    fn name(&self) -> &'static str {
        "range"
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

/// Condition array; bars without a comparison bar are false.
fn conditions(candles: &[Candle], cond: impl Fn(&Candle, &Candle) -> bool) -> Vec<bool> {
    candles
        .iter()
        .enumerate()
        .map(|(i, curr)| {
            i.checked_sub(SETUP_LOOKBACK)
                .map(|j| cond(curr, &candles[j]))
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::fixtures::*;
    use crate::signal::{Signal, SignalSide};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rising_highs_read_sell() {
        let s = from_closes(&[10, 11, 12, 13, 14, 15, 16]);
        let signal = RangeSequence::default().detect(&s).unwrap();
        assert_eq!(signal, Signal::new(SignalSide::Sell, 3, false));
    }

    #[test]
    fn test_equal_highs_count_as_up() {
        // flat bars satisfy both >= and <=; SELL takes priority
        let s = from_closes(&[10, 10, 10, 10, 10, 10]);
        let trace = RangeSequence::default().trace(&s).unwrap();
        assert_eq!(trace[5], SideCounters { up: 2, down: 2 });
        let signal = RangeSequence::default().detect(&s).unwrap();
        assert_eq!(signal.side, SignalSide::Sell);
        assert_eq!(signal.strength, 2);
    }

    #[test]
    fn test_falling_lows_read_buy() {
        let s = from_closes(&[20, 19, 18, 17, 16, 15]);
        let signal = RangeSequence::new(RangeScan::Sequential).detect(&s).unwrap();
        assert_eq!(signal, Signal::new(SignalSide::Buy, 2, false));
    }

    #[test]
    fn test_wick_only_move_counts() {
        // closes unchanged, but the last high pierces the high four bars back
        let mut candles: Vec<_> = (0..4).map(|i| flat(i, dec!(10))).collect();
        candles.push(ohlc(4, dec!(10), dec!(12), dec!(10), dec!(10)));
        let s = series(candles);
        let trace = RangeSequence::default().trace(&s).unwrap();
        assert_eq!(trace[4], SideCounters { up: 1, down: 0 });
    }

    proptest! {
        #[test]
        fn prop_scans_agree_on_random_walks(steps in proptest::collection::vec(-3i64..=3, 5..120)) {
            let mut close = 1_000i64;
            let closes: Vec<i64> = steps
                .iter()
                .map(|step| {
                    close += step;
                    close
                })
                .collect();
            let s = series(
                closes
                    .iter()
                    .enumerate()
                    .map(|(i, &c)| flat(i, Decimal::from(c)))
                    .collect(),
            );
            let batch = RangeSequence::new(RangeScan::Batch).trace(&s).unwrap();
            let sequential = RangeSequence::new(RangeScan::Sequential).trace(&s).unwrap();
            prop_assert_eq!(batch, sequential);
        }
    }
}
