//! Extended setup/countdown sequence.
//!
//! Per side, per bar:
//!
//! - **Stage**: cycles 1..=9 on consecutive setup bars (`close[i] <
//!   close[i-4]` buy, `close[i] > close[i-4]` sell), 0 on any other bar.
//!   Reaching 9 arms the side.
//! - **Cycle**: `Inactive` until the side arms, then `Active { since }`
//!   until the opposing side arms or the opposing trend-line is breached.
//! - **Setup**: equals the stage while inactive; while active it keeps
//!   counting setup bars past 9.
//! - **Trend-line**: fixed on arming (buy: highest high of the 9 setup bars,
//!   sell: lowest low). Cleared once a close crosses it (above the buy
//!   line, below the sell line), and that breach invalidates the opposing
//!   cycle.
//! - **Countdown**: gated by a nonzero own trend-line and an opposing stage
//!   below 9. Losing the cycle resets it once, but it keeps counting while
//!   the own line holds. Qualifying bars (`close[i] <
//!   low[i-2]` buy, `close[i] > high[i-2]` sell) count `|previous| + 1`;
//!   other bars hold the magnitude as unqualified. A closed gate resets it.
//!   Neither setup nor countdown is clamped at 9 / 13.
//!
//! The selection at the last bar prefers the larger countdown, then the
//! larger setup.

use crate::detector::{
    ensure_min_bars, is_confirmed, reading_at_last_bar, SequenceDetector, SETUP_LOOKBACK,
};
use crate::error::DetectorResult;
use crate::signal::{SequenceReading, Signal, SignalSide};
use serde::{Deserialize, Serialize};
use tdbot_core::{Candle, CandleSeries, Price};

/// Stage value that arms a side.
pub const SETUP_COMPLETE: u32 = 9;

/// Classic countdown completion.
pub const COUNTDOWN_COMPLETE: u32 = 13;

/// One short of complete; target of the unqualified shortcut.
pub const COUNTDOWN_NEAR_COMPLETE: u32 = 12;

/// Countdown step whose close becomes the shortcut reference price.
pub const COUNTDOWN_REFERENCE_STEP: u32 = 8;

/// Countdown comparison distance.
pub const COUNTDOWN_LOOKBACK: usize = 2;

/// Minimum bars for the extended variant.
pub const EXTENDED_MIN_BARS: usize = 34;

/// Whether a side's setup cycle is in force.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleState {
    #[default]
    Inactive,
    /// Armed; `since` is the index of the first bar of the arming setup.
    Active { since: usize },
}

impl CycleState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Countdown magnitude and whether the current bar counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub value: u32,
    /// False on bars that held the previous magnitude without qualifying.
    pub qualified: bool,
}

impl Countdown {
    pub fn is_complete(&self) -> bool {
        self.value >= COUNTDOWN_COMPLETE
    }
}

/// One side's sequence state at a bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideState {
    /// 1..=9 stage cycle, 0 when the last bar broke the setup.
    pub stage: u32,
    /// Cumulative setup count.
    pub setup: u32,
    pub cycle: CycleState,
    /// Zero when no trend-line is in force.
    pub trend_line: Price,
    pub countdown: Countdown,
    /// Close of the bar where the countdown first reached 8.
    pub reference_price: Option<Price>,
}

impl SideState {
    fn advance_stage(&mut self, setup_bar: bool) {
        self.stage = if setup_bar {
            self.stage % SETUP_COMPLETE + 1
        } else {
            0
        };
        if self.cycle.is_active() {
            if setup_bar {
                self.setup += 1;
            }
        } else {
            self.setup = self.stage;
        }
    }

    fn arm(&mut self, index: usize, trend_line: Price) {
        self.trend_line = trend_line;
        if !self.cycle.is_active() {
            self.cycle = CycleState::Active {
                since: index + 1 - SETUP_COMPLETE as usize,
            };
        }
    }

    fn invalidate(&mut self) {
        self.cycle = CycleState::Inactive;
        self.setup = self.stage;
        self.reset_countdown();
    }

    fn reset_countdown(&mut self) {
        self.countdown = Countdown::default();
        self.reference_price = None;
    }

    fn has_trend_line(&self) -> bool {
        !self.trend_line.is_zero()
    }
}

/// Both sides' state at one bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedBarState {
    pub index: usize,
    pub buy: SideState,
    pub sell: SideState,
}

/// Setup + countdown sequence with trend-line invalidation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedSequence;

impl ExtendedSequence {
    pub fn new() -> Self {
        Self
    }

    /// State at every bar.
    pub fn trace(&self, series: &CandleSeries) -> DetectorResult<Vec<ExtendedBarState>> {
        ensure_min_bars(series, EXTENDED_MIN_BARS, self.name())?;
        let candles = series.candles();
        Ok((0..candles.len())
            .scan(ExtendedBarState::default(), |state, index| {
                *state = step(candles, index, state);
                Some(state.clone())
            })
            .collect())
    }
}

impl SequenceDetector for ExtendedSequence {
    fn name(&self) -> &'static str {
        "extended"
    }

    fn min_bars(&self) -> usize {
        EXTENDED_MIN_BARS
    }

    fn read(&self, series: &CandleSeries) -> DetectorResult<SequenceReading> {
        let trace = self.trace(series)?;
        let last = trace.last().cloned().unwrap_or_default();
        let (signal, countdown) = select(series, &last);
        reading_at_last_bar(series, signal, countdown)
    }
}

/// Advance both sides by one bar.
fn step(candles: &[Candle], index: usize, prev: &ExtendedBarState) -> ExtendedBarState {
    let candle = &candles[index];
    let mut buy = prev.buy.clone();
    let mut sell = prev.sell.clone();

    // Breaches are judged against the lines in force before this bar.
    if buy.has_trend_line() && candle.close > buy.trend_line {
        buy.trend_line = Price::ZERO;
        sell.invalidate();
    }
    if sell.has_trend_line() && candle.close < sell.trend_line {
        sell.trend_line = Price::ZERO;
        buy.invalidate();
    }

    let base = index.checked_sub(SETUP_LOOKBACK).map(|j| candles[j].close);
    buy.advance_stage(base.is_some_and(|b| candle.close < b));
    sell.advance_stage(base.is_some_and(|b| candle.close > b));

    if buy.stage == SETUP_COMPLETE {
        buy.arm(index, highest_high(candles, index));
        sell.invalidate();
    }
    if sell.stage == SETUP_COMPLETE {
        sell.arm(index, lowest_low(candles, index));
        buy.invalidate();
    }

    let countdown_base = index.checked_sub(COUNTDOWN_LOOKBACK).map(|j| &candles[j]);
    let buy_qualifies = countdown_base.is_some_and(|b| candle.close < b.low);
    let sell_qualifies = countdown_base.is_some_and(|b| candle.close > b.high);

    let buy_breaks = buy.reference_price.is_some_and(|r| candle.low <= r);
    let sell_breaks = sell.reference_price.is_some_and(|r| candle.high >= r);
    let (buy_stage, sell_stage) = (buy.stage, sell.stage);
    advance_countdown(&mut buy, sell_stage, buy_qualifies, candle, buy_breaks);
    advance_countdown(&mut sell, buy_stage, sell_qualifies, candle, sell_breaks);

    ExtendedBarState { index, buy, sell }
}

/// Countdown transition for one side.
///
/// `breaks_reference` is whether the bar's extreme reached the step-8
/// reference price: low at or below it for buy, high at or above it for sell.
fn advance_countdown(
    side: &mut SideState,
    opposing_stage: u32,
    qualifies: bool,
    candle: &Candle,
    breaks_reference: bool,
) {
    if !side.has_trend_line() || opposing_stage >= SETUP_COMPLETE {
        side.reset_countdown();
        return;
    }

    let previous = side.countdown.value;
    side.countdown = if qualifies {
        let value = previous + 1;
        if value == COUNTDOWN_REFERENCE_STEP && side.reference_price.is_none() {
            side.reference_price = Some(candle.close);
        }
        Countdown {
            value,
            qualified: true,
        }
    } else if previous == COUNTDOWN_NEAR_COMPLETE && breaks_reference {
        Countdown {
            value: COUNTDOWN_NEAR_COMPLETE,
            qualified: true,
        }
    } else {
        Countdown {
            value: previous,
            qualified: false,
        }
    };
}

/// Highest high over the 9 bars ending at `index`.
fn highest_high(candles: &[Candle], index: usize) -> Price {
    setup_window(candles, index)
        .iter()
        .map(|c| c.high)
        .max()
        .unwrap_or(Price::ZERO)
}

/// Lowest low over the 9 bars ending at `index`.
fn lowest_low(candles: &[Candle], index: usize) -> Price {
    setup_window(candles, index)
        .iter()
        .map(|c| c.low)
        .min()
        .unwrap_or(Price::ZERO)
}

fn setup_window(candles: &[Candle], index: usize) -> &[Candle] {
    let start = (index + 1).saturating_sub(SETUP_COMPLETE as usize);
    &candles[start..=index]
}

/// Pick the winning side at the last bar: larger countdown, then larger
/// setup, SELL on an exact tie.
fn select(series: &CandleSeries, last: &ExtendedBarState) -> (Signal, u32) {
    let (buy, sell) = (&last.buy, &last.sell);
    let buy_cd = buy.countdown.value;
    let sell_cd = sell.countdown.value;

    let side = if buy_cd != sell_cd {
        if sell_cd > buy_cd {
            SignalSide::Sell
        } else {
            SignalSide::Buy
        }
    } else if sell.setup == 0 && buy.setup == 0 && sell_cd == 0 {
        SignalSide::None
    } else if buy.setup > sell.setup {
        SignalSide::Buy
    } else {
        SignalSide::Sell
    };

    match side {
        SignalSide::Sell => (
            Signal::new(side, sell.setup, is_confirmed(series, side)),
            sell_cd,
        ),
        SignalSide::Buy => (
            Signal::new(side, buy.setup, is_confirmed(series, side)),
            buy_cd,
        ),
        SignalSide::None => (Signal::NONE, 0),
    }
}
