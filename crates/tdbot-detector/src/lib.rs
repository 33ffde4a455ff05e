//! Sequence signal detection for the tdbot trading core.
//!
//! Counts consecutive bars whose price compares favourably with a bar four
//! positions earlier and turns the count at the latest bar into a
//! directional signal. Three interchangeable variants share one contract:
//!
//! - [`CloseSequence`]: close vs close four bars back
//! - [`RangeSequence`]: high/low vs high/low four bars back, batch scan capable
//! - [`ExtendedSequence`]: setup + countdown with trend-line invalidation
//!
//! All variants are pure functions of the series and safe to call
//! concurrently.

pub mod close_sequence;
pub mod config;
pub mod detector;
pub mod error;
pub mod extended;
pub mod range_sequence;
pub mod run_length;
pub mod signal;

pub use close_sequence::CloseSequence;
pub use config::{DetectorConfig, DetectorVariant, RangeScan};
pub use detector::{build_detector, SequenceDetector, SideCounters, SETUP_LOOKBACK};
pub use error::{DetectorError, DetectorResult};
pub use extended::{
    Countdown, CycleState, ExtendedBarState, ExtendedSequence, SideState, COUNTDOWN_COMPLETE,
    COUNTDOWN_NEAR_COMPLETE, EXTENDED_MIN_BARS, SETUP_COMPLETE,
};
pub use range_sequence::RangeSequence;
pub use run_length::{batch_run_lengths, sequential_run_lengths};
pub use signal::{SequenceReading, Signal, SignalSide};
