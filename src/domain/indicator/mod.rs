//! Technical indicator implementations.
//!
//! Every indicator is a forward-only calculator fed one value or candle at a
//! time, so a value at index `i` never depends on a candle after `i`.
//! [`frame`] combines all calculators into the per-bar `IndicatorFrame`.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod frame;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod vwap;
