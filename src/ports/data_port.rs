//! Market data provider port trait.

use crate::domain::error::EdgefinderError;
use crate::domain::ohlcv::Candle;

pub trait DataPort {
    /// Ordered candles for `symbol` at `interval`, oldest first.
    ///
    /// Transport or provider failures are reported as
    /// [`EdgefinderError::DataUnavailable`], never as insufficient data.
    fn fetch_candles(&self, symbol: &str, interval: &str) -> Result<Vec<Candle>, EdgefinderError>;
}
