//! Session VWAP with deviation bands.
//!
//! VWAP = cumulative(typical price × volume) / cumulative(volume), reset whenever
//! the candle's session date changes. Bands are VWAP ± k × the running deviation
//! of closes from the current VWAP within the session. While the session has
//! traded no volume, VWAP falls back to the latest typical price.
//!
//! Valid from the first bar of every session.

use chrono::NaiveDate;

use crate::domain::indicator::stddev::RunningDeviation;
use crate::domain::ohlcv::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VwapBands {
    pub vwap: f64,
    pub upper: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct Vwap {
    k: f64,
    session: Option<NaiveDate>,
    pv_sum: f64,
    volume_sum: f64,
    closes: RunningDeviation,
}

impl Vwap {
    pub fn new(k: f64) -> Self {
        Vwap {
            k,
            session: None,
            pv_sum: 0.0,
            volume_sum: 0.0,
            closes: RunningDeviation::new(),
        }
    }

    pub fn next_value(&mut self, candle: &Candle) -> VwapBands {
        if self.session != Some(candle.session_date) {
            self.session = Some(candle.session_date);
            self.pv_sum = 0.0;
            self.volume_sum = 0.0;
            self.closes.reset();
        }

        let typical = candle.typical_price();
        self.pv_sum += typical * candle.volume;
        self.volume_sum += candle.volume;
        self.closes.push(candle.close);

        let vwap = if self.volume_sum > 0.0 {
            self.pv_sum / self.volume_sum
        } else {
            typical
        };
        let deviation = self.closes.deviation_from(vwap);

        VwapBands {
            vwap,
            upper: vwap + self.k * deviation,
            lower: vwap - self.k * deviation,
        }
    }
}
