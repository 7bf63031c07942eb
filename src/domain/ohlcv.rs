//! Candle representation: one OHLCV bar per time step with session metadata.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub session_date: NaiveDate,
    pub hour_of_day: u32,
}

impl Candle {
    /// Build a candle whose session is the calendar date of `time`.
    pub fn new(
        time: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Candle {
            time,
            open,
            high,
            low,
            close,
            volume,
            session_date: time.date(),
            hour_of_day: time.hour(),
        }
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn body_midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Minutes since midnight of the bar's open time.
    pub fn minute_of_day(&self) -> u32 {
        self.time.hour() * 60 + self.time.minute()
    }
}
