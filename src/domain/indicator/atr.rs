//! Average True Range with Wilder smoothing.
//!
//! TR[0] = high - low, TR[i] = max(high - low, |high - prevClose|, |low - prevClose|).
//! Seed: mean of the first n true ranges, then ATR = (prevATR * (n-1) + TR) / n.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::ohlcv::Candle;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    count: usize,
    tr_sum: f64,
    value: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Atr {
            period,
            prev_close: None,
            count: 0,
            tr_sum: 0.0,
            value: None,
        }
    }

    pub fn next_value(&mut self, candle: &Candle) -> Option<f64> {
        let tr = match self.prev_close {
            Some(prev) => candle.true_range(prev),
            None => candle.high - candle.low,
        };
        self.prev_close = Some(candle.close);
        if self.period == 0 {
            return None;
        }

        self.count += 1;
        let n = self.period as f64;
        self.value = match self.value {
            Some(prev_atr) => Some((prev_atr * (n - 1.0) + tr) / n),
            None => {
                self.tr_sum += tr;
                (self.count == self.period).then(|| self.tr_sum / n)
            }
        };
        self.value
    }
}
