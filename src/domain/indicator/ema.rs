//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with the SMA of the first n closes, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    count: usize,
    sum: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Ema {
            period,
            k: 2.0 / (period as f64 + 1.0),
            count: 0,
            sum: 0.0,
            value: None,
        }
    }

    pub fn next_value(&mut self, x: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.count += 1;
        match self.value {
            Some(prev) => {
                let ema = x * self.k + prev * (1.0 - self.k);
                self.value = Some(ema);
            }
            None => {
                self.sum += x;
                if self.count == self.period {
                    self.value = Some(self.sum / self.period as f64);
                }
            }
        }
        self.value
    }
}
