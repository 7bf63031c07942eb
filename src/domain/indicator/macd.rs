//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 + signal - 1 bars

use crate::domain::indicator::ema::Ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Macd {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    pub fn next_value(&mut self, close: f64) -> Option<MacdValue> {
        // Both EMAs must see every close, even while the other is warming up.
        let fast = self.fast.next_value(close);
        let slow = self.slow.next_value(close);
        let line = fast? - slow?;
        let signal = self.signal.next_value(line)?;
        Some(MacdValue {
            line,
            signal,
            histogram: line - signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::ema::Ema;

    fn run(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<Option<MacdValue>> {
        let mut macd = Macd::new(fast, slow, signal);
        prices.iter().map(|&p| macd.next_value(p)).collect()
    }

    #[test]
    fn macd_warmup() {
        let prices: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let values = run(&prices, 3, 5, 3);

        // slow - 1 + signal - 1 = 6
        for (i, v) in values.iter().enumerate().take(6) {
            assert!(v.is_none(), "Bar {} should be invalid", i);
        }
        assert!(values[6].is_some());
    }

    #[test]
    fn macd_flat_prices_are_zero() {
        let m = run(&[50.0; 40], 12, 26, 9)[39].unwrap();
        assert!(m.line.abs() < 1e-12);
        assert!(m.signal.abs() < 1e-12);
        assert!(m.histogram.abs() < 1e-12);
    }

    #[test]
    fn macd_line_is_ema_difference() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let mut fast = Ema::new(3);
        let mut slow = Ema::new(6);
        let mut macd = Macd::new(3, 6, 4);

        for &p in &prices {
            let (f, s) = (fast.next_value(p), slow.next_value(p));
            if let Some(m) = macd.next_value(p) {
                let expected = f.unwrap() - s.unwrap();
                assert!((m.line - expected).abs() < 1e-9);
                assert!((m.histogram - (m.line - m.signal)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn macd_rising_prices_positive_line() {
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 2.0).collect();
        let m = run(&prices, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)[49].unwrap();
        assert!(m.line > 0.0);
    }

    #[test]
    fn macd_zero_period() {
        assert!(run(&[1.0, 2.0], 0, 26, 9).iter().all(Option::is_none));
    }
}
