//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::sma::Sma;
use crate::domain::indicator::stddev::population_stddev;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    sma: Sma,
    mult: f64,
}

impl Bollinger {
    pub fn new(period: usize, mult: f64) -> Self {
        Bollinger {
            sma: Sma::new(period),
            mult,
        }
    }

    pub fn next_value(&mut self, close: f64) -> Option<BollingerBands> {
        let middle = self.sma.next_value(close)?;
        let window: Vec<f64> = self.sma.window().iter().copied().collect();
        let stddev = population_stddev(&window);
        Some(BollingerBands {
            upper: middle + self.mult * stddev,
            middle,
            lower: middle - self.mult * stddev,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(prices: &[f64], period: usize, mult: f64) -> Vec<Option<BollingerBands>> {
        let mut bollinger = Bollinger::new(period, mult);
        prices.iter().map(|&p| bollinger.next_value(p)).collect()
    }

    #[test]
    fn bollinger_warmup() {
        let values = run(&[10.0, 20.0, 30.0, 40.0, 50.0], 3, 2.0);

        assert!(values[0].is_none());
        assert!(values[1].is_none());
        assert!(values[2].is_some());
        assert!(values[4].is_some());
    }

    #[test]
    fn bollinger_constant_values() {
        let bands = run(&[100.0; 3], 3, 2.0)[2].unwrap();
        assert!((bands.middle - 100.0).abs() < f64::EPSILON);
        assert!((bands.upper - 100.0).abs() < f64::EPSILON);
        assert!((bands.lower - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bollinger_basic_calculation() {
        let bands = run(&[10.0, 20.0, 30.0], 3, 2.0)[2].unwrap();

        let expected_sd = (200.0_f64 / 3.0).sqrt();
        assert!((bands.middle - 20.0).abs() < 1e-10);
        assert!((bands.upper - (20.0 + 2.0 * expected_sd)).abs() < 1e-10);
        assert!((bands.lower - (20.0 - 2.0 * expected_sd)).abs() < 1e-10);
    }

    #[test]
    fn bollinger_window_slides() {
        // window is [20, 20] on the last bar
        let bands = run(&[10.0, 20.0, 20.0], 2, 1.0)[2].unwrap();
        assert!((bands.upper - bands.lower).abs() < f64::EPSILON);
    }
}
