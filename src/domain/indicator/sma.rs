//! Simple Moving Average over a trailing window of closes.
//!
//! Warmup: first (n-1) bars are invalid.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Sma {
            period,
            window: VecDeque::with_capacity(period),
        }
    }

    pub fn next_value(&mut self, x: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(x);
        if self.window.len() < self.period {
            return None;
        }
        // Summed fresh each bar so long windows do not accumulate drift.
        Some(self.window.iter().sum::<f64>() / self.period as f64)
    }

    /// The closes currently inside the window, oldest first.
    pub fn window(&self) -> &VecDeque<f64> {
        &self.window
    }
}
