//! Swing point extraction.
//!
//! Bar `j` is a swing high when its high is strictly above the `w` highs before
//! it and at least as high as the `w` highs after it (swing lows mirror this on
//! lows). The asymmetry keeps a flat top from producing several swings.
//!
//! A swing at `j` depends on bars up to `j + w`, so it may only be used from
//! index `j + w` onwards. [`AnalysisSeries::confirmed_swings`] enforces this.
//!
//! [`AnalysisSeries::confirmed_swings`]: crate::domain::pattern::AnalysisSeries::confirmed_swings

use serde::Serialize;

use crate::domain::ohlcv::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub kind: SwingKind,
}

/// All swing points in index order. A window of 0 yields none.
pub fn find_swing_points(candles: &[Candle], window: usize) -> Vec<SwingPoint> {
    let mut swings = Vec::new();
    if window == 0 || candles.len() < 2 * window + 1 {
        return swings;
    }

    for j in window..candles.len() - window {
        let before = &candles[j - window..j];
        let after = &candles[j + 1..=j + window];
        let c = &candles[j];

        if before.iter().all(|b| c.high > b.high) && after.iter().all(|a| c.high >= a.high) {
            swings.push(SwingPoint {
                index: j,
                price: c.high,
                kind: SwingKind::High,
            });
        }
        if before.iter().all(|b| c.low < b.low) && after.iter().all(|a| c.low <= a.low) {
            swings.push(SwingPoint {
                index: j,
                price: c.low,
                kind: SwingKind::Low,
            });
        }
    }
    swings
}

/// Swings of one kind, in index order.
pub fn of_kind(swings: &[SwingPoint], kind: SwingKind) -> Vec<SwingPoint> {
    swings.iter().filter(|s| s.kind == kind).copied().collect()
}
