//! Band touches and pullbacks.
//!
//! A rejection pierces a Bollinger or VWAP band intrabar and closes back
//! inside it. A pullback tags the VWAP or the medium EMA within a tolerance
//! while the EMA stack still points in the trade direction.

use serde::Serialize;

use super::{
    pct_from, AnalysisSeries, Direction, PatternCategory, PatternDetector, PatternInstance,
    RiskMultipliers,
};
use crate::domain::indicator::frame::IndicatorFrame;
use crate::domain::ohlcv::Candle;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandConfig {
    pub bollinger_rejection: bool,
    pub vwap_rejection: bool,
    pub vwap_pullback: bool,
    pub ema_pullback: bool,
    /// Max distance, in percent, between the bar's extreme and the pullback level.
    pub pullback_tolerance_pct: f64,
    pub rejection_risk: RiskMultipliers,
    pub pullback_risk: RiskMultipliers,
}

impl Default for BandConfig {
    fn default() -> Self {
        BandConfig {
            bollinger_rejection: true,
            vwap_rejection: true,
            vwap_pullback: true,
            ema_pullback: true,
            pullback_tolerance_pct: 0.1,
            rejection_risk: RiskMultipliers::new(1.0, 1.5),
            pullback_risk: RiskMultipliers::new(1.0, 2.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BandDetector {
    config: BandConfig,
}

impl BandDetector {
    pub fn new(config: BandConfig) -> Self {
        BandDetector { config }
    }

    fn pullback(&self, candle: &Candle, frame: &IndicatorFrame, level: f64) -> Option<Direction> {
        let tol = self.config.pullback_tolerance_pct;
        let up_stack = frame.ema_medium > frame.ema_long && candle.close > frame.ema_long;
        let down_stack = frame.ema_medium < frame.ema_long && candle.close < frame.ema_long;

        if up_stack && candle.close > level && pct_from(candle.low, level).abs() <= tol {
            Some(Direction::Long)
        } else if down_stack && candle.close < level && pct_from(candle.high, level).abs() <= tol {
            Some(Direction::Short)
        } else {
            None
        }
    }
}

/// Long when the low pierces `lower` and closes above it, short on the mirror at `upper`.
fn rejection(candle: &Candle, lower: f64, upper: f64) -> Option<Direction> {
    if candle.low < lower && candle.close > lower {
        Some(Direction::Long)
    } else if candle.high > upper && candle.close < upper {
        Some(Direction::Short)
    } else {
        None
    }
}

impl PatternDetector for BandDetector {
    fn name(&self) -> &'static str {
        "band"
    }

    fn detect(&self, series: &AnalysisSeries, index: usize) -> Vec<PatternInstance> {
        let Some(frame) = series.frame(index) else {
            return Vec::new();
        };
        let candle = &series.candles()[index];
        let mut hits: Vec<(String, Direction, f64, RiskMultipliers)> = Vec::new();

        if self.config.bollinger_rejection {
            if let Some(d) = rejection(candle, frame.bollinger_lower, frame.bollinger_upper) {
                let (side, level) = match d {
                    Direction::Long => ("lower", frame.bollinger_lower),
                    Direction::Short => ("upper", frame.bollinger_upper),
                };
                let id = format!("bollinger_{side}_rejection");
                hits.push((id, d, level, self.config.rejection_risk));
            }
        }
        if self.config.vwap_rejection {
            if let Some(d) = rejection(candle, frame.vwap_lower, frame.vwap_upper) {
                let (side, level) = match d {
                    Direction::Long => ("lower", frame.vwap_lower),
                    Direction::Short => ("upper", frame.vwap_upper),
                };
                let id = format!("vwap_{side}_rejection");
                hits.push((id, d, level, self.config.rejection_risk));
            }
        }
        if self.config.vwap_pullback {
            if let Some(d) = self.pullback(candle, frame, frame.vwap) {
                let id = format!("vwap_pullback_{}", d.as_str().to_ascii_lowercase());
                hits.push((id, d, frame.vwap, self.config.pullback_risk));
            }
        }
        if self.config.ema_pullback {
            if let Some(d) = self.pullback(candle, frame, frame.ema_medium) {
                let id = format!("ema_pullback_{}", d.as_str().to_ascii_lowercase());
                hits.push((id, d, frame.ema_medium, self.config.pullback_risk));
            }
        }

        hits.into_iter()
            .filter_map(|(id, direction, level, risk)| {
                let category = PatternCategory::Band;
                PatternInstance::at_trigger(series, id, category, direction, index, risk)
                    .map(|p| p.with_context("level", level))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::test_support::*;

    #[test]
    fn rejection_requires_close_back_inside() {
        let bars = [(100.0, 101.0, 94.0, 99.0)];
        let candle = &candles_from(&bars)[0];
        assert_eq!(rejection(candle, 95.0, 105.0), Some(Direction::Long));
        assert_eq!(rejection(candle, 99.5, 105.0), None);
        let bars = [(100.0, 106.0, 99.0, 104.0)];
        let candle = &candles_from(&bars)[0];
        assert_eq!(rejection(candle, 95.0, 105.0), Some(Direction::Short));
    }

    #[test]
    fn bollinger_lower_rejection_after_range() {
        let mut bars = Vec::new();
        for i in 0..10 {
            let c = if i % 2 == 0 { 100.0 } else { 101.0 };
            bars.push((c, c + 0.5, c - 0.5, c));
        }
        // long lower wick, closes back in the range
        bars.push((100.5, 101.0, 94.0, 100.4));
        let series = series_from(&bars, 2);
        let detector = BandDetector::new(BandConfig::default());
        let found = detector.detect(&series, 10);

        let boll = found
            .iter()
            .find(|p| p.pattern_id == "bollinger_lower_rejection")
            .expect("bollinger rejection");
        assert_eq!(boll.direction, Direction::Long);
        assert!(boll.levels_consistent());
    }

    #[test]
    fn ema_pullback_in_uptrend() {
        let mut bars = Vec::new();
        for i in 0..10 {
            let c = 100.0 + i as f64;
            bars.push((c - 0.5, c + 0.5, c - 0.8, c));
        }
        let series = series_from(&bars, 2);
        let ema_medium = series.frame(9).unwrap().ema_medium;
        let mut bars2 = bars.clone();
        // dips to the medium EMA and closes above it
        bars2.push((109.5, 110.5, ema_medium, 110.0));
        let series = series_from(&bars2, 2);

        let detector = BandDetector::new(BandConfig {
            pullback_tolerance_pct: 1.0,
            ..BandConfig::default()
        });
        let found = detector.detect(&series, 10);
        assert!(
            found.iter().any(|p| p.pattern_id == "ema_pullback_long"),
            "{:?}",
            found.iter().map(|p| &p.pattern_id).collect::<Vec<_>>()
        );
    }
}
