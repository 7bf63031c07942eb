//! MACD histogram and EMA crossovers, gated by the long EMA.

use serde::Serialize;

use super::{
    AnalysisSeries, Direction, PatternCategory, PatternDetector, PatternInstance, RiskMultipliers,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossoverConfig {
    pub macd: bool,
    pub ema: bool,
    /// Require the close on the trade side of the long EMA.
    pub trend_gate: bool,
    pub risk: RiskMultipliers,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        CrossoverConfig {
            macd: true,
            ema: true,
            trend_gate: true,
            risk: RiskMultipliers::new(1.5, 2.5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrossoverDetector {
    config: CrossoverConfig,
}

impl CrossoverDetector {
    pub fn new(config: CrossoverConfig) -> Self {
        CrossoverDetector { config }
    }
}

/// Sign change of `a - b` between two bars.
fn cross(prev_a: f64, prev_b: f64, a: f64, b: f64) -> Option<Direction> {
    if prev_a <= prev_b && a > b {
        Some(Direction::Long)
    } else if prev_a >= prev_b && a < b {
        Some(Direction::Short)
    } else {
        None
    }
}

impl PatternDetector for CrossoverDetector {
    fn name(&self) -> &'static str {
        "crossover"
    }

    fn detect(&self, series: &AnalysisSeries, index: usize) -> Vec<PatternInstance> {
        let mut found = Vec::new();
        let Some(prev_index) = index.checked_sub(1) else {
            return found;
        };
        let (Some(prev), Some(frame)) = (series.frame(prev_index), series.frame(index)) else {
            return found;
        };
        let close = series.candles()[index].close;
        let trend_ok = |direction: Direction| {
            !self.config.trend_gate
                || match direction {
                    Direction::Long => close > frame.ema_long,
                    Direction::Short => close < frame.ema_long,
                }
        };

        let mut candidates = Vec::new();
        if self.config.macd {
            if let Some(direction) = cross(prev.macd_histogram, 0.0, frame.macd_histogram, 0.0) {
                candidates.push(("macd", direction, frame.macd_histogram));
            }
        }
        if self.config.ema {
            if let Some(direction) =
                cross(prev.ema_short, prev.ema_medium, frame.ema_short, frame.ema_medium)
            {
                candidates.push(("ema", direction, frame.ema_short - frame.ema_medium));
            }
        }

        for (kind, direction, spread) in candidates {
            if !trend_ok(direction) {
                continue;
            }
            let side = match direction {
                Direction::Long => "bullish",
                Direction::Short => "bearish",
            };
            let id = format!("{}_{}_cross", kind, side);
            if let Some(instance) = PatternInstance::at_trigger(
                series,
                id,
                PatternCategory::Crossover,
                direction,
                index,
                self.config.risk,
            ) {
                found.push(
                    instance
                        .with_context("spread", spread)
                        .with_context("trend_ema", frame.ema_long),
                );
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::test_support::*;

    #[test]
    fn cross_detects_sign_change() {
        assert_eq!(cross(-1.0, 0.0, 1.0, 0.0), Some(Direction::Long));
        assert_eq!(cross(1.0, 0.0, -1.0, 0.0), Some(Direction::Short));
        assert_eq!(cross(1.0, 0.0, 2.0, 0.0), None);
    }

    /// Accelerating sell-off followed by a steady rally.
    fn v_shaped_bars() -> Vec<(f64, f64, f64, f64)> {
        let mut bars = Vec::new();
        for i in 0..8 {
            let c = 110.0 - (i * i) as f64 * 0.5;
            bars.push((c + 1.0, c + 1.5, c - 0.5, c));
        }
        for i in 1..=6 {
            let c = 85.5 + i as f64 * 4.0;
            bars.push((c - 3.0, c + 0.5, c - 3.5, c));
        }
        bars
    }

    fn all_instances(
        detector: &CrossoverDetector,
        series: &AnalysisSeries,
    ) -> Vec<PatternInstance> {
        (0..series.len())
            .flat_map(|i| detector.detect(series, i))
            .collect()
    }

    #[test]
    fn v_shaped_recovery_crosses_bullish() {
        let series = series_from(&v_shaped_bars(), 2);
        let detector = CrossoverDetector::new(CrossoverConfig {
            trend_gate: false,
            ..CrossoverConfig::default()
        });

        let found = all_instances(&detector, &series);
        assert!(found.iter().any(|p| p.pattern_id == "ema_bullish_cross"));
        assert!(found.iter().any(|p| p.pattern_id == "macd_bullish_cross"));
        assert!(found
            .iter()
            .all(|p| p.direction == Direction::Long && p.levels_consistent()));
    }

    #[test]
    fn trend_gate_blocks_cross_below_long_ema() {
        let series = series_from(&v_shaped_bars(), 2);
        let gated = all_instances(&CrossoverDetector::new(CrossoverConfig::default()), &series);

        // the histogram turns while price is still under the long EMA
        assert!(!gated.iter().any(|p| p.pattern_id == "macd_bullish_cross"));
        for p in &gated {
            assert!(p.entry_price > series.frame(p.trigger_index).unwrap().ema_long);
        }
    }
}
