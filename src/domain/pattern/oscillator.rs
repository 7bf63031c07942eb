//! RSI extreme patterns.
//!
//! The extreme is read on the bar before the trigger; the trigger bar must
//! close in the reversal direction. The long simple moving average decides
//! whether the reversal trades with or against the trend.

use serde::Serialize;

use super::{
    AnalysisSeries, Direction, PatternCategory, PatternDetector, PatternInstance, RiskMultipliers,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RsiVariant {
    Short,
    Long,
}

impl RsiVariant {
    fn label(self) -> &'static str {
        match self {
            RsiVariant::Short => "short",
            RsiVariant::Long => "long",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OscillatorConfig {
    pub oversold: f64,
    pub overbought: f64,
    pub variants: Vec<RsiVariant>,
    pub risk: RiskMultipliers,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        OscillatorConfig {
            oversold: 30.0,
            overbought: 70.0,
            variants: vec![RsiVariant::Short, RsiVariant::Long],
            risk: RiskMultipliers::new(1.5, 2.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OscillatorDetector {
    config: OscillatorConfig,
}

impl OscillatorDetector {
    pub fn new(config: OscillatorConfig) -> Self {
        OscillatorDetector { config }
    }
}

impl PatternDetector for OscillatorDetector {
    fn name(&self) -> &'static str {
        "oscillator"
    }

    fn detect(&self, series: &AnalysisSeries, index: usize) -> Vec<PatternInstance> {
        let mut found = Vec::new();
        let Some(prev_index) = index.checked_sub(1) else {
            return found;
        };
        let (Some(prev_frame), Some(frame)) = (series.frame(prev_index), series.frame(index)) else {
            return found;
        };
        let candles = series.candles();
        let close = candles[index].close;
        let prev_close = candles[prev_index].close;

        for &variant in &self.config.variants {
            let rsi = match variant {
                RsiVariant::Short => prev_frame.rsi_short,
                RsiVariant::Long => prev_frame.rsi_long,
            };

            let (direction, extreme) = if rsi < self.config.oversold && close > prev_close {
                (Direction::Long, "oversold")
            } else if rsi > self.config.overbought && close < prev_close {
                (Direction::Short, "overbought")
            } else {
                continue;
            };

            let with_trend = match direction {
                Direction::Long => close > frame.sma_long,
                Direction::Short => close < frame.sma_long,
            };
            let trend = if with_trend { "with_trend" } else { "counter_trend" };
            let id = format!("rsi_{}_{}_{}", variant.label(), extreme, trend);

            if let Some(instance) = PatternInstance::at_trigger(
                series,
                id,
                PatternCategory::Oscillator,
                direction,
                index,
                self.config.risk,
            ) {
                found.push(
                    instance
                        .with_context("rsi", rsi)
                        .with_context("trend_filter", frame.sma_long),
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

    fn falling_then_bounce() -> Vec<(f64, f64, f64, f64)> {
        let mut bars = flat_bars(4, 110.0);
        for i in 0..6 {
            let c = 108.0 - i as f64 * 2.0;
            bars.push((c + 2.0, c + 2.5, c - 0.5, c));
        }
        bars.push((98.0, 100.5, 97.5, 100.0));
        bars
    }

    #[test]
    fn oversold_bounce_is_long_counter_trend() {
        let series = series_from(&falling_then_bounce(), 2);
        let detector = OscillatorDetector::new(OscillatorConfig::default());
        let found = detector.detect(&series, 10);

        let ids: Vec<&str> = found.iter().map(|p| p.pattern_id.as_str()).collect();
        assert!(ids.contains(&"rsi_short_oversold_counter_trend"), "{:?}", ids);
        assert!(found.iter().all(|p| p.direction == Direction::Long));
        assert!(found.iter().all(|p| p.levels_consistent()));
        assert!(found.iter().all(|p| p.trigger_index == 10));
    }

    #[test]
    fn no_signal_without_confirmation() {
        let mut bars = falling_then_bounce();
        bars.pop();
        bars.push((98.0, 98.5, 95.5, 96.0));
        let series = series_from(&bars, 2);
        let detector = OscillatorDetector::new(OscillatorConfig::default());
        assert!(detector.detect(&series, 10).is_empty());
    }

    #[test]
    fn variants_can_be_restricted() {
        let series = series_from(&falling_then_bounce(), 2);
        let detector = OscillatorDetector::new(OscillatorConfig {
            variants: vec![RsiVariant::Long],
            ..OscillatorConfig::default()
        });
        let found = detector.detect(&series, 10);
        assert!(found.iter().all(|p| p.pattern_id.starts_with("rsi_long_")));
    }
}
