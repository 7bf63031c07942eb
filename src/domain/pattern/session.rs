//! Time-of-day patterns.
//!
//! Opening-range breakout: the high/low of the first `opening_range_minutes`
//! of a session define the range; the first later bar to close outside it
//! triggers. Killzone reversal: during a configured hour, a bar that sweeps
//! the prior `sweep_lookback` bars' extreme and closes back inside triggers
//! the opposite way.

use serde::Serialize;

use super::{
    AnalysisSeries, Direction, PatternCategory, PatternDetector, PatternInstance, RiskMultipliers,
};
use crate::domain::ohlcv::Candle;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub opening_range: bool,
    pub opening_range_minutes: u32,
    pub killzone_hours: Vec<u32>,
    pub sweep_lookback: usize,
    pub breakout_risk: RiskMultipliers,
    pub reversal_risk: RiskMultipliers,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            opening_range: true,
            opening_range_minutes: 30,
            killzone_hours: vec![10, 14],
            sweep_lookback: 10,
            breakout_risk: RiskMultipliers::new(1.0, 2.0),
            reversal_risk: RiskMultipliers::new(1.0, 1.5),
        }
    }
}

/// High and low of a session's opening range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningRange {
    pub high: f64,
    pub low: f64,
    /// Index of the first bar after the range.
    pub end: usize,
}

/// Opening range of the session starting at `start`, if it closed before `index`.
pub fn opening_range(
    candles: &[Candle],
    start: usize,
    index: usize,
    minutes: u32,
) -> Option<OpeningRange> {
    let open_minute = candles.get(start)?.minute_of_day();
    let cutoff = open_minute + minutes;
    let end = (start..=index)
        .find(|&j| candles[j].minute_of_day() >= cutoff)?;
    if end == start {
        return None;
    }
    let range = &candles[start..end];
    let high = range.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = range.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    Some(OpeningRange { high, low, end })
}

#[derive(Debug, Clone)]
pub struct SessionDetector {
    config: SessionConfig,
}

impl SessionDetector {
    pub fn new(config: SessionConfig) -> Self {
        SessionDetector { config }
    }

    fn breakout(&self, series: &AnalysisSeries, index: usize) -> Option<PatternInstance> {
        let candles = series.candles();
        let start = series.session_start(index)?;
        let range = opening_range(candles, start, index, self.config.opening_range_minutes)?;
        if index < range.end {
            return None;
        }

        let outside = |c: &Candle| -> Option<Direction> {
            if c.close > range.high {
                Some(Direction::Long)
            } else if c.close < range.low {
                Some(Direction::Short)
            } else {
                None
            }
        };
        let direction = outside(&candles[index])?;
        // only the first close outside the range in each session
        if candles[range.end..index].iter().any(|c| outside(c).is_some()) {
            return None;
        }

        let id = format!("opening_range_breakout_{}", direction.as_str().to_ascii_lowercase());
        PatternInstance::at_trigger(
            series,
            id,
            PatternCategory::Session,
            direction,
            index,
            self.config.breakout_risk,
        )
        .map(|p| {
            p.with_context("range_high", range.high)
                .with_context("range_low", range.low)
        })
    }

    fn killzone(&self, series: &AnalysisSeries, index: usize) -> Option<PatternInstance> {
        let candles = series.candles();
        let candle = &candles[index];
        if !self.config.killzone_hours.contains(&candle.hour_of_day) {
            return None;
        }
        let n = self.config.sweep_lookback;
        if n == 0 || index < n {
            return None;
        }
        let prior = &candles[index - n..index];
        let prior_high = prior.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let prior_low = prior.iter().map(|c| c.low).fold(f64::MAX, f64::min);

        let direction = if candle.low < prior_low && candle.close > prior_low {
            Direction::Long
        } else if candle.high > prior_high && candle.close < prior_high {
            Direction::Short
        } else {
            return None;
        };

        let id = format!("killzone_{:02}h_reversal", candle.hour_of_day);
        PatternInstance::at_trigger(
            series,
            id,
            PatternCategory::Session,
            direction,
            index,
            self.config.reversal_risk,
        )
        .map(|p| {
            p.with_context("swept_high", prior_high)
                .with_context("swept_low", prior_low)
        })
    }
}

impl PatternDetector for SessionDetector {
    fn name(&self) -> &'static str {
        "session"
    }

    fn detect(&self, series: &AnalysisSeries, index: usize) -> Vec<PatternInstance> {
        let mut found = Vec::new();
        if self.config.opening_range {
            found.extend(self.breakout(series, index));
        }
        found.extend(self.killzone(series, index));
        found
    }
}
