//! Pattern detection.
//!
//! A detector inspects an [`AnalysisSeries`] at a single bar index and emits
//! zero or more [`PatternInstance`]s triggered at that index. Detectors only
//! read candles, frames and confirmed swings at or before the index.
//!
//! Families:
//! - [`oscillator`]: RSI extremes with next-bar confirmation
//! - [`crossover`]: MACD histogram and EMA crosses
//! - [`band`]: Bollinger/VWAP rejections and VWAP/EMA pullbacks
//! - [`session`]: opening-range breakouts and killzone reversals
//! - [`candlestick`]: one to three candle geometry
//! - [`chart`]: swing-based reversal and continuation shapes
//! - [`support_resistance`]: clustered swing levels

pub mod band;
pub mod candlestick;
pub mod chart;
pub mod crossover;
pub mod oscillator;
pub mod session;
pub mod support_resistance;
pub mod swing;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::indicator::frame::{compute_frames, IndicatorFrame, IndicatorSettings};
use crate::domain::ohlcv::Candle;
use swing::{find_swing_points, SwingPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Oscillator,
    Crossover,
    Band,
    Session,
    Candlestick,
    Chart,
    SupportResistance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
    Number(f64),
    Text(String),
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        ContextValue::Number(v)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        ContextValue::Text(v.to_string())
    }
}

/// A detected trigger with its proposed trade levels.
///
/// `stop_loss` sits on the losing side of `entry_price` and `take_profit` on
/// the winning side, relative to `direction`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternInstance {
    pub pattern_id: String,
    pub category: PatternCategory,
    pub direction: Direction,
    pub trigger_index: usize,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub context: BTreeMap<String, ContextValue>,
}

/// Stop and target distances in ATR units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskMultipliers {
    pub stop_atr: f64,
    pub target_atr: f64,
}

impl RiskMultipliers {
    pub const fn new(stop_atr: f64, target_atr: f64) -> Self {
        RiskMultipliers {
            stop_atr,
            target_atr,
        }
    }
}

impl PatternInstance {
    /// Build an instance entered at the trigger bar's close with ATR-scaled levels.
    ///
    /// Returns `None` when the ATR or either multiplier is not positive, since
    /// the levels would collapse onto the entry.
    pub fn at_trigger(
        series: &AnalysisSeries,
        pattern_id: impl Into<String>,
        category: PatternCategory,
        direction: Direction,
        index: usize,
        risk: RiskMultipliers,
    ) -> Option<Self> {
        let atr = series.frame(index)?.atr;
        let entry = series.candles().get(index)?.close;
        if !(atr > 0.0 && risk.stop_atr > 0.0 && risk.target_atr > 0.0) {
            return None;
        }
        let sign = direction.sign();
        let mut context = BTreeMap::new();
        context.insert("atr".to_string(), ContextValue::Number(atr));
        Some(PatternInstance {
            pattern_id: pattern_id.into(),
            category,
            direction,
            trigger_index: index,
            entry_price: entry,
            stop_loss: entry - sign * risk.stop_atr * atr,
            take_profit: entry + sign * risk.target_atr * atr,
            context,
        })
    }

    pub fn with_context(mut self, key: &str, value: impl Into<ContextValue>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// Whether stop and target straddle the entry on the correct sides.
    pub fn levels_consistent(&self) -> bool {
        match self.direction {
            Direction::Long => {
                self.stop_loss < self.entry_price && self.entry_price < self.take_profit
            }
            Direction::Short => {
                self.take_profit < self.entry_price && self.entry_price < self.stop_loss
            }
        }
    }
}

/// Candles plus everything derived from them that detectors read.
#[derive(Debug, Clone)]
pub struct AnalysisSeries {
    candles: Vec<Candle>,
    frames: Vec<Option<IndicatorFrame>>,
    swings: Vec<SwingPoint>,
    swing_window: usize,
    session_starts: Vec<usize>,
    warmup: usize,
}

impl AnalysisSeries {
    pub fn new(candles: Vec<Candle>, settings: &IndicatorSettings, swing_window: usize) -> Self {
        let frames = compute_frames(&candles, settings);
        let swings = find_swing_points(&candles, swing_window);
        let mut session_starts = Vec::with_capacity(candles.len());
        for (i, candle) in candles.iter().enumerate() {
            let start = match i.checked_sub(1) {
                Some(prev) if candles[prev].session_date == candle.session_date => {
                    session_starts[prev]
                }
                _ => i,
            };
            session_starts.push(start);
        }
        AnalysisSeries {
            candles,
            frames,
            swings,
            swing_window,
            session_starts,
            warmup: settings.warmup_bars(),
        }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&IndicatorFrame> {
        self.frames.get(index).and_then(|f| f.as_ref())
    }

    pub fn frames(&self) -> &[Option<IndicatorFrame>] {
        &self.frames
    }

    /// First index at which every indicator is defined.
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    pub fn swing_window(&self) -> usize {
        self.swing_window
    }

    /// Swings whose confirming window has fully closed by `index`.
    pub fn confirmed_swings(&self, index: usize) -> &[SwingPoint] {
        let w = self.swing_window;
        let end = self.swings.partition_point(|s| s.index + w <= index);
        &self.swings[..end]
    }

    /// Index of the first candle in the session containing `index`.
    pub fn session_start(&self, index: usize) -> Option<usize> {
        self.session_starts.get(index).copied()
    }
}

pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, series: &AnalysisSeries, index: usize) -> Vec<PatternInstance>;
}

/// Settings for every built-in detector family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternConfig {
    /// Bars on each side a swing high/low must dominate.
    pub swing_window: usize,
    pub oscillator: oscillator::OscillatorConfig,
    pub crossover: crossover::CrossoverConfig,
    pub band: band::BandConfig,
    pub session: session::SessionConfig,
    pub candlestick: candlestick::CandlestickConfig,
    pub chart: chart::ChartConfig,
    pub support_resistance: support_resistance::SupportResistanceConfig,
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig {
            swing_window: 5,
            oscillator: Default::default(),
            crossover: Default::default(),
            band: Default::default(),
            session: Default::default(),
            candlestick: Default::default(),
            chart: Default::default(),
            support_resistance: Default::default(),
        }
    }
}

pub fn default_detectors(config: &PatternConfig) -> Vec<Box<dyn PatternDetector>> {
    vec![
        Box::new(oscillator::OscillatorDetector::new(config.oscillator.clone())),
        Box::new(crossover::CrossoverDetector::new(config.crossover.clone())),
        Box::new(band::BandDetector::new(config.band.clone())),
        Box::new(session::SessionDetector::new(config.session.clone())),
        Box::new(candlestick::CandlestickDetector::new(config.candlestick.clone())),
        Box::new(chart::ChartDetector::new(config.chart.clone())),
        Box::new(support_resistance::SupportResistanceDetector::new(
            config.support_resistance.clone(),
        )),
    ]
}

/// Run every detector at every index in `start..end`, in index then detector order.
pub fn detect_range(
    detectors: &[Box<dyn PatternDetector>],
    series: &AnalysisSeries,
    start: usize,
    end: usize,
) -> Vec<PatternInstance> {
    let end = end.min(series.len());
    let mut instances = Vec::new();
    for index in start.max(series.warmup())..end {
        for detector in detectors {
            instances.extend(detector.detect(series, index));
        }
    }
    instances
}

/// Percent distance of `value` from `reference`.
pub(crate) fn pct_from(value: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        0.0
    } else {
        (value - reference) / reference * 100.0
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDate;

    /// Indicator settings short enough for hand-built series.
    pub fn quick_settings() -> IndicatorSettings {
        IndicatorSettings {
            ema_short: 2,
            ema_medium: 3,
            ema_long: 4,
            sma_long: 4,
            rsi_short: 2,
            rsi_long: 3,
            atr: 2,
            bollinger_period: 3,
            bollinger_k: 2.0,
            vwap_k: 2.0,
            macd_fast: 2,
            macd_slow: 3,
            macd_signal: 2,
        }
    }

    /// Candles one minute apart from 2024-01-02 10:00, built from (open, high, low, close).
    pub fn candles_from(bars: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        bars.iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| {
                Candle::new(start + chrono::Duration::minutes(i as i64), o, h, l, c, 1000.0)
            })
            .collect()
    }

    /// Flat warm-up candles at `price` with a one point range.
    pub fn flat_bars(n: usize, price: f64) -> Vec<(f64, f64, f64, f64)> {
        vec![(price, price + 0.5, price - 0.5, price); n]
    }

    pub fn series_from(bars: &[(f64, f64, f64, f64)], swing_window: usize) -> AnalysisSeries {
        AnalysisSeries::new(candles_from(bars), &quick_settings(), swing_window)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn direction_sign_and_parse() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.sign(), -1.0);
        assert_eq!(Direction::Long.opposite(), Direction::Short);
        assert_eq!("short".parse::<Direction>().unwrap(), Direction::Short);
        assert!("flat".parse::<Direction>().is_err());
    }

    #[test]
    fn instance_levels_scale_with_atr() {
        let series = series_from(&flat_bars(10, 100.0), 2);
        let long = PatternInstance::at_trigger(
            &series,
            "test",
            PatternCategory::Band,
            Direction::Long,
            8,
            RiskMultipliers::new(1.0, 2.0),
        )
        .unwrap();
        let atr = series.frame(8).unwrap().atr;
        assert!((long.stop_loss - (100.0 - atr)).abs() < 1e-9);
        assert!((long.take_profit - (100.0 + 2.0 * atr)).abs() < 1e-9);
        assert!(long.levels_consistent());

        let short = PatternInstance::at_trigger(
            &series,
            "test",
            PatternCategory::Band,
            Direction::Short,
            8,
            RiskMultipliers::new(1.0, 2.0),
        )
        .unwrap();
        assert!(short.levels_consistent());
    }

    #[test]
    fn instance_skipped_without_atr() {
        let series = series_from(&flat_bars(3, 100.0), 2);
        // warm-up not reached
        assert!(PatternInstance::at_trigger(
            &series,
            "test",
            PatternCategory::Band,
            Direction::Long,
            0,
            RiskMultipliers::new(1.0, 2.0),
        )
        .is_none());

        let zero_range = vec![(100.0, 100.0, 100.0, 100.0); 10];
        let series = series_from(&zero_range, 2);
        assert!(PatternInstance::at_trigger(
            &series,
            "test",
            PatternCategory::Band,
            Direction::Long,
            8,
            RiskMultipliers::new(1.0, 2.0),
        )
        .is_none());
    }

    #[test]
    fn session_starts_follow_session_date() {
        let mut candles = candles_from(&flat_bars(3, 100.0));
        let next_day = candles[0].time + chrono::Duration::days(1);
        candles.push(Candle::new(next_day, 100.0, 100.5, 99.5, 100.0, 1000.0));
        let series = AnalysisSeries::new(candles, &quick_settings(), 2);
        assert_eq!(series.session_start(2), Some(0));
        assert_eq!(series.session_start(3), Some(3));
    }

    #[test]
    fn detect_range_skips_warmup() {
        let series = series_from(&flat_bars(20, 100.0), 2);
        let detectors = default_detectors(&PatternConfig::default());
        let instances = detect_range(&detectors, &series, 0, series.len());
        assert!(instances.iter().all(|p| p.trigger_index >= series.warmup()));
    }
}
