//! Tunable pattern generators and the registry the optimizer draws from.

use std::collections::BTreeMap;

use crate::domain::optimizer::{ParameterGrid, ParameterSet};
use crate::domain::pattern::band::{BandConfig, BandDetector};
use crate::domain::pattern::candlestick::{CandlestickConfig, CandlestickDetector};
use crate::domain::pattern::crossover::{CrossoverConfig, CrossoverDetector};
use crate::domain::pattern::oscillator::{OscillatorConfig, OscillatorDetector, RsiVariant};
use crate::domain::pattern::session::{SessionConfig, SessionDetector};
use crate::domain::pattern::support_resistance::{
    SupportResistanceConfig, SupportResistanceDetector,
};
use crate::domain::pattern::{AnalysisSeries, PatternDetector, PatternInstance, RiskMultipliers};

pub const STOP_ATR_MULT: &str = "stop_atr_mult";
pub const TARGET_ATR_MULT: &str = "target_atr_mult";

/// A parameterized pattern source.
pub trait PatternGenerator: Send + Sync {
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn default_grid(&self) -> ParameterGrid;

    /// First pattern triggered at `index` under `params`, if any.
    fn generate(
        &self,
        series: &AnalysisSeries,
        index: usize,
        params: &ParameterSet,
    ) -> Option<PatternInstance>;

    /// Every pattern triggered in `[start, end)`, skipping the warm-up.
    fn generate_range(
        &self,
        series: &AnalysisSeries,
        start: usize,
        end: usize,
        params: &ParameterSet,
    ) -> Vec<PatternInstance> {
        let end = end.min(series.len());
        (start.max(series.warmup())..end)
            .filter_map(|i| self.generate(series, i, params))
            .collect()
    }
}

/// A generator backed by one of the detector families.
pub struct DetectorStrategy {
    id: &'static str,
    description: &'static str,
    grid: fn() -> ParameterGrid,
    build: fn(&ParameterSet) -> Box<dyn PatternDetector>,
}

impl DetectorStrategy {
    pub fn new(
        id: &'static str,
        description: &'static str,
        grid: fn() -> ParameterGrid,
        build: fn(&ParameterSet) -> Box<dyn PatternDetector>,
    ) -> Self {
        DetectorStrategy {
            id,
            description,
            grid,
            build,
        }
    }
}

impl PatternGenerator for DetectorStrategy {
    fn id(&self) -> &'static str {
        self.id
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn default_grid(&self) -> ParameterGrid {
        (self.grid)()
    }

    fn generate(
        &self,
        series: &AnalysisSeries,
        index: usize,
        params: &ParameterSet,
    ) -> Option<PatternInstance> {
        (self.build)(params).detect(series, index).into_iter().next()
    }

    fn generate_range(
        &self,
        series: &AnalysisSeries,
        start: usize,
        end: usize,
        params: &ParameterSet,
    ) -> Vec<PatternInstance> {
        let detector = (self.build)(params);
        let end = end.min(series.len());
        (start.max(series.warmup())..end)
            .filter_map(|i| detector.detect(series, i).into_iter().next())
            .collect()
    }
}

fn risk(params: &ParameterSet, stop: f64, target: f64) -> RiskMultipliers {
    RiskMultipliers::new(params.get(STOP_ATR_MULT, stop), params.get(TARGET_ATR_MULT, target))
}

fn risk_grid() -> ParameterGrid {
    ParameterGrid::new()
        .with(STOP_ATR_MULT, &[1.0, 1.5, 2.0])
        .with(TARGET_ATR_MULT, &[1.5, 2.0, 3.0])
}

fn rsi_reversal(params: &ParameterSet) -> Box<dyn PatternDetector> {
    let defaults = OscillatorConfig::default();
    Box::new(OscillatorDetector::new(OscillatorConfig {
        oversold: params.get("oversold", defaults.oversold),
        overbought: params.get("overbought", defaults.overbought),
        variants: vec![RsiVariant::Long],
        risk: risk(params, defaults.risk.stop_atr, defaults.risk.target_atr),
    }))
}

fn crossover(params: &ParameterSet, macd: bool) -> Box<dyn PatternDetector> {
    let defaults = CrossoverConfig::default();
    Box::new(CrossoverDetector::new(CrossoverConfig {
        macd,
        ema: !macd,
        risk: risk(params, defaults.risk.stop_atr, defaults.risk.target_atr),
        ..defaults
    }))
}

fn bollinger_fade(params: &ParameterSet) -> Box<dyn PatternDetector> {
    let defaults = BandConfig::default();
    Box::new(BandDetector::new(BandConfig {
        bollinger_rejection: true,
        vwap_rejection: false,
        vwap_pullback: false,
        ema_pullback: false,
        rejection_risk: risk(
            params,
            defaults.rejection_risk.stop_atr,
            defaults.rejection_risk.target_atr,
        ),
        ..defaults
    }))
}

fn vwap_pullback(params: &ParameterSet) -> Box<dyn PatternDetector> {
    let defaults = BandConfig::default();
    Box::new(BandDetector::new(BandConfig {
        bollinger_rejection: false,
        vwap_rejection: false,
        vwap_pullback: true,
        ema_pullback: false,
        pullback_tolerance_pct: params.get("tolerance_pct", defaults.pullback_tolerance_pct),
        pullback_risk: risk(
            params,
            defaults.pullback_risk.stop_atr,
            defaults.pullback_risk.target_atr,
        ),
        ..defaults
    }))
}

fn opening_range_breakout(params: &ParameterSet) -> Box<dyn PatternDetector> {
    let defaults = SessionConfig::default();
    let minutes = params.get("opening_range_minutes", defaults.opening_range_minutes as f64);
    Box::new(SessionDetector::new(SessionConfig {
        opening_range: true,
        opening_range_minutes: minutes.max(1.0).round() as u32,
        killzone_hours: Vec::new(),
        breakout_risk: risk(
            params,
            defaults.breakout_risk.stop_atr,
            defaults.breakout_risk.target_atr,
        ),
        ..defaults
    }))
}

fn candlestick_reversal(params: &ParameterSet) -> Box<dyn PatternDetector> {
    let defaults = CandlestickConfig::default();
    Box::new(CandlestickDetector::new(CandlestickConfig {
        min_weight: params.get("min_weight", defaults.min_weight),
        risk: risk(params, defaults.risk.stop_atr, defaults.risk.target_atr),
        ..defaults
    }))
}

fn support_resistance(params: &ParameterSet) -> Box<dyn PatternDetector> {
    let defaults = SupportResistanceConfig::default();
    let touches = params.get("min_touches", defaults.min_touches as f64);
    Box::new(SupportResistanceDetector::new(SupportResistanceConfig {
        zone_width_pct: params.get("zone_width_pct", defaults.zone_width_pct),
        min_touches: touches.max(1.0).round() as usize,
        risk: risk(params, defaults.risk.stop_atr, defaults.risk.target_atr),
        ..defaults
    }))
}

/// Generators by id, iterated in id order.
#[derive(Default)]
pub struct StrategyRegistry {
    generators: BTreeMap<&'static str, Box<dyn PatternGenerator>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DetectorStrategy::new(
            "rsi_reversal",
            "Long RSI leaves oversold/overbought and the close confirms",
            || {
                risk_grid()
                    .with("oversold", &[20.0, 25.0, 30.0])
                    .with("overbought", &[70.0, 75.0, 80.0])
            },
            rsi_reversal,
        )));
        registry.register(Box::new(DetectorStrategy::new(
            "macd_cross",
            "MACD histogram crosses zero with the long-EMA trend",
            || {
                ParameterGrid::new()
                    .with(STOP_ATR_MULT, &[1.0, 1.5, 2.0])
                    .with(TARGET_ATR_MULT, &[2.0, 2.5, 3.0])
            },
            |p| crossover(p, true),
        )));
        registry.register(Box::new(DetectorStrategy::new(
            "ema_cross",
            "Short EMA crosses the medium EMA with the long-EMA trend",
            || {
                ParameterGrid::new()
                    .with(STOP_ATR_MULT, &[1.0, 1.5, 2.0])
                    .with(TARGET_ATR_MULT, &[2.0, 2.5, 3.0])
            },
            |p| crossover(p, false),
        )));
        registry.register(Box::new(DetectorStrategy::new(
            "bollinger_fade",
            "Fade a close back inside the Bollinger bands",
            risk_grid,
            bollinger_fade,
        )));
        registry.register(Box::new(DetectorStrategy::new(
            "vwap_pullback",
            "Trend pullback that holds the session VWAP",
            || risk_grid().with("tolerance_pct", &[0.05, 0.1, 0.2]),
            vwap_pullback,
        )));
        registry.register(Box::new(DetectorStrategy::new(
            "opening_range_breakout",
            "First close outside the session opening range",
            || risk_grid().with("opening_range_minutes", &[15.0, 30.0, 60.0]),
            opening_range_breakout,
        )));
        registry.register(Box::new(DetectorStrategy::new(
            "candlestick_reversal",
            "Weighted candlestick reversal formations",
            || risk_grid().with("min_weight", &[50.0, 60.0, 70.0]),
            candlestick_reversal,
        )));
        registry.register(Box::new(DetectorStrategy::new(
            "support_resistance",
            "Bounces, rejections and breaks of clustered swing levels",
            || {
                risk_grid()
                    .with("zone_width_pct", &[0.3, 0.5, 1.0])
                    .with("min_touches", &[2.0, 3.0])
            },
            support_resistance,
        )));
        registry
    }

    /// Adds `generator`, replacing any existing one with the same id.
    pub fn register(&mut self, generator: Box<dyn PatternGenerator>) {
        self.generators.insert(generator.id(), generator);
    }

    pub fn get(&self, id: &str) -> Option<&dyn PatternGenerator> {
        self.generators.get(id).map(|g| g.as_ref())
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.generators.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn PatternGenerator> {
        self.generators.values().map(|g| g.as_ref())
    }
}
