//! Scan and optimize entry points over a data provider and an optional store.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::error::EdgefinderError;
use crate::domain::indicator::frame::IndicatorSettings;
use crate::domain::ohlcv::Candle;
use crate::domain::optimizer::{walk_forward, ParameterGrid, WalkForwardConfig, WalkForwardResult};
use crate::domain::pattern::{
    default_detectors, detect_range, AnalysisSeries, Direction, PatternConfig,
};
use crate::domain::regime::{classify_regime, RegimeAnalysis, RegimeSettings};
use crate::domain::simulator::{simulate_all, SimulationConfig};
use crate::domain::statistics::{aggregate, PatternStatistics, StatisticsConfig};
use crate::domain::strategy::StrategyRegistry;
use crate::ports::data_port::DataPort;
use crate::ports::statistics_store::StatisticsStore;

/// Everything a scan or optimization run needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisConfig {
    pub symbol: String,
    pub interval: String,
    /// Fewer candles than this is reported as insufficient data.
    pub min_bars: usize,
    pub indicators: IndicatorSettings,
    pub regime: RegimeSettings,
    pub patterns: PatternConfig,
    pub simulation: SimulationConfig,
    pub statistics: StatisticsConfig,
    pub walk_forward: WalkForwardConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            symbol: "ES".to_string(),
            interval: "5m".to_string(),
            min_bars: 200,
            indicators: IndicatorSettings::default(),
            regime: RegimeSettings::default(),
            patterns: PatternConfig::default(),
            simulation: SimulationConfig::default(),
            statistics: StatisticsConfig::default(),
            walk_forward: WalkForwardConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Bars a scan needs: `min_bars`, and never fewer than indicator warm-up
    /// plus the regime tail.
    pub fn required_scan_bars(&self) -> usize {
        let regime_tail = self.indicators.warmup_bars() + self.regime.lookback + 1;
        self.min_bars.max(regime_tail)
    }

    /// Bars an optimization needs: `min_bars`, and at least one frame past warm-up.
    pub fn required_optimize_bars(&self) -> usize {
        self.min_bars.max(self.indicators.warmup_bars() + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    /// Number of most recent session dates to analyze.
    pub lookback_days: u32,
    pub store_results: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    /// `None` when the tail is too short to classify.
    pub regime: Option<RegimeAnalysis>,
    pub recommended_patterns: Vec<PatternStatistics>,
    pub counter_trend_patterns: Vec<PatternStatistics>,
    pub all_profitable_patterns: Vec<PatternStatistics>,
    pub bars_analyzed: usize,
    pub patterns_detected: usize,
    pub trades_simulated: usize,
    /// Records written to the store, 0 unless requested.
    pub stored: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeRequest {
    pub strategy_id: String,
    /// Falls back to the strategy's default grid.
    pub parameter_grid: Option<ParameterGrid>,
}

/// Candles from the last `days` distinct session dates.
pub fn last_sessions(candles: Vec<Candle>, days: u32) -> Vec<Candle> {
    let dates: BTreeSet<_> = candles.iter().map(|c| c.session_date).collect();
    let Some(first) = dates.iter().rev().take(days as usize).last().copied() else {
        return Vec::new();
    };
    candles.into_iter().filter(|c| c.session_date >= first).collect()
}

/// Split profitable statistics by the regime's recommended direction.
///
/// With no recommended direction every profitable pattern is recommended and
/// none is counter-trend.
pub fn partition_by_direction(
    profitable: &[PatternStatistics],
    direction: Option<Direction>,
) -> (Vec<PatternStatistics>, Vec<PatternStatistics>) {
    match direction {
        None => (profitable.to_vec(), Vec::new()),
        Some(d) => profitable.iter().cloned().partition(|s| s.direction == d),
    }
}

pub struct ScanService<'a> {
    data: &'a dyn DataPort,
    store: Option<&'a dyn StatisticsStore>,
    config: AnalysisConfig,
    registry: StrategyRegistry,
}

impl<'a> ScanService<'a> {
    pub fn new(
        data: &'a dyn DataPort,
        store: Option<&'a dyn StatisticsStore>,
        config: AnalysisConfig,
    ) -> Self {
        ScanService {
            data,
            store,
            config,
            registry: StrategyRegistry::with_builtins(),
        }
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    fn load_candles(
        &self,
        lookback_days: Option<u32>,
        minimum: usize,
    ) -> Result<Vec<Candle>, EdgefinderError> {
        let candles = self.data.fetch_candles(&self.config.symbol, &self.config.interval)?;
        let fetched = candles.len();
        let candles = match lookback_days {
            Some(days) => last_sessions(candles, days),
            None => candles,
        };
        debug!(fetched, kept = candles.len(), "loaded candles");
        if candles.len() < minimum {
            return Err(EdgefinderError::InsufficientData {
                bars: candles.len(),
                minimum,
            });
        }
        Ok(candles)
    }

    pub fn scan(&self, request: &ScanRequest) -> Result<ScanReport, EdgefinderError> {
        let candles =
            self.load_candles(Some(request.lookback_days), self.config.required_scan_bars())?;
        let series = AnalysisSeries::new(
            candles,
            &self.config.indicators,
            self.config.patterns.swing_window,
        );
        info!(
            symbol = %self.config.symbol,
            bars = series.len(),
            lookback_days = request.lookback_days,
            "scanning for patterns"
        );

        let detectors = default_detectors(&self.config.patterns);
        let instances = detect_range(&detectors, &series, 0, series.len());
        let trades =
            simulate_all(&instances, series.candles(), series.len(), &self.config.simulation);
        let statistics = aggregate(&trades, &self.config.statistics);
        debug!(
            patterns = instances.len(),
            trades = trades.len(),
            groups = statistics.len(),
            "simulation complete"
        );

        let close = series.candles().last().map(|c| c.close).unwrap_or_default();
        let regime = classify_regime(series.frames(), close, &self.config.regime);
        if regime.is_none() {
            warn!("not enough indicator history to classify the regime");
        }

        let stored = match (request.store_results, self.store) {
            (true, Some(store)) => store.upsert_statistics(request.lookback_days, &statistics)?,
            (true, None) => {
                warn!("store requested but no statistics store is configured");
                0
            }
            (false, _) => 0,
        };

        let mut profitable: Vec<PatternStatistics> =
            statistics.into_iter().filter(PatternStatistics::is_profitable).collect();
        profitable.sort_by(|a, b| {
            b.expectancy
                .total_cmp(&a.expectancy)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
                .then(a.direction.cmp(&b.direction))
        });
        let direction = regime.as_ref().and_then(|r| r.recommended_direction);
        let (recommended, counter_trend) = partition_by_direction(&profitable, direction);

        info!(
            regime = ?regime.as_ref().map(|r| r.regime),
            profitable = profitable.len(),
            recommended = recommended.len(),
            "scan complete"
        );
        Ok(ScanReport {
            regime,
            recommended_patterns: recommended,
            counter_trend_patterns: counter_trend,
            all_profitable_patterns: profitable,
            bars_analyzed: series.len(),
            patterns_detected: instances.len(),
            trades_simulated: trades.len(),
            stored,
        })
    }

    /// Profitable statistics from an earlier stored scan.
    pub fn stored_profitable_patterns(
        &self,
        lookback_days: u32,
    ) -> Result<Vec<PatternStatistics>, EdgefinderError> {
        let store = self.store.ok_or_else(|| EdgefinderError::Storage {
            reason: "no statistics store configured".into(),
        })?;
        store.load_profitable(lookback_days)
    }

    pub fn optimize(
        &self,
        request: &OptimizeRequest,
    ) -> Result<WalkForwardResult, EdgefinderError> {
        let generator = self
            .registry
            .get(&request.strategy_id)
            .ok_or_else(|| EdgefinderError::UnknownStrategy {
                id: request.strategy_id.clone(),
            })?;
        let grid = match &request.parameter_grid {
            Some(grid) => grid.clone(),
            None => generator.default_grid(),
        };
        grid.validate()?;

        let candles = self.load_candles(None, self.config.required_optimize_bars())?;
        let series = AnalysisSeries::new(
            candles,
            &self.config.indicators,
            self.config.patterns.swing_window,
        );
        walk_forward(
            &series,
            generator,
            &grid,
            &self.config.walk_forward,
            &self.config.simulation,
        )
    }
}
