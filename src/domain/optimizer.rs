//! Walk-forward parameter optimization.
//!
//! 1. Split the series chronologically at `train_fraction`: the training slice
//!    is `[warmup, split)`, the test slice `[split, len)`.
//! 2. Enumerate the grid lazily and evaluate every combination on the
//!    training slice in parallel. Trades never see bars past their slice.
//! 3. Rank by `profit_factor × sharpe`, ties broken by combination order.
//! 4. Re-run the best combination on the test slice; only that result drives
//!    the [`Recommendation`].

use std::collections::BTreeMap;
use std::ops::Range;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::error::EdgefinderError;
use crate::domain::indicator::stddev::mean_and_stddev;
use crate::domain::pattern::AnalysisSeries;
use crate::domain::simulator::{simulate_all, SimulatedTrade, SimulationConfig};
use crate::domain::statistics::profit_factor;
use crate::domain::strategy::PatternGenerator;

/// One concrete value per tunable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterSet(BTreeMap<String, f64>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    /// Value of `name`, or `default` when the grid does not tune it.
    pub fn get(&self, name: &str, default: f64) -> f64 {
        self.0.get(name).copied().unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl std::fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Candidate values per tunable, ordered by tunable name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterGrid(BTreeMap<String, Vec<f64>>);

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, candidates: &[f64]) -> Self {
        self.insert(name, candidates.to_vec());
        self
    }

    pub fn insert(&mut self, name: &str, candidates: Vec<f64>) {
        self.0.insert(name.to_string(), candidates);
    }

    pub fn tunables(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    /// Reject grids that cannot produce a meaningful search.
    pub fn validate(&self) -> Result<(), EdgefinderError> {
        if self.0.is_empty() {
            return Err(EdgefinderError::GridInvalid {
                reason: "grid has no tunables".into(),
            });
        }
        let mut total: usize = 1;
        for (name, candidates) in &self.0 {
            if candidates.is_empty() {
                return Err(EdgefinderError::EmptyCandidates {
                    tunable: name.clone(),
                });
            }
            if let Some(bad) = candidates.iter().find(|v| !v.is_finite()) {
                return Err(EdgefinderError::GridInvalid {
                    reason: format!("'{}' has non-finite candidate {}", name, bad),
                });
            }
            total = total.checked_mul(candidates.len()).ok_or_else(|| EdgefinderError::GridInvalid {
                reason: "too many combinations".into(),
            })?;
        }
        Ok(())
    }

    /// Number of combinations (product of candidate counts).
    pub fn len(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.values().map(|c| c.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily enumerate the Cartesian product, last tunable varying fastest.
    pub fn combinations(&self) -> Combinations<'_> {
        Combinations {
            names: self.0.keys().map(|k| k.as_str()).collect(),
            candidates: self.0.values().map(|v| v.as_slice()).collect(),
            cursor: vec![0; self.0.len()],
            remaining: self.len(),
        }
    }
}

/// Odometer over a [`ParameterGrid`].
#[derive(Debug, Clone)]
pub struct Combinations<'a> {
    names: Vec<&'a str>,
    candidates: Vec<&'a [f64]>,
    cursor: Vec<usize>,
    remaining: usize,
}

impl Iterator for Combinations<'_> {
    type Item = ParameterSet;

    fn next(&mut self) -> Option<ParameterSet> {
        if self.remaining == 0 {
            return None;
        }
        let mut set = ParameterSet::new();
        for (k, name) in self.names.iter().enumerate() {
            set.insert(name, self.candidates[k][self.cursor[k]]);
        }

        self.remaining -= 1;
        for k in (0..self.cursor.len()).rev() {
            self.cursor[k] += 1;
            if self.cursor[k] < self.candidates[k].len() {
                break;
            }
            self.cursor[k] = 0;
        }
        Some(set)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Combinations<'_> {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkForwardConfig {
    pub train_fraction: f64,
    pub top_n: usize,
    /// Annualization constant for the Sharpe-like ratio.
    pub bars_per_year: f64,
    pub min_profit_factor: f64,
    pub min_win_rate: f64,
    pub caution_profit_factor: f64,
    pub profit_factor_cap: f64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        WalkForwardConfig {
            train_fraction: 0.8,
            top_n: 10,
            bars_per_year: 19_656.0,
            min_profit_factor: 1.3,
            min_win_rate: 0.5,
            caution_profit_factor: 1.0,
            profit_factor_cap: 999.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub total_pnl: f64,
    pub sharpe: f64,
    pub score: f64,
}

impl EvaluationMetrics {
    pub fn from_trades(trades: &[SimulatedTrade], config: &WalkForwardConfig) -> Self {
        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl_currency).collect();
        let gross_win: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
        let gross_loss: f64 = pnls.iter().filter(|p| **p < 0.0).sum();
        let wins = pnls.iter().filter(|p| **p > 0.0).count();
        let (mean, std) = mean_and_stddev(&pnls);
        let pf = profit_factor(gross_win, gross_loss, config.profit_factor_cap);

        let n = trades.len();
        let mean_hold = if n == 0 {
            0.0
        } else {
            trades.iter().map(|t| t.hold_bars as f64).sum::<f64>() / n as f64
        };
        let sharpe = if n < 2 || std <= 0.0 || mean_hold <= 0.0 {
            0.0
        } else {
            mean / std * (config.bars_per_year / mean_hold).sqrt()
        };

        EvaluationMetrics {
            trades: n,
            win_rate: if n == 0 { 0.0 } else { wins as f64 / n as f64 },
            profit_factor: pf,
            expectancy: mean,
            total_pnl: pnls.iter().sum(),
            sharpe,
            // -0.0 would sort apart from 0.0 under total_cmp
            score: pf * sharpe + 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Recommended,
    UseWithCaution,
    DoNotUse,
}

impl Recommendation {
    pub fn from_test(metrics: &EvaluationMetrics, config: &WalkForwardConfig) -> Self {
        if metrics.profit_factor >= config.min_profit_factor
            && metrics.win_rate >= config.min_win_rate
        {
            Recommendation::Recommended
        } else if metrics.profit_factor >= config.caution_profit_factor {
            Recommendation::UseWithCaution
        } else {
            Recommendation::DoNotUse
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedParameterSet {
    /// Position of the combination in grid enumeration order.
    pub ordinal: usize,
    pub params: ParameterSet,
    pub metrics: EvaluationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkForwardResult {
    pub strategy_id: String,
    pub best_params: ParameterSet,
    /// Best `top_n` training results, best first.
    pub train_ranking: Vec<RankedParameterSet>,
    /// Out-of-sample evaluation of `best_params`.
    pub test_result: EvaluationMetrics,
    pub recommendation: Recommendation,
    pub train_range: (usize, usize),
    pub test_range: (usize, usize),
    pub combinations_evaluated: usize,
}

/// Simulated trades of `generator` with `params` triggered and closed inside `range`.
pub fn evaluate_slice(
    series: &AnalysisSeries,
    generator: &dyn PatternGenerator,
    params: &ParameterSet,
    range: Range<usize>,
    simulation: &SimulationConfig,
) -> Vec<SimulatedTrade> {
    let instances = generator.generate_range(series, range.start, range.end, params);
    simulate_all(&instances, series.candles(), range.end, simulation)
}

/// Chronological split point and slice bounds for a series.
pub fn split_ranges(
    series: &AnalysisSeries,
    train_fraction: f64,
) -> Result<(Range<usize>, Range<usize>), EdgefinderError> {
    let len = series.len();
    let warmup = series.warmup();
    let split = (len as f64 * train_fraction).floor() as usize;
    if split <= warmup + 1 || split >= len {
        let minimum = ((warmup + 2) as f64 / train_fraction).ceil() as usize + 1;
        return Err(EdgefinderError::InsufficientData { bars: len, minimum });
    }
    Ok((warmup..split, split..len))
}

pub fn walk_forward(
    series: &AnalysisSeries,
    generator: &dyn PatternGenerator,
    grid: &ParameterGrid,
    config: &WalkForwardConfig,
    simulation: &SimulationConfig,
) -> Result<WalkForwardResult, EdgefinderError> {
    grid.validate()?;
    let (train, test) = split_ranges(series, config.train_fraction)?;
    let total = grid.len();
    info!(
        strategy = generator.id(),
        combinations = total,
        train_bars = train.len(),
        test_bars = test.len(),
        "starting walk-forward search"
    );

    let mut ranking: Vec<RankedParameterSet> = grid
        .combinations()
        .enumerate()
        .par_bridge()
        .map(|(ordinal, params)| {
            let trades = evaluate_slice(series, generator, &params, train.clone(), simulation);
            let metrics = EvaluationMetrics::from_trades(&trades, config);
            RankedParameterSet {
                ordinal,
                params,
                metrics,
            }
        })
        .collect();

    ranking.sort_by(|a, b| {
        b.metrics
            .score
            .total_cmp(&a.metrics.score)
            .then(a.ordinal.cmp(&b.ordinal))
    });

    let best = ranking.first().ok_or_else(|| EdgefinderError::GridInvalid {
        reason: "grid produced no combinations".into(),
    })?;
    let best_params = best.params.clone();
    debug!(params = %best_params, score = best.metrics.score, "best training combination");

    let test_trades = evaluate_slice(series, generator, &best_params, test.clone(), simulation);
    let test_result = EvaluationMetrics::from_trades(&test_trades, config);
    let recommendation = Recommendation::from_test(&test_result, config);
    info!(
        strategy = generator.id(),
        test_trades = test_result.trades,
        test_profit_factor = test_result.profit_factor,
        ?recommendation,
        "walk-forward complete"
    );

    ranking.truncate(config.top_n.max(1));
    Ok(WalkForwardResult {
        strategy_id: generator.id().to_string(),
        best_params,
        train_ranking: ranking,
        test_result,
        recommendation,
        train_range: (train.start, train.end),
        test_range: (test.start, test.end),
        combinations_evaluated: total,
    })
}
