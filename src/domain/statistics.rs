//! Per-pattern performance statistics.
//!
//! Trades are grouped by `(pattern_id, direction)`. Groups smaller than the
//! minimum sample size are dropped from the output entirely.
//!
//! Sentinels:
//! - profit factor with wins and no losses: `profit_factor_cap`
//! - profit factor with neither wins nor losses: 0
//! - averages over an empty subset: 0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::indicator::stddev::mean_and_stddev;
use crate::domain::pattern::Direction;
use crate::domain::simulator::{Outcome, SimulatedTrade};

/// Stop suggestion is this multiple of the average adverse excursion.
pub const OPTIMAL_STOP_MAE_MULT: f64 = 1.1;
/// Target suggestion is this multiple of the average favorable excursion.
pub const OPTIMAL_TARGET_MFE_MULT: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsConfig {
    pub min_sample_size: usize,
    /// Sample size at which confidence reaches 100.
    pub confidence_full_sample: usize,
    pub profit_factor_cap: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        StatisticsConfig {
            min_sample_size: 5,
            confidence_full_sample: 30,
            profit_factor_cap: 999.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStatistics {
    pub pattern_id: String,
    pub direction: Direction,
    pub sample_size: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    /// wins / sample_size, 0 to 1.
    pub win_rate: f64,
    pub avg_win: f64,
    /// Mean size of losing trades, as a positive number.
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub total_pnl: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_mfe: f64,
    pub avg_mae: f64,
    pub optimal_stop_points: f64,
    pub optimal_target_points: f64,
    pub avg_hold_bars: f64,
    pub pnl_stddev: f64,
    /// 0 to 100.
    pub confidence: f64,
}

impl PatternStatistics {
    pub fn is_profitable(&self) -> bool {
        self.expectancy > 0.0 && self.profit_factor > 1.0
    }
}

/// Gross wins over absolute gross losses, with the sentinel rules above.
pub fn profit_factor(gross_win: f64, gross_loss: f64, cap: f64) -> f64 {
    let gross_loss = gross_loss.abs();
    if gross_loss > 0.0 {
        (gross_win / gross_loss).min(cap)
    } else if gross_win > 0.0 {
        cap
    } else {
        0.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Statistics for one group, without the sample-size filter.
pub fn summarize(
    pattern_id: &str,
    direction: Direction,
    trades: &[&SimulatedTrade],
    config: &StatisticsConfig,
) -> PatternStatistics {
    let pnls: Vec<f64> = trades.iter().map(|t| t.pnl_currency).collect();
    let wins: Vec<f64> = trades
        .iter()
        .filter(|t| t.outcome == Outcome::Win)
        .map(|t| t.pnl_currency)
        .collect();
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.outcome == Outcome::Loss)
        .map(|t| t.pnl_currency)
        .collect();

    let n = trades.len();
    let gross_win: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().sum();
    let (expectancy, pnl_stddev) = mean_and_stddev(&pnls);
    let avg_mfe = mean(trades.iter().map(|t| t.max_favorable_excursion));
    let avg_mae = mean(trades.iter().map(|t| t.max_adverse_excursion));
    let full = config.confidence_full_sample.max(1) as f64;

    PatternStatistics {
        pattern_id: pattern_id.to_string(),
        direction,
        sample_size: n,
        wins: wins.len(),
        losses: losses.len(),
        breakevens: n - wins.len() - losses.len(),
        win_rate: if n == 0 { 0.0 } else { wins.len() as f64 / n as f64 },
        avg_win: mean(wins.iter().copied()),
        avg_loss: mean(losses.iter().map(|l| l.abs())),
        profit_factor: profit_factor(gross_win, gross_loss, config.profit_factor_cap),
        expectancy,
        total_pnl: pnls.iter().sum(),
        largest_win: wins.iter().copied().fold(0.0, f64::max),
        largest_loss: losses.iter().copied().fold(0.0, f64::min),
        avg_mfe,
        avg_mae,
        optimal_stop_points: avg_mae * OPTIMAL_STOP_MAE_MULT,
        optimal_target_points: avg_mfe * OPTIMAL_TARGET_MFE_MULT,
        avg_hold_bars: mean(trades.iter().map(|t| t.hold_bars as f64)),
        pnl_stddev,
        confidence: (n as f64 / full).min(1.0) * 100.0,
    }
}

/// Group, summarize and filter trades. Output is ordered by `(pattern_id, direction)`.
pub fn aggregate(trades: &[SimulatedTrade], config: &StatisticsConfig) -> Vec<PatternStatistics> {
    let mut groups: BTreeMap<(&str, Direction), Vec<&SimulatedTrade>> = BTreeMap::new();
    for trade in trades {
        groups
            .entry((trade.pattern_id.as_str(), trade.direction))
            .or_default()
            .push(trade);
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() >= config.min_sample_size)
        .map(|((id, direction), group)| summarize(id, direction, &group, config))
        .collect()
}
