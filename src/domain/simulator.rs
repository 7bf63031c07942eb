//! Trade simulation for a single pattern instance.
//!
//! States: `OPEN -> {STOPPED, TARGETED, TIMED_OUT, SESSION_CLOSED}`, all terminal.
//!
//! Starting at the bar after the trigger, each bar is checked in order:
//! 1. A bar from a different session date, or at/after the session close hour,
//!    exits at that bar's open (`SessionEnd`).
//! 2. Otherwise excursions are updated with the bar's high/low and the stop and
//!    target are checked against them. When both are touched in the same bar
//!    the [`TieBreak`] decides which fills; fills happen at the level price.
//! 3. After `max_hold_bars` bars, or at the last available bar, the trade exits
//!    at that bar's close (`Timeout`).
//!
//! PnL is `(exit - entry) × sign × contract_multiplier - round_trip_cost`;
//! sizing is always a single contract.

use serde::{Deserialize, Serialize};

use crate::domain::ohlcv::Candle;
use crate::domain::pattern::{Direction, PatternInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Target,
    Stop,
    Timeout,
    SessionEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Win,
    Loss,
    Breakeven,
}

/// Which level fills when one bar touches both stop and target.
///
/// OHLC bars do not reveal the intrabar path, so this is an assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    StopFirst,
    TargetFirst,
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "stop_first" => Ok(TieBreak::StopFirst),
            "target_first" => Ok(TieBreak::TargetFirst),
            other => Err(format!("expected stop_first or target_first, got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationConfig {
    pub max_hold_bars: usize,
    /// Bars at or after this hour close open trades. 0 disables the check.
    pub session_close_hour: u32,
    pub contract_multiplier: f64,
    pub round_trip_cost: f64,
    pub tie_break: TieBreak,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            max_hold_bars: 24,
            session_close_hour: 16,
            contract_multiplier: 50.0,
            round_trip_cost: 4.0,
            tie_break: TieBreak::StopFirst,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedTrade {
    pub pattern_id: String,
    pub direction: Direction,
    pub trigger_index: usize,
    pub exit_index: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    pub outcome: Outcome,
    pub pnl_points: f64,
    pub pnl_currency: f64,
    /// Best unrealized move in points, never negative.
    pub max_favorable_excursion: f64,
    /// Worst unrealized move in points, never negative.
    pub max_adverse_excursion: f64,
    pub hold_bars: usize,
    pub exit_reason: ExitReason,
}

fn session_over(trigger: &Candle, bar: &Candle, close_hour: u32) -> bool {
    bar.session_date != trigger.session_date || (close_hour > 0 && bar.hour_of_day >= close_hour)
}

/// Simulate `instance` over `candles[trigger + 1 .. end]`.
///
/// Returns `None` when no bar follows the trigger within `end`, or when
/// `max_hold_bars` is zero.
pub fn simulate_trade(
    instance: &PatternInstance,
    candles: &[Candle],
    end: usize,
    config: &SimulationConfig,
) -> Option<SimulatedTrade> {
    let end = end.min(candles.len());
    let trigger = candles.get(instance.trigger_index)?;
    let first = instance.trigger_index + 1;
    if first >= end || config.max_hold_bars == 0 {
        return None;
    }
    let last = (instance.trigger_index + config.max_hold_bars).min(end - 1);

    let sign = instance.direction.sign();
    let entry = instance.entry_price;
    let mut mfe: f64 = 0.0;
    let mut mae: f64 = 0.0;
    let mut excursion = |price: f64| {
        let moved = (price - entry) * sign;
        mfe = mfe.max(moved);
        mae = mae.max(-moved);
    };

    let mut exit: Option<(usize, f64, ExitReason)> = None;
    for i in first..=last {
        let bar = &candles[i];
        if session_over(trigger, bar, config.session_close_hour) {
            excursion(bar.open);
            exit = Some((i, bar.open, ExitReason::SessionEnd));
            break;
        }

        excursion(bar.high);
        excursion(bar.low);

        let (stop_hit, target_hit) = match instance.direction {
            Direction::Long => (bar.low <= instance.stop_loss, bar.high >= instance.take_profit),
            Direction::Short => (bar.high >= instance.stop_loss, bar.low <= instance.take_profit),
        };
        let fill = match (stop_hit, target_hit, config.tie_break) {
            (true, true, TieBreak::StopFirst) | (true, false, _) => {
                Some((instance.stop_loss, ExitReason::Stop))
            }
            (true, true, TieBreak::TargetFirst) | (false, true, _) => {
                Some((instance.take_profit, ExitReason::Target))
            }
            (false, false, _) => None,
        };
        if let Some((price, reason)) = fill {
            exit = Some((i, price, reason));
            break;
        }
    }

    let (exit_index, exit_price, exit_reason) =
        exit.unwrap_or((last, candles[last].close, ExitReason::Timeout));

    let pnl_points = (exit_price - entry) * sign;
    let pnl_currency = pnl_points * config.contract_multiplier - config.round_trip_cost;
    let outcome = if pnl_currency > 0.0 {
        Outcome::Win
    } else if pnl_currency < 0.0 {
        Outcome::Loss
    } else {
        Outcome::Breakeven
    };

    Some(SimulatedTrade {
        pattern_id: instance.pattern_id.clone(),
        direction: instance.direction,
        trigger_index: instance.trigger_index,
        exit_index,
        entry_price: entry,
        exit_price,
        outcome,
        pnl_points,
        pnl_currency,
        max_favorable_excursion: mfe,
        max_adverse_excursion: mae,
        hold_bars: exit_index - instance.trigger_index,
        exit_reason,
    })
}

/// Simulate every instance against the same candles; untradeable ones are dropped.
pub fn simulate_all(
    instances: &[PatternInstance],
    candles: &[Candle],
    end: usize,
    config: &SimulationConfig,
) -> Vec<SimulatedTrade> {
    instances
        .iter()
        .filter_map(|p| simulate_trade(p, candles, end, config))
        .collect()
}
