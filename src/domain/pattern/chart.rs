//! Chart geometry built on confirmed swing points.
//!
//! Swing-based shapes fire on the bar that confirms their final swing, i.e.
//! `swing.index + swing_window == index`. Flags and pennants fire on the
//! breakout bar after a pole and a tight consolidation.

use serde::Serialize;

use super::swing::{of_kind, SwingKind, SwingPoint};
use super::{
    pct_from, AnalysisSeries, Direction, PatternCategory, PatternDetector, PatternInstance,
    RiskMultipliers,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    /// Max percent difference between the two shoulders.
    pub shoulder_tolerance_pct: f64,
    /// Max percent difference between the two tops/bottoms.
    pub double_tolerance_pct: f64,
    /// Min percent depth of the intervening swing for a double top/bottom.
    pub double_min_depth_pct: f64,
    /// Swing-to-swing change, in percent, treated as flat for triangles.
    pub triangle_flat_pct: f64,
    pub pole_bars: usize,
    pub flag_bars: usize,
    /// Pole move must be at least this many ATRs.
    pub pole_atr_mult: f64,
    /// Consolidation range at most this fraction of the pole move.
    pub flag_max_range_ratio: f64,
    /// Second-half range below this fraction of the first half makes a pennant.
    pub pennant_contraction: f64,
    pub risk: RiskMultipliers,
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            shoulder_tolerance_pct: 2.0,
            double_tolerance_pct: 1.0,
            double_min_depth_pct: 0.5,
            triangle_flat_pct: 0.2,
            pole_bars: 5,
            flag_bars: 5,
            pole_atr_mult: 3.0,
            flag_max_range_ratio: 0.5,
            pennant_contraction: 0.6,
            risk: RiskMultipliers::new(1.5, 3.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartDetector {
    config: ChartConfig,
}

fn last_n<const N: usize>(swings: &[SwingPoint]) -> Option<[SwingPoint; N]> {
    let tail = swings.get(swings.len().checked_sub(N)?..)?;
    tail.try_into().ok()
}

fn within_pct(a: f64, b: f64, tolerance_pct: f64) -> bool {
    let base = a.abs().max(b.abs());
    base > 0.0 && (a - b).abs() / base * 100.0 <= tolerance_pct
}

impl ChartDetector {
    pub fn new(config: ChartConfig) -> Self {
        ChartDetector { config }
    }

    fn head_and_shoulders(
        &self,
        swings: &[SwingPoint],
        kind: SwingKind,
        confirm: usize,
    ) -> Option<(&'static str, Direction, f64)> {
        let [s1, head, s2] = last_n::<3>(&of_kind(swings, kind))?;
        if s2.index != confirm {
            return None;
        }
        let head_beyond = match kind {
            SwingKind::High => head.price > s1.price && head.price > s2.price,
            SwingKind::Low => head.price < s1.price && head.price < s2.price,
        };
        if !head_beyond || !within_pct(s1.price, s2.price, self.config.shoulder_tolerance_pct) {
            return None;
        }
        Some(match kind {
            SwingKind::High => ("head_and_shoulders", Direction::Short, head.price),
            SwingKind::Low => ("inverse_head_and_shoulders", Direction::Long, head.price),
        })
    }

    fn double(
        &self,
        swings: &[SwingPoint],
        kind: SwingKind,
        confirm: usize,
    ) -> Option<(&'static str, Direction, f64)> {
        let [a, b] = last_n::<2>(&of_kind(swings, kind))?;
        if b.index != confirm || !within_pct(a.price, b.price, self.config.double_tolerance_pct) {
            return None;
        }
        let depth = self.config.double_min_depth_pct / 100.0;
        let between = swings.iter().filter(|s| s.index > a.index && s.index < b.index);
        match kind {
            SwingKind::High => {
                let floor = a.price.min(b.price) * (1.0 - depth);
                let trough = between
                    .filter(|s| s.kind == SwingKind::Low && s.price < floor)
                    .map(|s| s.price)
                    .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |m| m.min(p))))?;
                Some(("double_top", Direction::Short, trough))
            }
            SwingKind::Low => {
                let ceiling = a.price.max(b.price) * (1.0 + depth);
                let peak = between
                    .filter(|s| s.kind == SwingKind::High && s.price > ceiling)
                    .map(|s| s.price)
                    .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |m| m.max(p))))?;
                Some(("double_bottom", Direction::Long, peak))
            }
        }
    }

    fn triangle(
        &self,
        series: &AnalysisSeries,
        swings: &[SwingPoint],
        index: usize,
    ) -> Option<(&'static str, Direction, f64)> {
        let [h1, h2] = last_n::<2>(&of_kind(swings, SwingKind::High))?;
        let [l1, l2] = last_n::<2>(&of_kind(swings, SwingKind::Low))?;
        if h2.index.max(l2.index) + series.swing_window() != index {
            return None;
        }
        let flat = self.config.triangle_flat_pct;
        let high_change = pct_from(h2.price, h1.price);
        let low_change = pct_from(l2.price, l1.price);

        if high_change.abs() <= flat && low_change > flat {
            Some(("ascending_triangle", Direction::Long, high_change))
        } else if low_change.abs() <= flat && high_change < -flat {
            Some(("descending_triangle", Direction::Short, high_change))
        } else if high_change < -flat && low_change > flat {
            let ema_long = series.frame(index)?.ema_long;
            let direction = if series.candles()[index].close > ema_long {
                Direction::Long
            } else {
                Direction::Short
            };
            Some(("symmetrical_triangle", direction, high_change))
        } else {
            None
        }
    }

    fn flag(
        &self,
        series: &AnalysisSeries,
        index: usize,
    ) -> Option<(&'static str, Direction, f64)> {
        let c = &self.config;
        if c.flag_bars == 0 || c.pole_bars == 0 || index < c.flag_bars + c.pole_bars + 1 {
            return None;
        }
        let candles = series.candles();
        let atr = series.frame(index)?.atr;
        let pole_end = index - c.flag_bars - 1;
        let pole_start = pole_end - c.pole_bars;
        let pole = candles[pole_end].close - candles[pole_start].close;
        if pole.abs() < c.pole_atr_mult * atr {
            return None;
        }

        let body = &candles[index - c.flag_bars..index];
        let range_of = |bars: &[crate::domain::ohlcv::Candle]| {
            let high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            (high, low)
        };
        let (high, low) = range_of(body);
        if high - low > c.flag_max_range_ratio * pole.abs() {
            return None;
        }

        let close = candles[index].close;
        let direction = if pole > 0.0 && close > high {
            Direction::Long
        } else if pole < 0.0 && close < low {
            Direction::Short
        } else {
            return None;
        };

        let half = c.flag_bars / 2;
        let pennant = half > 0 && {
            let (h1, l1) = range_of(&body[..half]);
            let (h2, l2) = range_of(&body[half..]);
            h2 - l2 < c.pennant_contraction * (h1 - l1)
        };
        let id = match (direction, pennant) {
            (Direction::Long, false) => "bull_flag",
            (Direction::Long, true) => "bull_pennant",
            (Direction::Short, false) => "bear_flag",
            (Direction::Short, true) => "bear_pennant",
        };
        Some((id, direction, pole))
    }
}

impl PatternDetector for ChartDetector {
    fn name(&self) -> &'static str {
        "chart"
    }

    fn detect(&self, series: &AnalysisSeries, index: usize) -> Vec<PatternInstance> {
        let swings = series.confirmed_swings(index);
        let w = series.swing_window();
        let mut hits = Vec::new();

        if let Some(confirm) = index.checked_sub(w).filter(|_| w > 0) {
            for kind in [SwingKind::High, SwingKind::Low] {
                hits.extend(self.head_and_shoulders(swings, kind, confirm));
                hits.extend(self.double(swings, kind, confirm));
            }
            hits.extend(self.triangle(series, swings, index));
        }
        hits.extend(self.flag(series, index));

        hits.into_iter()
            .filter_map(|(id, direction, reference)| {
                PatternInstance::at_trigger(
                    series,
                    id,
                    PatternCategory::Chart,
                    direction,
                    index,
                    self.config.risk,
                )
                .map(|p| p.with_context("reference", reference))
            })
            .collect()
    }
}
