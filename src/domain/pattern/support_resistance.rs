//! Support and resistance levels from clustered swing points.

use serde::Serialize;

use super::swing::{SwingKind, SwingPoint};
use super::{
    AnalysisSeries, Direction, PatternCategory, PatternDetector, PatternInstance, RiskMultipliers,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportResistanceConfig {
    /// Only swings confirmed within this many bars are clustered.
    pub lookback_bars: usize,
    /// A zone spans at most this percent above its lowest swing.
    pub zone_width_pct: f64,
    pub min_touches: usize,
    pub strength_per_touch: f64,
    /// Percent the price must move through a level to break it.
    pub break_pct: f64,
    /// Percent distance within which a bar counts as testing a level.
    pub proximity_pct: f64,
    pub risk: RiskMultipliers,
}

impl Default for SupportResistanceConfig {
    fn default() -> Self {
        SupportResistanceConfig {
            lookback_bars: 100,
            zone_width_pct: 0.5,
            min_touches: 2,
            strength_per_touch: 25.0,
            break_pct: 0.5,
            proximity_pct: 0.2,
            risk: RiskMultipliers::new(1.0, 2.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Support,
    Resistance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceLevel {
    pub price: f64,
    pub kind: LevelKind,
    pub touches: usize,
    /// 0 to 100.
    pub strength: f64,
    pub broken: bool,
}

/// Cluster `swings` into zones and keep those with enough touches.
///
/// Zones are grown greedily in ascending price order. A level's kind follows
/// the majority of its swings (lows make support); ties resolve by which side
/// of `current_price` the level sits.
pub fn find_levels(
    swings: &[SwingPoint],
    current_price: f64,
    config: &SupportResistanceConfig,
) -> Vec<PriceLevel> {
    let mut sorted: Vec<SwingPoint> = swings.to_vec();
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut zones: Vec<Vec<SwingPoint>> = Vec::new();
    for swing in sorted {
        match zones.last_mut() {
            Some(zone)
                if (swing.price - zone[0].price) / zone[0].price * 100.0
                    <= config.zone_width_pct =>
            {
                zone.push(swing);
            }
            _ => zones.push(vec![swing]),
        }
    }

    zones
        .into_iter()
        .filter(|zone| zone.len() >= config.min_touches.max(1))
        .map(|zone| {
            let touches = zone.len();
            let price = zone.iter().map(|s| s.price).sum::<f64>() / touches as f64;
            let lows = zone.iter().filter(|s| s.kind == SwingKind::Low).count();
            let highs = touches - lows;
            let kind = if lows > highs || (lows == highs && price < current_price) {
                LevelKind::Support
            } else {
                LevelKind::Resistance
            };
            let b = config.break_pct / 100.0;
            let broken = match kind {
                LevelKind::Support => current_price < price * (1.0 - b),
                LevelKind::Resistance => current_price > price * (1.0 + b),
            };
            PriceLevel {
                price,
                kind,
                touches,
                strength: (touches as f64 * config.strength_per_touch).min(100.0),
                broken,
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SupportResistanceDetector {
    config: SupportResistanceConfig,
}

impl SupportResistanceDetector {
    pub fn new(config: SupportResistanceConfig) -> Self {
        SupportResistanceDetector { config }
    }
}

impl PatternDetector for SupportResistanceDetector {
    fn name(&self) -> &'static str {
        "support_resistance"
    }

    fn detect(&self, series: &AnalysisSeries, index: usize) -> Vec<PatternInstance> {
        let Some(prev_index) = index.checked_sub(1) else {
            return Vec::new();
        };
        let candles = series.candles();
        let candle = &candles[index];
        let prev_close = candles[prev_index].close;
        let from = index.saturating_sub(self.config.lookback_bars);
        let swings: Vec<SwingPoint> = series
            .confirmed_swings(index)
            .iter()
            .filter(|s| s.index >= from)
            .copied()
            .collect();
        let levels = find_levels(&swings, candle.close, &self.config);

        let near = self.config.proximity_pct / 100.0;
        let b = self.config.break_pct / 100.0;
        // strongest level per pattern id
        let mut best: Vec<(&'static str, Direction, &PriceLevel)> = Vec::new();
        for level in &levels {
            let hit = match level.kind {
                LevelKind::Support if !level.broken
                    && candle.low <= level.price * (1.0 + near)
                    && candle.close > level.price
                    && candle.is_bullish() =>
                {
                    Some(("support_bounce", Direction::Long))
                }
                LevelKind::Resistance if !level.broken
                    && candle.high >= level.price * (1.0 - near)
                    && candle.close < level.price
                    && candle.is_bearish() =>
                {
                    Some(("resistance_rejection", Direction::Short))
                }
                LevelKind::Resistance
                    if prev_close <= level.price * (1.0 + b)
                        && candle.close > level.price * (1.0 + b) =>
                {
                    Some(("resistance_breakout", Direction::Long))
                }
                LevelKind::Support
                    if prev_close >= level.price * (1.0 - b)
                        && candle.close < level.price * (1.0 - b) =>
                {
                    Some(("support_breakdown", Direction::Short))
                }
                _ => None,
            };
            if let Some((id, direction)) = hit {
                match best.iter_mut().find(|(existing, _, _)| *existing == id) {
                    Some(slot) if slot.2.strength < level.strength => {
                        *slot = (id, direction, level)
                    }
                    Some(_) => {}
                    None => best.push((id, direction, level)),
                }
            }
        }

        best.into_iter()
            .filter_map(|(id, direction, level)| {
                PatternInstance::at_trigger(
                    series,
                    id,
                    PatternCategory::SupportResistance,
                    direction,
                    index,
                    self.config.risk,
                )
                .map(|p| {
                    p.with_context("level", level.price)
                        .with_context("strength", level.strength)
                        .with_context("touches", level.touches as f64)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::test_support::*;

    fn swing(index: usize, price: f64, kind: SwingKind) -> SwingPoint {
        SwingPoint { index, price, kind }
    }

    #[test]
    fn clusters_nearby_swings_into_levels() {
        let swings = vec![
            swing(1, 100.0, SwingKind::Low),
            swing(5, 100.3, SwingKind::Low),
            swing(9, 99.9, SwingKind::Low),
            swing(3, 110.0, SwingKind::High),
        ];
        let levels = find_levels(&swings, 105.0, &SupportResistanceConfig::default());
        assert_eq!(levels.len(), 1);
        let level = &levels[0];
        assert_eq!(level.kind, LevelKind::Support);
        assert_eq!(level.touches, 3);
        assert!((level.strength - 75.0).abs() < 1e-9);
        assert!((level.price - (100.0 + 100.3 + 99.9) / 3.0).abs() < 1e-9);
        assert!(!level.broken);
    }

    #[test]
    fn strength_saturates_and_break_detected() {
        let swings: Vec<SwingPoint> = (0..6).map(|i| swing(i, 120.0, SwingKind::High)).collect();
        let levels = find_levels(&swings, 121.0, &SupportResistanceConfig::default());
        assert_eq!(levels[0].strength, 100.0);
        assert_eq!(levels[0].kind, LevelKind::Resistance);
        assert!(levels[0].broken);
    }

    #[test]
    fn support_bounce_off_double_tested_floor() {
        // two dips to 99.5 confirmed as swing lows, then a third test that holds
        let closes = [
            103.0, 102.0, 100.0, 102.0, 104.0, 102.0, 100.0, 102.0, 104.0, 103.0, 101.0,
        ];
        let mut bars: Vec<(f64, f64, f64, f64)> =
            closes.iter().map(|&c| (c, c + 0.5, c - 0.5, c)).collect();
        bars.push((100.2, 101.5, 99.6, 101.2));
        let series = series_from(&bars, 2);

        let found =
            SupportResistanceDetector::new(SupportResistanceConfig::default()).detect(&series, 11);
        let bounce = found
            .iter()
            .find(|p| p.pattern_id == "support_bounce")
            .expect("support bounce");
        assert_eq!(bounce.direction, Direction::Long);
        assert!(bounce.levels_consistent());
    }
}
