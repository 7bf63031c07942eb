//! Candlestick geometry.
//!
//! [`match_candlestick_patterns`] is a pure function of the candles ending at
//! `index`; it knows nothing about indicators. [`CandlestickDetector`] turns
//! its matches into trade instances, resolving neutral signals against the
//! prevailing medium EMA trend.
//!
//! Shapes and their signals:
//!
//! | Pattern | Candles | Signal |
//! |---|---|---|
//! | doji, long_legged_doji | 1 | neutral |
//! | dragonfly_doji, hammer | 1 | bullish |
//! | gravestone_doji, shooting_star | 1 | bearish |
//! | bullish_engulfing, piercing_line, tweezer_bottom | 2 | bullish |
//! | bearish_engulfing, dark_cloud_cover, tweezer_top | 2 | bearish |
//! | morning_star, three_white_soldiers | 3 | bullish |
//! | evening_star, three_black_crows | 3 | bearish |

use serde::Serialize;

use super::{
    AnalysisSeries, Direction, PatternCategory, PatternDetector, PatternInstance, RiskMultipliers,
};
use crate::domain::ohlcv::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleSignal {
    Bullish,
    Bearish,
    Neutral,
}

impl CandleSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            CandleSignal::Bullish => "bullish",
            CandleSignal::Bearish => "bearish",
            CandleSignal::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandlestickMatch {
    pub name: &'static str,
    pub signal: CandleSignal,
    /// Confidence weight, 0 to 100.
    pub weight: f64,
}

/// Confidence weights per shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandlestickWeights {
    pub doji: f64,
    pub dragonfly_doji: f64,
    pub gravestone_doji: f64,
    pub long_legged_doji: f64,
    pub hammer: f64,
    pub shooting_star: f64,
    pub engulfing: f64,
    pub piercing_line: f64,
    pub dark_cloud_cover: f64,
    pub tweezer: f64,
    pub star: f64,
    pub three_soldiers_crows: f64,
}

impl Default for CandlestickWeights {
    fn default() -> Self {
        CandlestickWeights {
            doji: 50.0,
            dragonfly_doji: 60.0,
            gravestone_doji: 60.0,
            long_legged_doji: 50.0,
            hammer: 60.0,
            shooting_star: 60.0,
            engulfing: 70.0,
            piercing_line: 65.0,
            dark_cloud_cover: 65.0,
            tweezer: 55.0,
            star: 75.0,
            three_soldiers_crows: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandlestickConfig {
    /// Body at most this fraction of the range is a doji.
    pub doji_body_ratio: f64,
    /// Dragonfly/gravestone: the short wick is at most this fraction of the range.
    pub doji_short_wick_ratio: f64,
    /// Dragonfly/gravestone: the long wick is at least this fraction of the range.
    pub doji_long_wick_ratio: f64,
    /// Long-legged doji: both wicks at least this fraction of the range.
    pub long_legged_wick_ratio: f64,
    /// Hammer/shooting star: long wick at least this multiple of the body.
    pub hammer_wick_body_ratio: f64,
    /// Hammer/shooting star: opposite wick at most this multiple of the body.
    pub hammer_opposite_wick_ratio: f64,
    /// A strong candle's body is at least this fraction of its range.
    pub long_body_ratio: f64,
    /// Star middle candle body at most this fraction of the first body.
    pub star_body_ratio: f64,
    /// Tweezer extremes match within this relative tolerance.
    pub tweezer_tolerance: f64,
    /// Bars of prior closes used for hammer/shooting star trend context.
    pub trend_lookback: usize,
    /// Matches below this weight are not traded by the detector.
    pub min_weight: f64,
    pub weights: CandlestickWeights,
    pub risk: RiskMultipliers,
}

impl Default for CandlestickConfig {
    fn default() -> Self {
        CandlestickConfig {
            doji_body_ratio: 0.1,
            doji_short_wick_ratio: 0.1,
            doji_long_wick_ratio: 0.6,
            long_legged_wick_ratio: 0.3,
            hammer_wick_body_ratio: 2.0,
            hammer_opposite_wick_ratio: 1.0,
            long_body_ratio: 0.5,
            star_body_ratio: 0.3,
            tweezer_tolerance: 0.001,
            trend_lookback: 3,
            min_weight: 0.0,
            weights: CandlestickWeights::default(),
            risk: RiskMultipliers::new(1.0, 2.0),
        }
    }
}

fn is_strong(c: &Candle, config: &CandlestickConfig) -> bool {
    c.range() > 0.0 && c.body() >= config.long_body_ratio * c.range()
}

fn single_candle(
    c: &Candle,
    prior_trend: Option<Direction>,
    config: &CandlestickConfig,
) -> Option<CandlestickMatch> {
    let range = c.range();
    if range <= 0.0 {
        return None;
    }
    let w = &config.weights;
    let (upper, lower) = (c.upper_wick(), c.lower_wick());

    if c.body() <= config.doji_body_ratio * range {
        let short_wick = config.doji_short_wick_ratio * range;
        let long_wick = config.doji_long_wick_ratio * range;
        let legged_wick = config.long_legged_wick_ratio * range;
        let m = if upper <= short_wick && lower >= long_wick {
            ("dragonfly_doji", CandleSignal::Bullish, w.dragonfly_doji)
        } else if lower <= short_wick && upper >= long_wick {
            ("gravestone_doji", CandleSignal::Bearish, w.gravestone_doji)
        } else if upper >= legged_wick && lower >= legged_wick {
            ("long_legged_doji", CandleSignal::Neutral, w.long_legged_doji)
        } else {
            ("doji", CandleSignal::Neutral, w.doji)
        };
        return Some(CandlestickMatch {
            name: m.0,
            signal: m.1,
            weight: m.2,
        });
    }

    let body = c.body();
    let hammer_shape = lower >= config.hammer_wick_body_ratio * body
        && upper <= config.hammer_opposite_wick_ratio * body;
    let star_shape = upper >= config.hammer_wick_body_ratio * body
        && lower <= config.hammer_opposite_wick_ratio * body;

    match prior_trend {
        Some(Direction::Short) if hammer_shape => Some(CandlestickMatch {
            name: "hammer",
            signal: CandleSignal::Bullish,
            weight: w.hammer,
        }),
        Some(Direction::Long) if star_shape => Some(CandlestickMatch {
            name: "shooting_star",
            signal: CandleSignal::Bearish,
            weight: w.shooting_star,
        }),
        _ => None,
    }
}

fn two_candle(prev: &Candle, cur: &Candle, config: &CandlestickConfig) -> Vec<CandlestickMatch> {
    let w = &config.weights;
    let mut found = Vec::new();

    if prev.is_bearish() && cur.is_bullish() {
        if cur.open <= prev.close && cur.close >= prev.open && cur.body() > prev.body() {
            found.push(CandlestickMatch {
                name: "bullish_engulfing",
                signal: CandleSignal::Bullish,
                weight: w.engulfing,
            });
        } else if cur.open < prev.close
            && cur.close > prev.body_midpoint()
            && cur.close < prev.open
        {
            found.push(CandlestickMatch {
                name: "piercing_line",
                signal: CandleSignal::Bullish,
                weight: w.piercing_line,
            });
        }
        if (prev.low - cur.low).abs() <= config.tweezer_tolerance * prev.low.abs() {
            found.push(CandlestickMatch {
                name: "tweezer_bottom",
                signal: CandleSignal::Bullish,
                weight: w.tweezer,
            });
        }
    }

    if prev.is_bullish() && cur.is_bearish() {
        if cur.open >= prev.close && cur.close <= prev.open && cur.body() > prev.body() {
            found.push(CandlestickMatch {
                name: "bearish_engulfing",
                signal: CandleSignal::Bearish,
                weight: w.engulfing,
            });
        } else if cur.open > prev.close
            && cur.close < prev.body_midpoint()
            && cur.close > prev.open
        {
            found.push(CandlestickMatch {
                name: "dark_cloud_cover",
                signal: CandleSignal::Bearish,
                weight: w.dark_cloud_cover,
            });
        }
        if (prev.high - cur.high).abs() <= config.tweezer_tolerance * prev.high.abs() {
            found.push(CandlestickMatch {
                name: "tweezer_top",
                signal: CandleSignal::Bearish,
                weight: w.tweezer,
            });
        }
    }
    found
}

fn three_candle(
    c1: &Candle,
    c2: &Candle,
    c3: &Candle,
    config: &CandlestickConfig,
) -> Vec<CandlestickMatch> {
    let w = &config.weights;
    let mut found = Vec::new();
    let small_middle = c2.body() <= config.star_body_ratio * c1.body();

    if c1.is_bearish()
        && is_strong(c1, config)
        && small_middle
        && c3.is_bullish()
        && is_strong(c3, config)
        && c3.close > c1.body_midpoint()
    {
        found.push(CandlestickMatch {
            name: "morning_star",
            signal: CandleSignal::Bullish,
            weight: w.star,
        });
    }
    if c1.is_bullish()
        && is_strong(c1, config)
        && small_middle
        && c3.is_bearish()
        && is_strong(c3, config)
        && c3.close < c1.body_midpoint()
    {
        found.push(CandlestickMatch {
            name: "evening_star",
            signal: CandleSignal::Bearish,
            weight: w.star,
        });
    }

    let soldiers = [c1, c2, c3].iter().all(|c| c.is_bullish() && is_strong(c, config))
        && [(c1, c2), (c2, c3)]
            .iter()
            .all(|(a, b)| b.close > a.close && b.open > a.open && b.open <= a.close);
    if soldiers {
        found.push(CandlestickMatch {
            name: "three_white_soldiers",
            signal: CandleSignal::Bullish,
            weight: w.three_soldiers_crows,
        });
    }

    let crows = [c1, c2, c3].iter().all(|c| c.is_bearish() && is_strong(c, config))
        && [(c1, c2), (c2, c3)]
            .iter()
            .all(|(a, b)| b.close < a.close && b.open < a.open && b.open >= a.close);
    if crows {
        found.push(CandlestickMatch {
            name: "three_black_crows",
            signal: CandleSignal::Bearish,
            weight: w.three_soldiers_crows,
        });
    }
    found
}

/// Direction of closes over the `lookback` bars before `index`.
fn prior_trend(candles: &[Candle], index: usize, lookback: usize) -> Option<Direction> {
    if lookback == 0 || index < lookback + 1 {
        return None;
    }
    let from = candles[index - 1 - lookback].close;
    let to = candles[index - 1].close;
    if to < from {
        Some(Direction::Short)
    } else if to > from {
        Some(Direction::Long)
    } else {
        None
    }
}

/// Every candlestick shape completed by the candle at `index`.
pub fn match_candlestick_patterns(
    candles: &[Candle],
    index: usize,
    config: &CandlestickConfig,
) -> Vec<CandlestickMatch> {
    let mut found = Vec::new();
    let Some(cur) = candles.get(index) else {
        return found;
    };

    let trend = prior_trend(candles, index, config.trend_lookback);
    found.extend(single_candle(cur, trend, config));
    if index >= 1 {
        found.extend(two_candle(&candles[index - 1], cur, config));
    }
    if index >= 2 {
        found.extend(three_candle(&candles[index - 2], &candles[index - 1], cur, config));
    }
    found
}

#[derive(Debug, Clone)]
pub struct CandlestickDetector {
    config: CandlestickConfig,
}

impl CandlestickDetector {
    pub fn new(config: CandlestickConfig) -> Self {
        CandlestickDetector { config }
    }
}

impl PatternDetector for CandlestickDetector {
    fn name(&self) -> &'static str {
        "candlestick"
    }

    fn detect(&self, series: &AnalysisSeries, index: usize) -> Vec<PatternInstance> {
        let Some(frame) = series.frame(index) else {
            return Vec::new();
        };
        let close = series.candles()[index].close;

        match_candlestick_patterns(series.candles(), index, &self.config)
            .into_iter()
            .filter(|m| m.weight >= self.config.min_weight)
            .filter_map(|m| {
                let direction = match m.signal {
                    CandleSignal::Bullish => Direction::Long,
                    CandleSignal::Bearish => Direction::Short,
                    // indecision is read as exhaustion of the current move
                    CandleSignal::Neutral if close > frame.ema_medium => Direction::Short,
                    CandleSignal::Neutral => Direction::Long,
                };
                PatternInstance::at_trigger(
                    series,
                    m.name,
                    PatternCategory::Candlestick,
                    direction,
                    index,
                    self.config.risk,
                )
                .map(|p| {
                    p.with_context("confidence", m.weight)
                        .with_context("signal", m.signal.as_str())
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::test_support::*;

    fn names(matches: &[CandlestickMatch]) -> Vec<&'static str> {
        matches.iter().map(|m| m.name).collect()
    }

    fn matched(candles: &[Candle], index: usize, config: &CandlestickConfig, name: &str) -> bool {
        names(&match_candlestick_patterns(candles, index, config)).iter().any(|n| *n == name)
    }

    fn morning_star_bars() -> Vec<(f64, f64, f64, f64)> {
        vec![
            (110.0, 110.5, 99.5, 100.0),
            (99.0, 99.8, 98.2, 99.2),
            (100.0, 108.5, 99.5, 108.0),
        ]
    }

    #[test]
    fn morning_star_three_candles() {
        let candles = candles_from(&morning_star_bars());
        let found = match_candlestick_patterns(&candles, 2, &CandlestickConfig::default());
        let star = found
            .iter()
            .find(|m| m.name == "morning_star")
            .expect("morning star");
        assert_eq!(star.signal, CandleSignal::Bullish);
    }

    #[test]
    fn evening_star_mirror() {
        let candles = candles_from(&[
            (100.0, 110.5, 99.5, 110.0),
            (111.0, 111.8, 110.2, 110.8),
            (110.0, 110.5, 101.5, 102.0),
        ]);
        let found = match_candlestick_patterns(&candles, 2, &CandlestickConfig::default());
        assert!(names(&found).contains(&"evening_star"));
    }

    #[test]
    fn doji_variants() {
        let config = CandlestickConfig::default();
        let candles = candles_from(&[
            (100.0, 100.1, 96.0, 100.05),
            (100.0, 104.0, 99.9, 99.95),
            (100.0, 102.0, 98.0, 100.1),
            (100.0, 100.9, 99.0, 100.05),
        ]);
        assert_eq!(single_candle(&candles[0], None, &config).unwrap().name, "dragonfly_doji");
        assert_eq!(single_candle(&candles[1], None, &config).unwrap().name, "gravestone_doji");
        assert_eq!(single_candle(&candles[2], None, &config).unwrap().name, "long_legged_doji");
        let plain = single_candle(&candles[3], None, &config).unwrap();
        assert!(plain.name == "doji" || plain.name == "long_legged_doji");
        assert_eq!(plain.signal, CandleSignal::Neutral);
    }

    #[test]
    fn hammer_needs_prior_downtrend() {
        let config = CandlestickConfig::default();
        let mut bars = vec![
            (106.0, 106.5, 105.5, 106.0),
            (104.0, 104.5, 103.5, 104.0),
            (102.0, 102.5, 101.5, 102.0),
            (100.5, 100.6, 100.0, 100.3),
        ];
        // body 1, lower wick 4, upper wick 0.2
        bars.push((100.0, 101.2, 96.0, 101.0));
        let candles = candles_from(&bars);
        assert!(matched(&candles, 4, &config, "hammer"));

        let flat = candles_from(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 101.2, 96.0, 101.0),
        ]);
        assert!(!matched(&flat, 4, &config, "hammer"));
    }

    #[test]
    fn engulfing_and_piercing() {
        let config = CandlestickConfig::default();
        let engulf = candles_from(&[(102.0, 102.5, 99.5, 100.0), (99.5, 103.0, 99.0, 102.5)]);
        assert!(matched(&engulf, 1, &config, "bullish_engulfing"));

        let piercing = candles_from(&[(104.0, 104.5, 99.5, 100.0), (99.0, 103.0, 98.5, 102.5)]);
        assert!(matched(&piercing, 1, &config, "piercing_line"));

        let dark = candles_from(&[(100.0, 104.5, 99.5, 104.0), (105.0, 105.5, 101.0, 101.5)]);
        assert!(matched(&dark, 1, &config, "dark_cloud_cover"));
    }

    #[test]
    fn tweezers_share_extremes() {
        let config = CandlestickConfig::default();
        let bottom = candles_from(&[(101.0, 101.5, 98.0, 99.0), (99.2, 100.5, 98.0, 100.2)]);
        assert!(matched(&bottom, 1, &config, "tweezer_bottom"));
        let top = candles_from(&[(99.0, 102.0, 98.5, 101.0), (100.8, 102.0, 99.5, 99.8)]);
        assert!(matched(&top, 1, &config, "tweezer_top"));
    }

    #[test]
    fn soldiers_and_crows() {
        let config = CandlestickConfig::default();
        let soldiers = candles_from(&[
            (100.0, 102.2, 99.9, 102.0),
            (101.5, 104.2, 101.4, 104.0),
            (103.5, 106.2, 103.4, 106.0),
        ]);
        assert!(matched(&soldiers, 2, &config, "three_white_soldiers"));

        let crows = candles_from(&[
            (106.0, 106.1, 103.8, 104.0),
            (104.5, 104.6, 101.8, 102.0),
            (102.5, 102.6, 99.8, 100.0),
        ]);
        assert!(matched(&crows, 2, &config, "three_black_crows"));
    }

    #[test]
    fn zero_range_candle_matches_nothing() {
        let candles = candles_from(&[(100.0, 100.0, 100.0, 100.0)]);
        assert!(match_candlestick_patterns(&candles, 0, &CandlestickConfig::default()).is_empty());
        assert!(match_candlestick_patterns(&candles, 5, &CandlestickConfig::default()).is_empty());
    }

    #[test]
    fn detector_emits_morning_star_after_warmup() {
        let mut bars = flat_bars(6, 110.0);
        bars.extend(morning_star_bars());
        let series = series_from(&bars, 2);
        let detector = CandlestickDetector::new(CandlestickConfig::default());
        let found = detector.detect(&series, 8);

        let star = found
            .iter()
            .find(|p| p.pattern_id == "morning_star")
            .expect("morning star instance");
        assert_eq!(star.direction, Direction::Long);
        assert_eq!(
            star.context.get("signal"),
            Some(&crate::domain::pattern::ContextValue::Text("bullish".into()))
        );
        assert!(star.levels_consistent());
    }
}
