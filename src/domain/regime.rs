//! Market regime classification from the tail of the indicator frames.
//!
//! Slopes are the percent change of the medium (fast) and long (slow) EMAs
//! over `lookback` bars. Classification is priority ordered: strong uptrend,
//! uptrend, strong downtrend, downtrend, otherwise sideways.

use serde::Serialize;

use crate::domain::indicator::frame::IndicatorFrame;
use crate::domain::pattern::{pct_from, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    StrongUptrend,
    Uptrend,
    StrongDowntrend,
    Downtrend,
    Sideways,
}

impl MarketRegime {
    /// Trend regimes only trade with the trend; sideways has no preference.
    pub fn recommended_direction(self) -> Option<Direction> {
        match self {
            MarketRegime::StrongUptrend | MarketRegime::Uptrend => Some(Direction::Long),
            MarketRegime::StrongDowntrend | MarketRegime::Downtrend => Some(Direction::Short),
            MarketRegime::Sideways => None,
        }
    }
}

/// Slope thresholds, in percent over the look-back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeThresholds {
    pub strong_fast_slope_pct: f64,
    pub strong_slow_slope_pct: f64,
    pub trend_fast_slope_pct: f64,
    /// Mean absolute slope that maps to a trend strength of 100.
    pub strength_full_scale_pct: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        RegimeThresholds {
            strong_fast_slope_pct: 0.5,
            strong_slow_slope_pct: 0.3,
            trend_fast_slope_pct: 0.15,
            strength_full_scale_pct: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeSettings {
    pub lookback: usize,
    pub thresholds: RegimeThresholds,
}

impl Default for RegimeSettings {
    fn default() -> Self {
        RegimeSettings {
            lookback: 20,
            thresholds: RegimeThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeAnalysis {
    pub regime: MarketRegime,
    /// 0 to 100.
    pub trend_strength: f64,
    pub fast_slope_pct: f64,
    pub slow_slope_pct: f64,
    pub price_vs_fast_pct: f64,
    pub price_vs_slow_pct: f64,
    pub recommended_direction: Option<Direction>,
}

/// Classify the regime as of the last frame.
///
/// Returns `None` unless the last `lookback + 1` frames are all defined.
pub fn classify_regime(
    frames: &[Option<IndicatorFrame>],
    close: f64,
    settings: &RegimeSettings,
) -> Option<RegimeAnalysis> {
    let last = frames.len().checked_sub(1)?;
    let first = last.checked_sub(settings.lookback)?;
    let now = frames[last].as_ref()?;
    let then = frames[first].as_ref()?;

    let fast_slope = pct_from(now.ema_medium, then.ema_medium);
    let slow_slope = pct_from(now.ema_long, then.ema_long);
    let price_vs_fast = pct_from(close, now.ema_medium);
    let price_vs_slow = pct_from(close, now.ema_long);

    let t = &settings.thresholds;
    let regime = if fast_slope > t.strong_fast_slope_pct
        && slow_slope > t.strong_slow_slope_pct
        && price_vs_fast > 0.0
    {
        MarketRegime::StrongUptrend
    } else if fast_slope > t.trend_fast_slope_pct {
        MarketRegime::Uptrend
    } else if fast_slope < -t.strong_fast_slope_pct
        && slow_slope < -t.strong_slow_slope_pct
        && price_vs_fast < 0.0
    {
        MarketRegime::StrongDowntrend
    } else if fast_slope < -t.trend_fast_slope_pct {
        MarketRegime::Downtrend
    } else {
        MarketRegime::Sideways
    };

    let trend_strength = if t.strength_full_scale_pct > 0.0 {
        let mean_abs = (fast_slope.abs() + slow_slope.abs()) / 2.0;
        (mean_abs / t.strength_full_scale_pct * 100.0).min(100.0)
    } else {
        0.0
    };

    Some(RegimeAnalysis {
        regime,
        trend_strength,
        fast_slope_pct: fast_slope,
        slow_slope_pct: slow_slope,
        price_vs_fast_pct: price_vs_fast,
        price_vs_slow_pct: price_vs_slow,
        recommended_direction: regime.recommended_direction(),
    })
}
