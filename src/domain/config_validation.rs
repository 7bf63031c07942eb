//! Configuration validation and assembly.
//!
//! Every field is validated before any data is fetched. Missing keys fall
//! back to defaults; present but impossible values are rejected.

use crate::domain::error::EdgefinderError;
use crate::domain::optimizer::ParameterGrid;
use crate::domain::scan::AnalysisConfig;
use crate::domain::simulator::TieBreak;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> EdgefinderError {
    EdgefinderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn positive_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, EdgefinderError> {
    let value = config.get_int(section, key, default as i64);
    if value <= 0 {
        return Err(invalid(section, key, format!("{} must be a positive integer", key)));
    }
    Ok(value as usize)
}

fn non_negative_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, EdgefinderError> {
    let value = config.get_int(section, key, default as i64);
    if value < 0 {
        return Err(invalid(section, key, format!("{} must be non-negative", key)));
    }
    Ok(value as usize)
}

fn positive_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, EdgefinderError> {
    let value = config.get_double(section, key, default);
    if !(value > 0.0) || !value.is_finite() {
        return Err(invalid(section, key, format!("{} must be positive", key)));
    }
    Ok(value)
}

fn non_negative_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, EdgefinderError> {
    let value = config.get_double(section, key, default);
    if !(value >= 0.0) || !value.is_finite() {
        return Err(invalid(section, key, format!("{} must be non-negative", key)));
    }
    Ok(value)
}

fn open_fraction(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, EdgefinderError> {
    let value = config.get_double(section, key, default);
    if !(value > 0.0 && value < 1.0) {
        return Err(invalid(section, key, format!("{} must be between 0 and 1", key)));
    }
    Ok(value)
}

fn hour(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u32,
) -> Result<u32, EdgefinderError> {
    let value = config.get_int(section, key, default as i64);
    if !(0..24).contains(&value) {
        return Err(invalid(section, key, format!("{} must be an hour between 0 and 23", key)));
    }
    Ok(value as u32)
}

fn parse_list(section: &str, key: &str, raw: &str) -> Result<Vec<f64>, EdgefinderError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| invalid(section, key, format!("'{}' is not a number", s)))
        })
        .collect()
}

/// Validate and assemble the full analysis configuration.
pub fn build_analysis_config(config: &dyn ConfigPort) -> Result<AnalysisConfig, EdgefinderError> {
    let mut out = AnalysisConfig::default();
    build_data(config, &mut out)?;
    build_indicators(config, &mut out)?;
    build_regime(config, &mut out)?;
    build_patterns(config, &mut out)?;
    build_simulation(config, &mut out)?;
    build_statistics(config, &mut out)?;
    build_walk_forward(config, &mut out)?;
    Ok(out)
}

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), EdgefinderError> {
    build_analysis_config(config).map(|_| ())
}

fn build_data(config: &dyn ConfigPort, out: &mut AnalysisConfig) -> Result<(), EdgefinderError> {
    if let Some(symbol) = config.get_string("data", "symbol") {
        if symbol.trim().is_empty() {
            return Err(invalid("data", "symbol", "symbol must not be empty"));
        }
        out.symbol = symbol.trim().to_string();
    }
    if let Some(interval) = config.get_string("data", "interval") {
        out.interval = interval.trim().to_string();
    }
    out.min_bars = positive_usize(config, "data", "min_bars", out.min_bars)?;
    Ok(())
}

fn build_indicators(
    config: &dyn ConfigPort,
    out: &mut AnalysisConfig,
) -> Result<(), EdgefinderError> {
    let s = &mut out.indicators;
    s.ema_short = positive_usize(config, "indicators", "ema_short", s.ema_short)?;
    s.ema_medium = positive_usize(config, "indicators", "ema_medium", s.ema_medium)?;
    s.ema_long = positive_usize(config, "indicators", "ema_long", s.ema_long)?;
    s.sma_long = positive_usize(config, "indicators", "sma_long", s.sma_long)?;
    s.rsi_short = positive_usize(config, "indicators", "rsi_short", s.rsi_short)?;
    s.rsi_long = positive_usize(config, "indicators", "rsi_long", s.rsi_long)?;
    s.atr = positive_usize(config, "indicators", "atr", s.atr)?;
    s.bollinger_period =
        positive_usize(config, "indicators", "bollinger_period", s.bollinger_period)?;
    s.bollinger_k = positive_f64(config, "indicators", "bollinger_k", s.bollinger_k)?;
    s.vwap_k = positive_f64(config, "indicators", "vwap_k", s.vwap_k)?;
    s.macd_fast = positive_usize(config, "indicators", "macd_fast", s.macd_fast)?;
    s.macd_slow = positive_usize(config, "indicators", "macd_slow", s.macd_slow)?;
    s.macd_signal = positive_usize(config, "indicators", "macd_signal", s.macd_signal)?;
    if s.macd_fast >= s.macd_slow {
        return Err(invalid("indicators", "macd_fast", "macd_fast must be shorter than macd_slow"));
    }
    Ok(())
}

fn build_regime(config: &dyn ConfigPort, out: &mut AnalysisConfig) -> Result<(), EdgefinderError> {
    let r = &mut out.regime;
    r.lookback = positive_usize(config, "regime", "lookback", r.lookback)?;
    let t = &mut r.thresholds;
    t.strong_fast_slope_pct =
        positive_f64(config, "regime", "strong_fast_slope_pct", t.strong_fast_slope_pct)?;
    t.strong_slow_slope_pct =
        positive_f64(config, "regime", "strong_slow_slope_pct", t.strong_slow_slope_pct)?;
    t.trend_fast_slope_pct =
        positive_f64(config, "regime", "trend_fast_slope_pct", t.trend_fast_slope_pct)?;
    t.strength_full_scale_pct =
        positive_f64(config, "regime", "strength_full_scale_pct", t.strength_full_scale_pct)?;
    if t.trend_fast_slope_pct > t.strong_fast_slope_pct {
        return Err(invalid(
            "regime",
            "trend_fast_slope_pct",
            "trend threshold must not exceed the strong threshold",
        ));
    }
    Ok(())
}

fn build_patterns(
    config: &dyn ConfigPort,
    out: &mut AnalysisConfig,
) -> Result<(), EdgefinderError> {
    let p = &mut out.patterns;
    p.swing_window = positive_usize(config, "patterns", "swing_window", p.swing_window)?;

    let oversold = config.get_double("patterns", "rsi_oversold", p.oscillator.oversold);
    let overbought = config.get_double("patterns", "rsi_overbought", p.oscillator.overbought);
    if !(0.0 < oversold && oversold < overbought && overbought < 100.0) {
        return Err(invalid(
            "patterns",
            "rsi_oversold",
            "need 0 < rsi_oversold < rsi_overbought < 100",
        ));
    }
    p.oscillator.oversold = oversold;
    p.oscillator.overbought = overbought;

    p.session.opening_range_minutes = positive_usize(
        config,
        "patterns",
        "opening_range_minutes",
        p.session.opening_range_minutes as usize,
    )? as u32;
    if let Some(raw) = config.get_string("patterns", "killzone_hours") {
        let hours = parse_list("patterns", "killzone_hours", &raw)?;
        if hours.iter().any(|h| h.fract() != 0.0 || !(0.0..24.0).contains(h)) {
            return Err(invalid("patterns", "killzone_hours", "hours must be whole numbers 0-23"));
        }
        p.session.killzone_hours = hours.into_iter().map(|h| h as u32).collect();
    }
    p.candlestick.min_weight =
        non_negative_f64(config, "patterns", "candlestick_min_weight", p.candlestick.min_weight)?;
    p.support_resistance.zone_width_pct =
        positive_f64(config, "patterns", "zone_width_pct", p.support_resistance.zone_width_pct)?;
    p.support_resistance.min_touches =
        positive_usize(config, "patterns", "min_touches", p.support_resistance.min_touches)?;
    Ok(())
}

fn build_simulation(
    config: &dyn ConfigPort,
    out: &mut AnalysisConfig,
) -> Result<(), EdgefinderError> {
    let s = &mut out.simulation;
    s.max_hold_bars = positive_usize(config, "simulation", "max_hold_bars", s.max_hold_bars)?;
    s.session_close_hour = hour(config, "simulation", "session_close_hour", s.session_close_hour)?;
    s.contract_multiplier =
        positive_f64(config, "simulation", "contract_multiplier", s.contract_multiplier)?;
    s.round_trip_cost =
        non_negative_f64(config, "simulation", "round_trip_cost", s.round_trip_cost)?;
    if let Some(raw) = config.get_string("simulation", "same_bar_tie_break") {
        s.tie_break = raw
            .parse::<TieBreak>()
            .map_err(|reason| invalid("simulation", "same_bar_tie_break", reason))?;
    }
    Ok(())
}

fn build_statistics(
    config: &dyn ConfigPort,
    out: &mut AnalysisConfig,
) -> Result<(), EdgefinderError> {
    let s = &mut out.statistics;
    s.min_sample_size = positive_usize(config, "statistics", "min_sample_size", s.min_sample_size)?;
    s.confidence_full_sample =
        positive_usize(config, "statistics", "confidence_full_sample", s.confidence_full_sample)?;
    s.profit_factor_cap =
        positive_f64(config, "statistics", "profit_factor_cap", s.profit_factor_cap)?;
    out.walk_forward.profit_factor_cap = s.profit_factor_cap;
    Ok(())
}

fn build_walk_forward(
    config: &dyn ConfigPort,
    out: &mut AnalysisConfig,
) -> Result<(), EdgefinderError> {
    let w = &mut out.walk_forward;
    w.train_fraction = open_fraction(config, "walk_forward", "train_fraction", w.train_fraction)?;
    w.top_n = positive_usize(config, "walk_forward", "top_n", w.top_n)?;
    w.bars_per_year = positive_f64(config, "walk_forward", "bars_per_year", w.bars_per_year)?;
    w.min_profit_factor =
        non_negative_f64(config, "walk_forward", "min_profit_factor", w.min_profit_factor)?;
    w.min_win_rate = non_negative_f64(config, "walk_forward", "min_win_rate", w.min_win_rate)?;
    if w.min_win_rate > 1.0 {
        return Err(invalid("walk_forward", "min_win_rate", "min_win_rate is a fraction"));
    }
    w.caution_profit_factor =
        non_negative_f64(config, "walk_forward", "caution_profit_factor", w.caution_profit_factor)?;
    if w.caution_profit_factor > w.min_profit_factor {
        return Err(invalid(
            "walk_forward",
            "caution_profit_factor",
            "caution_profit_factor must not exceed min_profit_factor",
        ));
    }
    Ok(())
}

/// Scan look-back from `[scan] lookback_days`.
pub fn scan_lookback_days(config: &dyn ConfigPort) -> Result<u32, EdgefinderError> {
    let days = positive_usize(config, "scan", "lookback_days", 30)?;
    u32::try_from(days).map_err(|_| invalid("scan", "lookback_days", "lookback_days is too large"))
}

/// Number of pooled connections for `[sqlite] pool_size`.
pub fn sqlite_pool_size(config: &dyn ConfigPort) -> Result<u32, EdgefinderError> {
    let size = non_negative_usize(config, "sqlite", "pool_size", 4)?;
    if size == 0 || size > 64 {
        return Err(invalid("sqlite", "pool_size", "pool_size must be between 1 and 64"));
    }
    Ok(size as u32)
}

/// Parameter grid from a section where each key lists comma-separated candidates.
pub fn build_parameter_grid(
    config: &dyn ConfigPort,
    section: &str,
) -> Result<ParameterGrid, EdgefinderError> {
    let keys = config.section_keys(section);
    if keys.is_empty() {
        return Err(EdgefinderError::ConfigMissing {
            section: section.to_string(),
            key: "<any tunable>".to_string(),
        });
    }
    let mut grid = ParameterGrid::new();
    for key in keys {
        let raw = config.get_string(section, &key).unwrap_or_default();
        grid.insert(&key, parse_list(section, &key, &raw)?);
    }
    grid.validate()?;
    Ok(grid)
}
