#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use edgefinder::domain::error::EdgefinderError;
use edgefinder::domain::indicator::frame::IndicatorSettings;
pub use edgefinder::domain::ohlcv::Candle;
use edgefinder::domain::pattern::Direction;
use edgefinder::domain::scan::AnalysisConfig;
use edgefinder::domain::statistics::PatternStatistics;
use edgefinder::ports::data_port::DataPort;
use edgefinder::ports::statistics_store::StatisticsStore;
use std::cell::RefCell;
use std::collections::BTreeMap;

pub struct MockDataPort {
    pub candles: Vec<Candle>,
    pub error: Option<String>,
    pub calls: RefCell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            candles: Vec::new(),
            error: None,
            calls: RefCell::new(0),
        }
    }

    pub fn with_candles(mut self, candles: Vec<Candle>) -> Self {
        self.candles = candles;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_candles(
        &self,
        _symbol: &str,
        _interval: &str,
    ) -> Result<Vec<Candle>, EdgefinderError> {
        *self.calls.borrow_mut() += 1;
        if let Some(reason) = &self.error {
            return Err(EdgefinderError::DataUnavailable {
                reason: reason.clone(),
            });
        }
        Ok(self.candles.clone())
    }
}

#[derive(Default)]
pub struct InMemoryStatisticsStore {
    pub records: RefCell<BTreeMap<(String, Direction, u32), PatternStatistics>>,
}

impl StatisticsStore for InMemoryStatisticsStore {
    fn upsert_statistics(
        &self,
        lookback_days: u32,
        statistics: &[PatternStatistics],
    ) -> Result<usize, EdgefinderError> {
        let mut records = self.records.borrow_mut();
        for s in statistics {
            records.insert((s.pattern_id.clone(), s.direction, lookback_days), s.clone());
        }
        Ok(statistics.len())
    }

    fn load_profitable(
        &self,
        lookback_days: u32,
    ) -> Result<Vec<PatternStatistics>, EdgefinderError> {
        let mut out: Vec<PatternStatistics> = self
            .records
            .borrow()
            .iter()
            .filter(|((_, _, days), s)| *days == lookback_days && s.is_profitable())
            .map(|(_, s)| s.clone())
            .collect();
        out.sort_by(|a, b| b.expectancy.total_cmp(&a.expectancy));
        Ok(out)
    }
}

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Candles one minute apart from 2024-03-04 10:00, built from (open, high, low, close).
pub fn candles_from(bars: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    bars.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| {
            let time = at(4, 10, 0) + chrono::Duration::minutes(i as i64);
            Candle::new(time, o, h, l, c, 1000.0)
        })
        .collect()
}

/// `days` sessions of 5 minute bars from 09:30. `close(k)` gives the close of
/// the k-th bar overall; each bar opens at the previous close.
pub fn session_candles(
    days: u32,
    bars_per_day: usize,
    close: impl Fn(usize) -> f64,
) -> Vec<Candle> {
    let mut out = Vec::with_capacity(days as usize * bars_per_day);
    let mut k = 0usize;
    let mut prev = close(0);
    for d in 0..days {
        let open_time = at(4, 9, 30) + chrono::Duration::days(d as i64);
        for b in 0..bars_per_day {
            let c = close(k);
            let high = prev.max(c) + 0.75;
            let low = prev.min(c) - 0.75;
            out.push(Candle::new(
                open_time + chrono::Duration::minutes(5 * b as i64),
                prev,
                high,
                low,
                c,
                800.0 + (k % 7) as f64 * 50.0,
            ));
            prev = c;
            k += 1;
        }
    }
    out
}

/// Oscillating closes around 4000 with two overlapping cycles.
pub fn wave(k: usize) -> f64 {
    let t = k as f64;
    4000.0 + 15.0 * (t / 9.0).sin() + 4.0 * (t / 2.7).cos()
}

/// Short indicator periods so small fixtures get past warm-up.
pub fn quick_settings() -> IndicatorSettings {
    IndicatorSettings {
        ema_short: 3,
        ema_medium: 5,
        ema_long: 8,
        sma_long: 10,
        rsi_short: 3,
        rsi_long: 5,
        atr: 5,
        bollinger_period: 6,
        bollinger_k: 2.0,
        vwap_k: 2.0,
        macd_fast: 3,
        macd_slow: 6,
        macd_signal: 3,
    }
}

pub fn quick_config(min_bars: usize) -> AnalysisConfig {
    let mut config = AnalysisConfig {
        min_bars,
        indicators: quick_settings(),
        ..AnalysisConfig::default()
    };
    config.patterns.swing_window = 2;
    config.regime.lookback = 5;
    config.statistics.min_sample_size = 2;
    config
}
