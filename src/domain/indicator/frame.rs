//! Per-bar indicator frame and the single-pass engine that produces it.
//!
//! `IndicatorEngine` owns one forward calculator per indicator. Each call to
//! [`IndicatorEngine::push`] consumes exactly one candle, so the frame returned
//! for candle `i` is a function of candles `0..=i` only.

use serde::Serialize;

use crate::domain::indicator::atr::Atr;
use crate::domain::indicator::bollinger::{Bollinger, BollingerBands};
use crate::domain::indicator::ema::Ema;
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW, Macd, MacdValue};
use crate::domain::indicator::rsi::Rsi;
use crate::domain::indicator::sma::Sma;
use crate::domain::indicator::vwap::{Vwap, VwapBands};
use crate::domain::ohlcv::Candle;

/// Periods and multipliers for every indicator in a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSettings {
    pub ema_short: usize,
    pub ema_medium: usize,
    pub ema_long: usize,
    pub sma_long: usize,
    pub rsi_short: usize,
    pub rsi_long: usize,
    pub atr: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub vwap_k: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings {
            ema_short: 9,
            ema_medium: 21,
            ema_long: 50,
            sma_long: 200,
            rsi_short: 7,
            rsi_long: 14,
            atr: 14,
            bollinger_period: 20,
            bollinger_k: 2.0,
            vwap_k: 2.0,
            macd_fast: DEFAULT_FAST,
            macd_slow: DEFAULT_SLOW,
            macd_signal: DEFAULT_SIGNAL,
        }
    }
}

impl IndicatorSettings {
    /// Index of the first candle for which every indicator is defined.
    pub fn warmup_bars(&self) -> usize {
        let ema = self.ema_short.max(self.ema_medium).max(self.ema_long);
        let macd = self.macd_fast.max(self.macd_slow) + self.macd_signal;
        [
            ema.saturating_sub(1),
            self.sma_long.saturating_sub(1),
            self.rsi_short.max(self.rsi_long),
            self.atr.saturating_sub(1),
            self.bollinger_period.saturating_sub(1),
            macd.saturating_sub(2),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Every indicator value as of one candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorFrame {
    pub ema_short: f64,
    pub ema_medium: f64,
    pub ema_long: f64,
    pub sma_long: f64,
    pub rsi_short: f64,
    pub rsi_long: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub atr: f64,
    pub bollinger_upper: f64,
    pub bollinger_middle: f64,
    pub bollinger_lower: f64,
    pub vwap: f64,
    pub vwap_upper: f64,
    pub vwap_lower: f64,
}

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    ema_short: Ema,
    ema_medium: Ema,
    ema_long: Ema,
    sma_long: Sma,
    rsi_short: Rsi,
    rsi_long: Rsi,
    macd: Macd,
    atr: Atr,
    bollinger: Bollinger,
    vwap: Vwap,
}

impl IndicatorEngine {
    pub fn new(settings: &IndicatorSettings) -> Self {
        IndicatorEngine {
            ema_short: Ema::new(settings.ema_short),
            ema_medium: Ema::new(settings.ema_medium),
            ema_long: Ema::new(settings.ema_long),
            sma_long: Sma::new(settings.sma_long),
            rsi_short: Rsi::new(settings.rsi_short),
            rsi_long: Rsi::new(settings.rsi_long),
            macd: Macd::new(settings.macd_fast, settings.macd_slow, settings.macd_signal),
            atr: Atr::new(settings.atr),
            bollinger: Bollinger::new(settings.bollinger_period, settings.bollinger_k),
            vwap: Vwap::new(settings.vwap_k),
        }
    }

    /// Feed the next candle. Returns `None` until every indicator has warmed up.
    pub fn push(&mut self, candle: &Candle) -> Option<IndicatorFrame> {
        // Every calculator is advanced before any early return.
        let ema_short = self.ema_short.next_value(candle.close);
        let ema_medium = self.ema_medium.next_value(candle.close);
        let ema_long = self.ema_long.next_value(candle.close);
        let sma_long = self.sma_long.next_value(candle.close);
        let rsi_short = self.rsi_short.next_value(candle.close);
        let rsi_long = self.rsi_long.next_value(candle.close);
        let macd = self.macd.next_value(candle.close);
        let atr = self.atr.next_value(candle);
        let bollinger = self.bollinger.next_value(candle.close);
        let vwap = self.vwap.next_value(candle);

        let MacdValue {
            line,
            signal,
            histogram,
        } = macd?;
        let BollingerBands {
            upper,
            middle,
            lower,
        } = bollinger?;
        let VwapBands {
            vwap,
            upper: vwap_upper,
            lower: vwap_lower,
        } = vwap;

        Some(IndicatorFrame {
            ema_short: ema_short?,
            ema_medium: ema_medium?,
            ema_long: ema_long?,
            sma_long: sma_long?,
            rsi_short: rsi_short?,
            rsi_long: rsi_long?,
            macd_line: line,
            macd_signal: signal,
            macd_histogram: histogram,
            atr: atr?,
            bollinger_upper: upper,
            bollinger_middle: middle,
            bollinger_lower: lower,
            vwap,
            vwap_upper,
            vwap_lower,
        })
    }
}

/// Frames aligned with `candles`; `None` during warm-up.
pub fn compute_frames(
    candles: &[Candle],
    settings: &IndicatorSettings,
) -> Vec<Option<IndicatorFrame>> {
    let mut engine = IndicatorEngine::new(settings);
    candles.iter().map(|c| engine.push(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// One flat candle per minute of a single session.
    fn make_candles(prices: &[f64]) -> Vec<Candle> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let time = start + chrono::Duration::minutes(i as i64);
                Candle::new(time, close, close, close, close, 1000.0)
            })
            .collect()
    }

    fn small_settings() -> IndicatorSettings {
        IndicatorSettings {
            ema_short: 3,
            ema_medium: 5,
            ema_long: 8,
            sma_long: 10,
            rsi_short: 3,
            rsi_long: 5,
            atr: 4,
            bollinger_period: 5,
            bollinger_k: 2.0,
            vwap_k: 2.0,
            macd_fast: 3,
            macd_slow: 6,
            macd_signal: 3,
        }
    }

    fn zigzag(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + ((i * 7) % 11) as f64 - 5.0).collect()
    }

    #[test]
    fn default_warmup_is_long_sma() {
        assert_eq!(IndicatorSettings::default().warmup_bars(), 199);
    }

    #[test]
    fn first_frame_at_warmup() {
        let settings = small_settings();
        let warmup = settings.warmup_bars();
        assert_eq!(warmup, 9);

        let frames = compute_frames(&make_candles(&zigzag(20)), &settings);
        assert_eq!(frames.len(), 20);
        assert!(frames[..warmup].iter().all(|f| f.is_none()));
        assert!(frames[warmup..].iter().all(|f| f.is_some()));
    }

    #[test]
    fn macd_bound_warmup() {
        let settings = IndicatorSettings {
            sma_long: 5,
            ema_long: 5,
            macd_slow: 10,
            macd_signal: 4,
            ..small_settings()
        };
        assert_eq!(settings.warmup_bars(), 12);
        let frames = compute_frames(&make_candles(&zigzag(15)), &settings);
        assert!(frames[11].is_none());
        assert!(frames[12].is_some());
    }

    #[test]
    fn frame_values_match_standalone_calculators() {
        let candles = make_candles(&zigzag(30));
        let settings = small_settings();
        let frames = compute_frames(&candles, &settings);
        let mut ema = Ema::new(settings.ema_medium);
        let mut rsi = Rsi::new(settings.rsi_long);

        for (candle, frame) in candles.iter().zip(&frames) {
            let expected_ema = ema.next_value(candle.close);
            let expected_rsi = rsi.next_value(candle.close);
            if let Some(frame) = frame {
                assert_eq!(Some(frame.ema_medium), expected_ema);
                assert_eq!(Some(frame.rsi_long), expected_rsi);
            }
        }
    }

    #[test]
    fn frames_ignore_future_candles() {
        let prices = zigzag(30);
        let settings = small_settings();
        let base = compute_frames(&make_candles(&prices), &settings);

        let mut mutated = prices.clone();
        for p in mutated.iter_mut().skip(20) {
            *p *= 3.0;
        }
        let changed = compute_frames(&make_candles(&mutated), &settings);
        assert_eq!(base[..20], changed[..20]);
    }
}
