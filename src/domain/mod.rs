//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod regime;
pub mod pattern;
pub mod strategy;
pub mod simulator;
pub mod statistics;
pub mod optimizer;
pub mod scan;
pub mod config_validation;
pub mod error;
