//! edgefinder: intraday pattern discovery and walk-forward validation.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], the command line in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
