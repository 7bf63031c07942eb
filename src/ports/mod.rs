//! Port traits: the seams between the analysis core and its collaborators.

pub mod config_port;
pub mod data_port;
pub mod statistics_store;
