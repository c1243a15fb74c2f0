//! CLI command implementations

pub mod config;
pub mod race;
pub mod run;
