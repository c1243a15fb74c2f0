//! SDK resource modules
//!
//! This module contains resource-specific clients for interacting with
//! different API endpoints.

pub mod races;
pub mod runs;

pub use races::RacesClient;
pub use runs::RunsClient;
