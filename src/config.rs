//! Agent configuration: types, config.json persistence, interactive setup.

pub mod persistence;
pub mod setup;
pub mod types;
