//! Normalized telemetry produced by one Redfish poll, and display naming.

pub mod naming;
pub mod types;
