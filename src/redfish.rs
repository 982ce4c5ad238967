//! Redfish transport trait and the CIMC telemetry client built on it.

use async_trait::async_trait;
use serde_json::Value;

pub mod client;
pub mod error;
pub mod normalize;
pub mod tls;
pub mod transport;
pub mod validate;

pub use client::RedfishClient;
pub use error::RedfishError;
pub use tls::{LegacyTlsConfig, TlsVersion};
pub use transport::HttpsTransport;

/// Redfish service root for chassis enumeration.
pub const CHASSIS_COLLECTION: &str = "/redfish/v1/Chassis";

#[async_trait]
pub trait RedfishTransport: Send + Sync {
    /// GET a Redfish path (e.g. "/redfish/v1/Chassis") and decode the JSON body.
    async fn get_json(&self, path: &str) -> Result<Value, RedfishError>;
}
