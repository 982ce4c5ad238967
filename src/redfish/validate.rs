//! Setup-time connection probe: one fan fetch, failures mapped to operator-facing reasons.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::RedfishClient;
use super::error::RedfishError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid username or password (invalid_auth)")]
    InvalidAuth,
    #[error("The account is not allowed to read Redfish resources (forbidden)")]
    Forbidden,
    /// Redfish is not served by this firmware (404/405).
    #[error("Redfish is not available on this CIMC firmware (not_supported)")]
    NotSupported,
    #[error("TLS handshake failed, try a lower minimum TLS version (ssl_error)")]
    SslError,
    #[error("Timed out talking to the CIMC (timeout)")]
    Timeout,
    #[error("Unable to connect to the CIMC (cannot_connect)")]
    CannotConnect,
    #[error("Unexpected error (unknown)")]
    Unknown,
}

impl ValidationError {
    pub fn as_code(&self) -> &'static str {
        match self {
            ValidationError::InvalidAuth => "invalid_auth",
            ValidationError::Forbidden => "forbidden",
            ValidationError::NotSupported => "not_supported",
            ValidationError::SslError => "ssl_error",
            ValidationError::Timeout => "timeout",
            ValidationError::CannotConnect => "cannot_connect",
            ValidationError::Unknown => "unknown",
        }
    }
}

impl From<&RedfishError> for ValidationError {
    fn from(err: &RedfishError) -> Self {
        if let Some(status) = err.status() {
            return match status {
                401 => ValidationError::InvalidAuth,
                403 => ValidationError::Forbidden,
                404 | 405 => ValidationError::NotSupported,
                _ => ValidationError::CannotConnect,
            };
        }
        match err {
            RedfishError::Http { .. } => ValidationError::CannotConnect,
            RedfishError::Tls(_) => ValidationError::SslError,
            RedfishError::Timeout(_) => ValidationError::Timeout,
            RedfishError::Connection(_) => ValidationError::CannotConnect,
            RedfishError::InvalidJson { .. } | RedfishError::Unexpected(_) => ValidationError::Unknown,
        }
    }
}

/// Probe reachability and credentials with a single fan fetch. No retries.
pub async fn validate_connection(client: &RedfishClient) -> Result<(), ValidationError> {
    match client.fetch_fans().await {
        Ok(report) => {
            if report.device.is_defaulted() {
                info!("Chassis identity unavailable on {}; using generic device info", client.host());
            }
            info!(
                "Validated Redfish access to {} ({} fans)",
                client.host(),
                report.fans.len()
            );
            Ok(())
        }
        Err(err) => {
            let reason = ValidationError::from(&err);
            match &err {
                RedfishError::Http { status, body, .. } => {
                    warn!("HTTP error talking to CIMC {}: {} {} | body={:?}", client.host(), status, err, body)
                }
                RedfishError::Tls(_) => warn!("TLS/SSL error talking to CIMC {}: {}", client.host(), err),
                RedfishError::Timeout(_) => warn!("Timeout talking to CIMC {}: {}", client.host(), err),
                RedfishError::Connection(_) => warn!("Connection error to CIMC {}: {}", client.host(), err),
                _ => warn!("Unexpected error during CIMC validation of {}: {}", client.host(), err),
            }
            debug!("Validation of {} failed with reason {}", client.host(), reason.as_code());
            Err(reason)
        }
    }
}
