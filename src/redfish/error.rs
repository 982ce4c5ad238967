//! Error taxonomy for Redfish requests.

use thiserror::Error;

/// Longest response body kept on an HTTP error, in characters.
pub const ERROR_BODY_LIMIT: usize = 300;

#[derive(Debug, Error)]
pub enum RedfishError {
    /// No route, refused, reset, or a structurally unusable service root.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP {status} from {path}")]
    Http {
        status: u16,
        path: String,
        body: String,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("Invalid JSON from {path}: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

impl RedfishError {
    pub fn http(status: u16, path: &str, body: &str) -> Self {
        RedfishError::Http {
            status,
            path: path.to_string(),
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RedfishError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RedfishError>;
