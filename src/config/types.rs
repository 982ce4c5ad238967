//! Agent configuration structs and defaults.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::redfish::{LegacyTlsConfig, TlsVersion};

pub const MIN_POLL_INTERVAL: u64 = 5;
pub const MAX_POLL_INTERVAL: u64 = 3600;
pub const DEFAULT_POLL_INTERVAL: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub options: PollOptions,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Fixed at setup; changing any of these means re-running `--setup`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub host: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub verify_certificates: bool,
    #[serde(default)]
    pub minimum_tls_version: TlsVersion,
}

impl ConnectionSettings {
    pub fn tls(&self) -> LegacyTlsConfig {
        LegacyTlsConfig::new(self.verify_certificates, self.minimum_tls_version)
    }

    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty() && !self.username.is_empty()
    }
}

/// Adjustable after setup without re-validating credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOptions {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

pub fn default_poll_interval() -> u64 { DEFAULT_POLL_INTERVAL }

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            poll_interval_seconds: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Enforce the 5..=3600 second poll interval range.
pub fn validate_poll_interval(seconds: u64) -> Result<u64> {
    if (MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&seconds) {
        Ok(seconds)
    } else {
        Err(anyhow!(
            "Poll interval must be between {} and {} seconds (got {})",
            MIN_POLL_INTERVAL,
            MAX_POLL_INTERVAL,
            seconds
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_setup_form() {
        let config = AgentConfig::default();
        assert!(!config.connection.verify_certificates);
        assert_eq!(config.connection.minimum_tls_version, TlsVersion::V1_0);
        assert_eq!(config.options.poll_interval_seconds, 30);
        assert!(!config.connection.is_configured());
    }

    #[test]
    fn poll_interval_range_is_enforced() {
        assert!(validate_poll_interval(4).is_err());
        assert_eq!(validate_poll_interval(5).unwrap(), 5);
        assert_eq!(validate_poll_interval(3600).unwrap(), 3600);
        assert!(validate_poll_interval(3601).is_err());
    }

    #[test]
    fn optional_sections_fill_in_defaults() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"connection": {"host": "10.0.0.9", "username": "admin", "password": "pw"}}"#,
        )
        .unwrap();
        assert_eq!(config.options.poll_interval_seconds, 30);
        assert_eq!(config.logging.log_level, "INFO");
        assert_eq!(config.connection.minimum_tls_version, TlsVersion::V1_0);
        assert!(config.connection.is_configured());
    }
}
