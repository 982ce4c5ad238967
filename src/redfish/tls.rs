//! TLS context for older CIMC firmware.
//! OpenSSL 3 defaults (security level 2, no TLS < 1.2) reject many CIMC images;
//! this relaxes them for one client without touching process-wide state.

use std::fmt;
use std::str::FromStr;

use openssl::error::ErrorStack;
use openssl::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslOptions, SslVerifyMode, SslVersion};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cipher string allowing the legacy suites CIMC images still negotiate.
pub const LEGACY_CIPHERS: &str = "DEFAULT:@SECLEVEL=1";

/// `SSL_OP_LEGACY_SERVER_CONNECT`: allow servers without RFC 5746 renegotiation support.
const LEGACY_SERVER_CONNECT_BIT: u8 = 0x4;

fn legacy_server_connect() -> SslOptions {
    SslOptions::from_bits_retain(LEGACY_SERVER_CONNECT_BIT.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TlsVersion {
    #[default]
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "1.2")]
    V1_2,
}

impl TlsVersion {
    pub const ALL: [TlsVersion; 3] = [TlsVersion::V1_0, TlsVersion::V1_1, TlsVersion::V1_2];

    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::V1_0 => "1.0",
            TlsVersion::V1_1 => "1.1",
            TlsVersion::V1_2 => "1.2",
        }
    }

    fn ssl_version(&self) -> SslVersion {
        match self {
            TlsVersion::V1_0 => SslVersion::TLS1,
            TlsVersion::V1_1 => SslVersion::TLS1_1,
            TlsVersion::V1_2 => SslVersion::TLS1_2,
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TlsVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| format!("Invalid TLS version '{}'. Valid: 1.0, 1.1, 1.2", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyTlsConfig {
    pub verify_certificates: bool,
    pub minimum_tls_version: TlsVersion,
}

impl LegacyTlsConfig {
    pub fn new(verify_certificates: bool, minimum_tls_version: TlsVersion) -> Self {
        Self {
            verify_certificates,
            minimum_tls_version,
        }
    }

    /// Build the client context. Only failure to create the base context or set the
    /// protocol floor is fatal; a rejected cipher string keeps the library defaults.
    pub fn connector_builder(&self) -> Result<SslConnectorBuilder, ErrorStack> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())?;
        builder.set_min_proto_version(Some(self.minimum_tls_version.ssl_version()))?;

        if let Err(e) = builder.set_cipher_list(LEGACY_CIPHERS) {
            debug!("Legacy cipher list rejected, keeping defaults: {}", e);
        }

        builder.set_options(legacy_server_connect());

        if !self.verify_certificates {
            builder.set_verify(SslVerifyMode::NONE);
        }

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_versions() {
        assert_eq!("1.0".parse::<TlsVersion>().unwrap(), TlsVersion::V1_0);
        assert_eq!(" 1.1 ".parse::<TlsVersion>().unwrap(), TlsVersion::V1_1);
        assert_eq!("1.2".parse::<TlsVersion>().unwrap(), TlsVersion::V1_2);
        assert!("1.3".parse::<TlsVersion>().is_err());
    }

    #[test]
    fn serializes_as_dotted_version() {
        assert_eq!(serde_json::to_string(&TlsVersion::V1_1).unwrap(), "\"1.1\"");
        let v: TlsVersion = serde_json::from_str("\"1.2\"").unwrap();
        assert_eq!(v, TlsVersion::V1_2);
    }

    #[test]
    fn builds_unverified_context() {
        let cfg = LegacyTlsConfig::new(false, TlsVersion::V1_0);
        let builder = cfg.connector_builder().unwrap();
        assert!(builder.options().contains(legacy_server_connect()));
        let ctx = builder.build().into_context();
        assert_eq!(ctx.verify_mode(), SslVerifyMode::NONE);
    }

    #[test]
    fn builds_verified_context() {
        let cfg = LegacyTlsConfig::new(true, TlsVersion::V1_2);
        let ctx = cfg.connector_builder().unwrap().build().into_context();
        assert!(ctx.verify_mode().contains(SslVerifyMode::PEER));
    }
}
