//! HTTPS transport for the Redfish API.
//! One pooled hyper client per host, with the legacy TLS context and Basic auth
//! applied to every request and a fixed per-request timeout.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use hyper::{Method, Request, Uri};
use hyper_openssl::client::legacy::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use tracing::{trace, warn};

use super::error::{RedfishError, Result};
use super::tls::LegacyTlsConfig;
use super::RedfishTransport;

/// Per-request timeout, covering connect, headers and body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type HttpsClient = Client<HttpsConnector<HttpConnector>, Empty<Bytes>>;

pub struct HttpsTransport {
    base: String,
    authorization: HeaderValue,
    verify_certificates: bool,
    insecure_notice_logged: AtomicBool,
    timeout: Duration,
    client: HttpsClient,
}

impl HttpsTransport {
    pub fn new(host: &str, username: &str, password: &str, tls: LegacyTlsConfig) -> Result<Self> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(REQUEST_TIMEOUT));

        let ssl = tls
            .connector_builder()
            .map_err(|e| RedfishError::Tls(format!("Failed to build TLS context: {}", e)))?;
        let mut https = HttpsConnector::with_connector(http, ssl)
            .map_err(|e| RedfishError::Tls(format!("Failed to build HTTPS connector: {}", e)))?;

        if !tls.verify_certificates {
            https.set_callback(|conf, _uri| {
                conf.set_verify_hostname(false);
                Ok(())
            });
        }

        let client = Client::builder(TokioExecutor::new()).build(https);

        Ok(Self {
            base: format!("https://{}", host),
            authorization: basic_auth(username, password)?,
            verify_certificates: tls.verify_certificates,
            insecure_notice_logged: AtomicBool::new(false),
            timeout: REQUEST_TIMEOUT,
            client,
        })
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn uri_for(&self, path: &str) -> Result<Uri> {
        // Fragments ("#/Fans/0") are resolved client-side, never sent.
        let path = path.split('#').next().unwrap_or_default();
        format!("{}{}", self.base, path)
            .parse::<Uri>()
            .map_err(|e| RedfishError::Unexpected(format!("Invalid URL for {}: {}", path, e)))
    }

    fn note_insecure_once(&self) {
        if !self.verify_certificates && !self.insecure_notice_logged.swap(true, Ordering::SeqCst) {
            warn!(
                "Certificate verification is disabled for {}; connections to this host are unverified",
                self.base
            );
        }
    }

    async fn send(&self, path: &str) -> Result<Value> {
        let uri = self.uri_for(path)?;
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| RedfishError::Unexpected(format!("Failed to build request: {}", e)))?;

        self.note_insecure_once();
        trace!("GET {}{}", self.base, path);

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| classify_client_error(path, &e))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| RedfishError::Connection(format!("Failed reading body of {}: {}", path, e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(RedfishError::http(status.as_u16(), path, &String::from_utf8_lossy(&body)));
        }

        serde_json::from_slice(&body).map_err(|source| RedfishError::InvalidJson {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl RedfishTransport for HttpsTransport {
    async fn get_json(&self, path: &str) -> Result<Value> {
        match tokio::time::timeout(self.timeout, self.send(path)).await {
            Ok(result) => result,
            Err(_) => Err(RedfishError::Timeout(path.to_string())),
        }
    }
}

fn basic_auth(username: &str, password: &str) -> Result<HeaderValue> {
    let encoded = STANDARD.encode(format!("{}:{}", username, password));
    let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))
        .map_err(|e| RedfishError::Unexpected(format!("Invalid credentials header: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Map a hyper client failure onto the TLS / timeout / connection taxonomy
/// by inspecting its source chain.
fn classify_client_error(path: &str, err: &hyper_util::client::legacy::Error) -> RedfishError {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if cause.downcast_ref::<openssl::ssl::Error>().is_some()
            || cause.downcast_ref::<openssl::error::ErrorStack>().is_some()
        {
            return RedfishError::Tls(format!("{}: {}", path, cause));
        }
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return RedfishError::Timeout(path.to_string());
            }
        }
        source = cause.source();
    }

    RedfishError::Connection(format!("{}: {}", path, describe_chain(err)))
}

fn describe_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redfish::tls::TlsVersion;
    use crate::redfish::validate::ValidationError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local(port: u16) -> HttpsTransport {
        HttpsTransport::new(
            &format!("127.0.0.1:{}", port),
            "admin",
            "password",
            LegacyTlsConfig::new(false, TlsVersion::V1_0),
        )
        .unwrap()
    }

    fn transport() -> HttpsTransport {
        HttpsTransport::new(
            "10.0.0.9",
            "admin",
            "password",
            LegacyTlsConfig::new(false, TlsVersion::V1_0),
        )
        .unwrap()
    }

    #[test]
    fn basic_auth_header_is_encoded_and_sensitive() {
        let header = basic_auth("admin", "password").unwrap();
        assert_eq!(header.to_str().unwrap(), "Basic YWRtaW46cGFzc3dvcmQ=");
        assert!(header.is_sensitive());
    }

    #[tokio::test]
    async fn uri_drops_fragment() {
        let t = transport();
        let uri = t.uri_for("/redfish/v1/Chassis/1/Thermal#/Fans/0").unwrap();
        assert_eq!(uri.to_string(), "https://10.0.0.9/redfish/v1/Chassis/1/Thermal");
    }

    #[tokio::test]
    async fn insecure_notice_is_per_instance() {
        let first = transport();
        let second = transport();
        first.note_insecure_once();
        assert!(first.insecure_notice_logged.load(Ordering::SeqCst));
        assert!(!second.insecure_notice_logged.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn plaintext_server_is_a_tls_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
        });

        let err = local(port).get_json("/redfish/v1/Chassis").await.unwrap_err();
        assert!(matches!(err, RedfishError::Tls(_)), "got {:?}", err);
        assert_eq!(ValidationError::from(&err), ValidationError::SslError);
    }

    #[tokio::test]
    async fn refused_connection_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = local(port).get_json("/redfish/v1/Chassis").await.unwrap_err();
        assert!(matches!(err, RedfishError::Connection(_)), "got {:?}", err);
        assert_eq!(ValidationError::from(&err), ValidationError::CannotConnect);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let transport = local(port).with_timeout(Duration::from_millis(300));
        let err = transport.get_json("/redfish/v1/Chassis").await.unwrap_err();
        assert!(matches!(err, RedfishError::Timeout(_)), "got {:?}", err);
        assert_eq!(ValidationError::from(&err), ValidationError::Timeout);
        server.abort();
    }
}
