//! HTTP endpoint prober with TLS certificate inspection

use crate::config::EndpointConfig;
use crate::errors::{MonitorError, Result};
use crate::status::{EndpointStatus, HealthState, round2};
use chrono::{DateTime, Utc};
use reqwest::Client;
use rustls::RootCertStore;
use rustls::pki_types::ServerName;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};
use x509_parser::prelude::*;

const TLS_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const TLS_PORT: u16 = 443;

/// Peer certificate facts gathered from a raw TLS handshake
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub valid: bool,
    pub expires: DateTime<Utc>,
}

/// Issues one health check against one endpoint
///
/// Probing never fails: every failure mode is captured as a classified
/// [`EndpointStatus`].
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
}

impl Prober {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .user_agent(format!("endpoint_monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self { client })
    }

    /// Probe one endpoint, classifying the outcome
    pub async fn probe(&self, endpoint: &EndpointConfig) -> EndpointStatus {
        let started_at = Utc::now();
        let timer = Instant::now();

        let response = self
            .client
            .get(&endpoint.url)
            .timeout(endpoint.timeout())
            .send()
            .await;

        match response {
            Ok(response) => {
                let elapsed_ms = round2(timer.elapsed().as_secs_f64() * 1000.0);
                let code = response.status().as_u16();

                let mut status = if code == endpoint.expected_status {
                    EndpointStatus::new(&endpoint.name, &endpoint.url, HealthState::Healthy, started_at)
                } else {
                    EndpointStatus::new(&endpoint.name, &endpoint.url, HealthState::Unhealthy, started_at)
                        .with_error(format!("expected {}, got {}", endpoint.expected_status, code))
                };
                status = status.with_status_code(code).with_response_time(elapsed_ms);

                if endpoint.check_ssl {
                    if let Some(host) = https_host(&endpoint.url) {
                        // Independent of the HTTP exchange, which may have
                        // reused a pooled connection.
                        match inspect_certificate(&host).await {
                            Ok(info) => {
                                status = status.with_ssl(info.valid, info.expires);
                            }
                            Err(e) => {
                                warn!("SSL check failed for {}: {}", host, e);
                            }
                        }
                    }
                }

                status
            }
            Err(e) if e.is_timeout() => {
                EndpointStatus::new(&endpoint.name, &endpoint.url, HealthState::Timeout, started_at)
                    .with_error("request timeout")
            }
            Err(e) => {
                debug!("Probe of {} failed: {}", endpoint.name, e);
                EndpointStatus::new(&endpoint.name, &endpoint.url, HealthState::Error, started_at)
                    .with_error(e.to_string())
            }
        }
    }
}

/// Host portion of an https URL, `None` for any other scheme
fn https_host(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    parsed.host_str().map(|h| h.to_string())
}

fn tls_config() -> Arc<rustls::ClientConfig> {
    static CONFIG: OnceLock<Arc<rustls::ClientConfig>> = OnceLock::new();

    CONFIG
        .get_or_init(|| {
            let mut roots = RootCertStore::empty();
            for cert in rustls_native_certs::load_native_certs().certs {
                let _ = roots.add(cert);
            }

            Arc::new(
                rustls::ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        })
        .clone()
}

/// Open a raw TLS connection to `host:443` and read the peer certificate's
/// validity window
pub async fn inspect_certificate(host: &str) -> Result<CertificateInfo> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| MonitorError::Tls(format!("invalid server name {}: {}", host, e)))?;

    let tcp = timeout(TLS_CHECK_TIMEOUT, TcpStream::connect((host, TLS_PORT)))
        .await
        .map_err(|_| MonitorError::Tls(format!("connect to {}:443 timed out", host)))??;

    let connector = TlsConnector::from(tls_config());
    let stream = timeout(TLS_CHECK_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| MonitorError::Tls(format!("TLS handshake with {} timed out", host)))?
        .map_err(|e| MonitorError::Tls(format!("TLS handshake with {} failed: {}", host, e)))?;

    let (_, session) = stream.get_ref();
    let peer_cert = session
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| MonitorError::Tls(format!("{} presented no certificate", host)))?;

    let (_, cert) = X509Certificate::from_der(peer_cert.as_ref())
        .map_err(|e| MonitorError::Tls(format!("cannot parse certificate from {}: {}", host, e)))?;

    let validity = cert.validity();
    let expires = DateTime::<Utc>::from_timestamp(validity.not_after.timestamp(), 0)
        .ok_or_else(|| MonitorError::Tls(format!("certificate from {} has no expiry", host)))?;

    Ok(CertificateInfo {
        valid: validity.is_valid(),
        expires,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(name: &str, url: &str) -> EndpointConfig {
        let mut endpoint = EndpointConfig::new(name, url);
        endpoint.check_ssl = false;
        endpoint
    }

    #[test]
    fn test_https_host_extraction() {
        assert_eq!(
            https_host("https://api.github.com/health"),
            Some("api.github.com".to_string())
        );
        assert_eq!(https_host("http://api.github.com"), None);
        assert_eq!(https_host("not a url"), None);
    }

    #[tokio::test]
    async fn test_probe_healthy_on_expected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = Prober::new().unwrap();
        let status = prober
            .probe(&endpoint("Test API", &format!("{}/health", server.uri())))
            .await;

        assert_eq!(status.name, "Test API");
        assert_eq!(status.state, HealthState::Healthy);
        assert_eq!(status.status_code, Some(200));
        assert!(status.response_time_ms.is_some());
        assert!(status.error.is_none());
        assert!(status.ssl_valid.is_none());
    }

    #[tokio::test]
    async fn test_probe_unhealthy_on_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let prober = Prober::new().unwrap();
        let status = prober.probe(&endpoint("Test API", &server.uri())).await;

        assert_eq!(status.state, HealthState::Unhealthy);
        assert_eq!(status.status_code, Some(500));
        assert_eq!(status.error.as_deref(), Some("expected 200, got 500"));
        // The exchange completed, so latency is still recorded
        assert!(status.response_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_probe_classifies_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let mut slow = endpoint("Slow API", &server.uri());
        slow.timeout_secs = 1;

        let prober = Prober::new().unwrap();
        let status = prober.probe(&slow).await;

        assert_eq!(status.state, HealthState::Timeout);
        assert_eq!(status.error.as_deref(), Some("request timeout"));
        assert!(status.response_time_ms.is_none());
        assert!(status.status_code.is_none());
    }

    #[tokio::test]
    async fn test_probe_classifies_connection_error() {
        // Nothing listens on port 1
        let prober = Prober::new().unwrap();
        let status = prober
            .probe(&endpoint("Dead API", "http://127.0.0.1:1/health"))
            .await;

        assert_eq!(status.state, HealthState::Error);
        assert!(status.error.is_some());
        assert!(status.status_code.is_none());
    }
}
