//! SSL certificate monitoring for Zabbix.
//!
//! The crate discovers TLS virtual hosts declared in Nginx and Apache
//! configuration directories and reports them in the Zabbix low-level
//! discovery format. It can also connect to a host and report the issuer and
//! remaining validity of the certificate it serves.
//!
//! ```no_run
//! use std::path::Path;
//! use zabbix_ssl::{discover_ssl_servers, DiscoveryReport};
//!
//! let discovery = discover_ssl_servers(Path::new("/etc/nginx/"), Path::new("/etc/apache"));
//! let report = DiscoveryReport::from_servers(&discovery.servers);
//! println!("{}", report.to_json()?);
//! # Ok::<(), serde_json::Error>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod server;
pub mod zabbix;

use std::net::{TcpStream, ToSocketAddrs};
use std::ops::Deref;
use std::time::Duration;

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::nid::Nid;
use openssl::ssl::{SslConnector, SslMethod};
use openssl::x509::{X509NameRef, X509};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use discovery::{discover_ssl_servers, ConfigDialect, Dialect, Discovery, FileFailure};
pub use error::{DiscoveryError, TLSValidationError};
pub use server::{Block, Directive, Server};
pub use zabbix::{DiscoveryItem, DiscoveryReport};

/// Default connect/read timeout for certificate checks.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Certificate details retrieved from a live TLS endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub hostname: String,
    pub port: u16,
    /// Common name of the subject
    pub issued_domain: String,
    /// Common name of the issuer
    pub issued_by: String,
    pub valid_from: String,
    pub valid_to: String,
    /// Whole days until expiry, negative once expired
    pub validity_days: i32,
    pub is_expired: bool,
}

impl Certificate {
    /// Connects to `host:port`, performs a verified TLS handshake and reads
    /// the peer certificate.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - empty hostname or zero timeout
    /// * `DnsResolution` - the hostname does not resolve
    /// * `Timeout` / `ConnectionFailed` - TCP connection could not be made
    /// * `HandshakeFailed` - TLS negotiation or certificate verification failed
    /// * `CertificateError` - the server sent no usable certificate
    pub fn from(host: &str, port: u16, timeout: Duration) -> Result<Certificate, TLSValidationError> {
        if host.trim().is_empty() {
            return Err(TLSValidationError::InvalidInput {
                field: "hostname".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }
        if timeout.is_zero() {
            return Err(TLSValidationError::InvalidInput {
                field: "timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let remote = format!("{}:{}", host, port);
        let socket_addr = remote
            .to_socket_addrs()
            .map_err(|source| TLSValidationError::DnsResolution {
                hostname: host.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| TLSValidationError::DnsResolution {
                hostname: host.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses returned"),
            })?;

        debug!(%remote, %socket_addr, "connecting");
        let tcp_stream = TcpStream::connect_timeout(&socket_addr, timeout).map_err(|source| {
            if source.kind() == std::io::ErrorKind::TimedOut {
                TLSValidationError::Timeout {
                    operation: format!("connect to {}", remote),
                }
            } else {
                TLSValidationError::ConnectionFailed {
                    address: remote.clone(),
                    source,
                }
            }
        })?;
        tcp_stream.set_read_timeout(Some(timeout))?;
        tcp_stream.set_write_timeout(Some(timeout))?;

        let connector = SslConnector::builder(SslMethod::tls())?.build();
        let stream = connector.connect(host, tcp_stream)?;

        let x509_ref = stream
            .ssl()
            .peer_certificate()
            .ok_or_else(|| TLSValidationError::CertificateError {
                reason: "server did not present a certificate".to_string(),
            })?;

        get_certificate_info(host, port, &x509_ref)
    }
}

fn get_certificate_info(
    host: &str,
    port: u16,
    cert_ref: &X509,
) -> Result<Certificate, TLSValidationError> {
    Ok(Certificate {
        hostname: host.to_string(),
        port,
        issued_domain: common_name(cert_ref.subject_name())?,
        issued_by: common_name(cert_ref.issuer_name())?,
        valid_from: cert_ref.not_before().to_string(),
        valid_to: cert_ref.not_after().to_string(),
        validity_days: get_validity_days(cert_ref.not_after())?,
        is_expired: has_expired(cert_ref.not_after())?,
    })
}

fn common_name(name: &X509NameRef) -> Result<String, TLSValidationError> {
    let entry = name
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .ok_or_else(|| TLSValidationError::CertificateError {
            reason: "certificate name has no common name".to_string(),
        })?;
    Ok(entry.data().to_string()?)
}

fn get_validity_days(not_after: &Asn1TimeRef) -> Result<i32, TLSValidationError> {
    Ok(Asn1Time::days_from_now(0)?.deref().diff(not_after)?.days)
}

fn has_expired(not_after: &Asn1TimeRef) -> Result<bool, TLSValidationError> {
    Ok(not_after < Asn1Time::days_from_now(0)?)
}

/// Common name of the certificate issuer served at `hostname:port`.
pub fn get_issuer(hostname: &str, port: u16, timeout: Duration) -> Result<String, TLSValidationError> {
    Ok(Certificate::from(hostname, port, timeout)?.issued_by)
}

/// Days left before the certificate served at `hostname:port` expires.
pub fn get_validity(hostname: &str, port: u16, timeout: Duration) -> Result<i32, TLSValidationError> {
    Ok(Certificate::from(hostname, port, timeout)?.validity_days)
}
