//! Error types for virtual host discovery and TLS certificate checks.
//!
//! Discovery errors describe configuration files that could not be read or
//! parsed. Certificate errors describe failures talking to a TLS endpoint and
//! are kept distinct so callers can tell DNS, connection and handshake
//! problems apart.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::discovery::Dialect;

/// Error type for TLS certificate validation failures.
///
/// This error is returned when certificate checking fails due to connection issues,
/// invalid certificates, or other validation problems.
#[derive(Debug, Error)]
pub enum TLSValidationError {
    /// DNS resolution failed for the given hostname
    #[error(
        "Failed to resolve hostname: {hostname}. Check that the hostname is spelled correctly and your DNS configuration is working."
    )]
    DnsResolution {
        /// The hostname that failed to resolve
        hostname: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TCP connection failed to the target address
    #[error("Connection failed to: {address}. Verify the host is running a TLS service and is reachable.")]
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TLS handshake failed
    #[error("TLS handshake failed: {details}")]
    HandshakeFailed {
        /// Details about why the handshake failed
        details: String,
    },

    /// Certificate parsing or validation error
    #[error("Certificate error: {reason}")]
    CertificateError {
        /// Description of what went wrong
        reason: String,
    },

    /// Network operation timeout
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// Description of which operation timed out
        operation: String,
    },

    /// Invalid input provided to the API
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Which field/parameter was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },

    /// OpenSSL error occurred
    #[error("OpenSSL error: {details}")]
    OpenSSLError {
        /// The underlying OpenSSL error
        details: String,
    },

    /// Generic I/O error
    #[error("I/O error: {source}")]
    IoError {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl From<io::Error> for TLSValidationError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout {
                operation: e.to_string(),
            },
            _ => Self::IoError { source: e },
        }
    }
}

impl From<openssl::error::ErrorStack> for TLSValidationError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::OpenSSLError {
            details: e.to_string(),
        }
    }
}

impl<S: std::fmt::Debug> From<openssl::ssl::HandshakeError<S>> for TLSValidationError {
    fn from(e: openssl::ssl::HandshakeError<S>) -> Self {
        Self::HandshakeFailed {
            details: format!("{}", e),
        }
    }
}

/// Error raised while discovering virtual hosts in a configuration root.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The configuration root exists but could not be listed
    #[error("failed to list {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A configuration file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration text is structurally broken (unbalanced braces,
    /// unterminated blocks, ...)
    #[error("malformed {dialect} configuration at line {line}: {reason}")]
    Malformed {
        dialect: Dialect,
        /// 1-based line number where the problem was detected
        line: usize,
        reason: String,
    },
}
