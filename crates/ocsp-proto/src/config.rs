//! Configuration types for OCSP status fetching
//!
//! [`OcspConfig`] is the serializable form loaded from disk; it converts into
//! the per-component option structs used by the request builder, the
//! transport and the validator.

use crate::error::ConfigError;
use crate::request::{HashAlgorithm, RequestOptions};
use crate::response::ValidationOptions;
use crate::transport::TransportOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// OCSP client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OcspConfig {
    /// HTTP request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Maximum OCSP response size in bytes (default 1 MB)
    ///
    /// Protects against memory exhaustion from misbehaving responders.
    #[serde(default = "default_max_response_size")]
    pub max_response_size_bytes: usize,

    /// Skip TLS certificate validation for HTTPS responder URLs
    ///
    /// **Security Note**: Only the transport connection is affected. OCSP
    /// response signatures are always verified.
    #[serde(default)]
    pub accept_invalid_tls_certs: bool,

    /// Send a nonce extension for replay protection
    #[serde(default = "default_true")]
    pub include_nonce: bool,

    /// What to do when a sent nonce is not echoed back
    #[serde(default)]
    pub nonce_policy: NoncePolicy,

    /// Hash algorithm for the CertID
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
}

impl OcspConfig {
    /// Create a new OCSP configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file; missing fields take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            hash_algorithm: self.hash_algorithm,
            include_nonce: self.include_nonce,
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            nonce_policy: self.nonce_policy,
        }
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: Duration::from_secs(self.http_timeout_secs),
            accept_invalid_tls_certs: self.accept_invalid_tls_certs,
            max_response_size: self.max_response_size_bytes,
        }
    }
}

impl Default for OcspConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            max_response_size_bytes: default_max_response_size(),
            accept_invalid_tls_certs: false,
            include_nonce: true,
            nonce_policy: NoncePolicy::default(),
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

/// Nonce enforcement policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoncePolicy {
    /// Reject responses that do not echo the nonce
    Require,

    /// Log a warning and accept responses without a matching nonce
    ///
    /// Many public responders serve pre-generated responses and never echo
    /// nonces (RFC 5019).
    #[default]
    Warn,
}

// Default value functions for serde

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    10 // 10 seconds
}

fn default_max_response_size() -> usize {
    1024 * 1024 // 1 MB
}
