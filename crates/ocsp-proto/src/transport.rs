//! HTTP transport for OCSP requests (RFC 6960 Appendix A)
//!
//! The [`Transport`] trait is the seam between the fetch orchestrator and the
//! network, so the orchestrator can be driven by an in-memory transport in
//! tests. [`HttpTransport`] is the production implementation on top of a
//! blocking `reqwest` client.

use crate::error::TransportError;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::io::Read;
use std::time::Duration;

const OCSP_REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";
const OCSP_RESPONSE_CONTENT_TYPE: &str = "application/ocsp-response";

/// Sends an encoded OCSP request and returns the raw response body
pub trait Transport {
    fn send(&self, url: &str, request: &[u8]) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, url: &str, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).send(url, request)
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// Whole-request timeout (connect, send and body read)
    pub timeout: Duration,
    /// Skip TLS certificate validation for HTTPS responders
    pub accept_invalid_tls_certs: bool,
    /// Largest accepted response body in bytes
    pub max_response_size: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            accept_invalid_tls_certs: false,
            max_response_size: 1024 * 1024,
        }
    }
}

/// OCSP over HTTP POST
///
/// The underlying client is reused across requests for connection pooling.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::blocking::Client,
    max_response_size: usize,
}

impl HttpTransport {
    /// Create a new HTTP transport
    ///
    /// # Errors
    ///
    /// `TransportError::Setup` if the TLS backend or client cannot be
    /// initialised.
    pub fn new(options: &TransportOptions) -> Result<Self, TransportError> {
        let http_client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_tls_certs)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        if options.accept_invalid_tls_certs {
            tracing::warn!("TLS certificate validation disabled for OCSP responders");
        }

        Ok(Self {
            http_client,
            max_response_size: options.max_response_size,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, url: &str, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let response = self
            .http_client
            .post(url)
            .header(CONTENT_TYPE, OCSP_REQUEST_CONTENT_TYPE)
            .header(ACCEPT, OCSP_RESPONSE_CONTENT_TYPE)
            .body(request.to_vec())
            .send()
            .map_err(|e| {
                if e.is_builder() {
                    TransportError::InvalidUrl(url.to_string())
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        match response.headers().get(CONTENT_TYPE).map(|value| value.to_str()) {
            Some(Ok(content_type)) if content_type.starts_with(OCSP_RESPONSE_CONTENT_TYPE) => {}
            other => {
                tracing::warn!(
                    url,
                    content_type = ?other.and_then(Result::ok),
                    "Unexpected OCSP response Content-Type"
                );
            }
        }

        // Refuse early when the advertised length is already too large
        if let Some(length) = response.content_length() {
            let length = usize::try_from(length).unwrap_or(usize::MAX);
            if length > self.max_response_size {
                return Err(TransportError::ResponseTooLarge(length, self.max_response_size));
            }
        }

        let limit = u64::try_from(self.max_response_size)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let mut body = Vec::new();
        response
            .take(limit)
            .read_to_end(&mut body)
            .map_err(|e| TransportError::Network(format!("failed to read response body: {}", e)))?;

        if body.len() > self.max_response_size {
            return Err(TransportError::ResponseTooLarge(body.len(), self.max_response_size));
        }
        if body.is_empty() {
            return Err(TransportError::EmptyBody);
        }

        tracing::debug!(url, bytes = body.len(), "Received OCSP response");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_options_default() {
        let options = TransportOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert!(!options.accept_invalid_tls_certs);
        assert_eq!(options.max_response_size, 1024 * 1024);
    }

    #[test]
    fn test_http_transport_creation() {
        assert!(HttpTransport::new(&TransportOptions::default()).is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let transport = HttpTransport::new(&TransportOptions::default()).unwrap();
        let result = transport.send("not a url", &[0x30, 0x00]);
        assert_eq!(result, Err(TransportError::InvalidUrl("not a url".to_string())));
    }
}
