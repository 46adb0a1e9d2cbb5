//! OCSP status fetching with responder fallback
//!
//! The orchestrator builds one request per call and walks the subject's
//! responder URLs in certificate order. The first response that passes
//! validation wins; every failure on the way is kept so that a total failure
//! reports each URL with its own reason.
//!
//! ```no_run
//! use ocsp_proto::{fetch_status, Certificate, OcspConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let subject = Certificate::parse(&std::fs::read("leaf.pem")?)?;
//! let issuer = Certificate::parse(&std::fs::read("issuer.pem")?)?;
//!
//! let response = fetch_status(&subject, &issuer, &OcspConfig::default())?;
//! println!("{}: {}", response.serial_number, response.status);
//! # Ok(())
//! # }
//! ```

use crate::certificate::Certificate;
use crate::config::OcspConfig;
use crate::error::{AllRespondersFailedError, ResponderError, ResponderFailure};
use crate::request::{RequestOptions, StatusRequest};
use crate::response::{self, StatusResponse, ValidationOptions};
use crate::transport::{HttpTransport, Transport};
use chrono::{DateTime, Utc};

/// Result of querying a single responder URL
pub type ResponderOutcome = Result<StatusResponse, ResponderFailure>;

/// Fetches certificate status through a [`Transport`]
#[derive(Debug, Clone)]
pub struct OcspFetcher<T> {
    transport: T,
    request_options: RequestOptions,
    validation_options: ValidationOptions,
}

impl<T: Transport> OcspFetcher<T> {
    /// Create a fetcher using the request and validation settings of `config`
    pub fn new(transport: T, config: &OcspConfig) -> Self {
        Self::with_options(
            transport,
            config.request_options(),
            config.validation_options(),
        )
    }

    pub fn with_options(
        transport: T,
        request_options: RequestOptions,
        validation_options: ValidationOptions,
    ) -> Self {
        Self {
            transport,
            request_options,
            validation_options,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch the OCSP status of `subject`
    ///
    /// # Errors
    ///
    /// * `AllRespondersFailedError::NoResponders` - the subject advertises no
    ///   OCSP URL; the transport is not used
    /// * `AllRespondersFailedError::AllFailed` - every URL failed, failures in
    ///   URL order
    pub fn fetch_status(
        &self,
        subject: &Certificate,
        issuer: &Certificate,
    ) -> Result<StatusResponse, AllRespondersFailedError> {
        self.fetch_status_at(subject, issuer, Utc::now())
    }

    /// Like [`fetch_status`](Self::fetch_status) with an explicit validation clock
    pub fn fetch_status_at(
        &self,
        subject: &Certificate,
        issuer: &Certificate,
        now: DateTime<Utc>,
    ) -> Result<StatusResponse, AllRespondersFailedError> {
        let urls = subject.ocsp_urls();
        if urls.is_empty() {
            return Err(AllRespondersFailedError::NoResponders);
        }

        if subject.issuer().der() != issuer.subject().der() {
            tracing::warn!(
                subject_issuer = %subject.issuer(),
                issuer = %issuer.subject(),
                "Certificate issuer does not match the provided issuer certificate"
            );
        }

        let request = StatusRequest::build(subject, issuer, &self.request_options);
        let encoded = request.to_der();
        tracing::debug!(bytes = encoded.len(), responders = urls.len(), "Encoded OCSP request");

        let mut failures = Vec::with_capacity(urls.len());
        for url in urls {
            match self.query(url, &encoded, &request, issuer, now) {
                Ok(response) => {
                    tracing::info!(url = %url, status = %response.status, "OCSP status received");
                    return Ok(response);
                }
                Err(failure) => {
                    tracing::warn!(url = %url, error = %failure.error, "OCSP responder failed");
                    failures.push(failure);
                }
            }
        }

        Err(AllRespondersFailedError::AllFailed(failures))
    }

    fn query(
        &self,
        url: &str,
        encoded: &[u8],
        request: &StatusRequest,
        issuer: &Certificate,
        now: DateTime<Utc>,
    ) -> ResponderOutcome {
        tracing::info!(url, "Querying OCSP responder");

        let attempt = || -> Result<StatusResponse, ResponderError> {
            let raw = self.transport.send(url, encoded)?;
            let mut response =
                response::validate_at(&raw, issuer, request, &self.validation_options, now)?;
            response.responder_url = Some(url.to_string());
            Ok(response)
        };

        attempt().map_err(|error| ResponderFailure {
            url: url.to_string(),
            error,
        })
    }
}

/// Fetch the OCSP status of `subject` over HTTP using `config`
///
/// # Errors
///
/// In addition to the errors of [`OcspFetcher::fetch_status`],
/// `AllRespondersFailedError::Transport` when the HTTP client cannot be
/// built. The responder list is checked first, so a certificate without
/// responders never constructs a client.
pub fn fetch_status(
    subject: &Certificate,
    issuer: &Certificate,
    config: &OcspConfig,
) -> Result<StatusResponse, AllRespondersFailedError> {
    if subject.ocsp_urls().is_empty() {
        return Err(AllRespondersFailedError::NoResponders);
    }

    let transport = HttpTransport::new(&config.transport_options())
        .map_err(AllRespondersFailedError::Transport)?;
    OcspFetcher::new(transport, config).fetch_status(subject, issuer)
}
