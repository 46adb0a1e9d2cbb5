//! OCSP error types
//!
//! Each layer of the engine reports its own error type so that the fetch
//! orchestrator can record per-responder failures with their original
//! classification:
//!
//! - [`DecodeError`]: an input certificate (or request) could not be decoded
//! - [`TransportError`]: the HTTP exchange with a responder failed
//! - [`ValidationError`]: a responder answered, but the answer is unusable
//! - [`AllRespondersFailedError`]: no responder produced a usable answer

/// Errors raised while decoding certificates or encoded requests
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Input contained no certificate block
    #[error("no certificate found in input")]
    NoCertificateFound,

    /// Input failed ASN.1 structural parsing
    #[error("malformed encoding: {0}")]
    Malformed(String),
}

/// Errors raised by the HTTP transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection, TLS or timeout failure
    #[error("network error: {0}")]
    Network(String),

    /// Responder URL could not be used to build a request
    #[error("invalid responder URL: {0}")]
    InvalidUrl(String),

    /// Responder answered with a non-2xx status
    #[error("responder returned HTTP {0}")]
    HttpStatus(u16),

    /// Responder answered 2xx with no body
    #[error("responder returned an empty body")]
    EmptyBody,

    /// Response body exceeds the configured limit
    #[error("response size {0} bytes exceeds maximum {1} bytes")]
    ResponseTooLarge(usize, usize),

    /// HTTP client could not be constructed
    #[error("failed to create HTTP client: {0}")]
    Setup(String),
}

/// Non-successful `responseStatus` values (RFC 6960 Section 4.2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResponderStatusError {
    #[error("malformed request")]
    MalformedRequest,

    #[error("internal error")]
    InternalError,

    #[error("try later")]
    TryLater,

    #[error("signature required")]
    SignatureRequired,

    #[error("unauthorized")]
    Unauthorized,
}

/// Errors raised while validating a single OCSP response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Response failed structural decoding
    #[error("malformed OCSP response: {0}")]
    Malformed(String),

    /// Responder reported a protocol-level error status
    #[error("responder returned error status: {0}")]
    Protocol(ResponderStatusError),

    /// Signature or signer authorization check failed
    #[error("OCSP response signature invalid: {0}")]
    SignatureInvalid(String),

    /// No single response matches the CertID that was sent
    #[error("no response entry matches the requested certificate")]
    CertIdMismatch,

    /// Nonce was sent but not echoed, or echoed with a different value
    #[error("OCSP nonce mismatch: {0}")]
    NonceMismatch(String),

    /// Current time is outside `thisUpdate..=nextUpdate`
    #[error("OCSP response outside its validity window: {0}")]
    StaleOrNotYetValid(String),
}

/// Failure of one responder attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponderError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A responder URL together with the reason it could not be used
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{url}: {error}")]
pub struct ResponderFailure {
    pub url: String,
    pub error: ResponderError,
}

/// Aggregate failure of a status fetch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllRespondersFailedError {
    /// Subject certificate advertises no OCSP responder
    #[error("certificate does not advertise any OCSP responder")]
    NoResponders,

    /// Every advertised responder failed, in the order they were tried
    #[error("unable to fetch OCSP status from any responder:{}", list_failures(.0))]
    AllFailed(Vec<ResponderFailure>),

    /// The HTTP transport could not be set up
    #[error("unable to set up OCSP transport: {0}")]
    Transport(TransportError),
}

impl AllRespondersFailedError {
    /// Per-responder failures, empty unless every responder was tried
    pub fn failures(&self) -> &[ResponderFailure] {
        match self {
            Self::AllFailed(failures) => failures,
            _ => &[],
        }
    }
}

fn list_failures(failures: &[ResponderFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("\n  {}", failure))
        .collect()
}

/// Errors raised while loading an [`OcspConfig`](crate::config::OcspConfig)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
