//! OCSP Client Implementation
//!
//! This crate asks OCSP responders (RFC 6960) whether an X.509 certificate
//! has been revoked and only reports an answer once it has been
//! authenticated.
//!
//! # Features
//!
//! - PEM/DER certificate decoding with AIA responder URL extraction
//! - Unsigned OCSP request encoding with optional nonce (RFC 8954)
//! - HTTP POST transport with size limits and timeouts
//! - Response validation: signer authorization, signature, CertID match,
//!   nonce echo and freshness window
//! - Ordered fallback across every responder the certificate advertises
//!
//! # Example
//!
//! ```no_run
//! use ocsp_proto::{Certificate, OcspConfig, OcspFetcher, HttpTransport};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let subject = Certificate::parse(&std::fs::read("leaf.pem")?)?;
//! let issuer = Certificate::parse(&std::fs::read("issuer.pem")?)?;
//!
//! let config = OcspConfig::default();
//! let transport = HttpTransport::new(&config.transport_options())?;
//! let fetcher = OcspFetcher::new(transport, &config);
//!
//! let response = fetcher.fetch_status(&subject, &issuer)?;
//! if response.is_revoked() {
//!     println!("certificate {} is revoked", response.serial_number);
//! }
//! # Ok(())
//! # }
//! ```

pub mod asn1;
pub mod certificate;
pub mod config;
pub mod error;
pub mod fetch;
pub mod request;
pub mod response;
pub mod signature;
pub mod transport;

pub use certificate::{Certificate, DistinguishedName, PublicKeyInfo, SerialNumber};
pub use config::{NoncePolicy, OcspConfig};
pub use error::{
    AllRespondersFailedError, ConfigError, DecodeError, ResponderError, ResponderFailure,
    ResponderStatusError, TransportError, ValidationError,
};
pub use fetch::{fetch_status, OcspFetcher, ResponderOutcome};
pub use request::{CertId, HashAlgorithm, RequestOptions, StatusRequest, NONCE_LEN};
pub use response::{
    validate, validate_at, CertificateStatus, OcspResponseStatus, RevocationReason,
    StatusResponse, ValidationOptions,
};
pub use signature::SignatureError;
pub use transport::{HttpTransport, Transport, TransportOptions};
