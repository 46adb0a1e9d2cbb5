//! OCSP response decoding and validation (RFC 6960 Section 4.2)
//!
//! ```asn1
//! OCSPResponse ::= SEQUENCE {
//!     responseStatus      OCSPResponseStatus,
//!     responseBytes       [0] EXPLICIT ResponseBytes OPTIONAL
//! }
//!
//! ResponseBytes ::= SEQUENCE {
//!     responseType        OBJECT IDENTIFIER,
//!     response            OCTET STRING
//! }
//!
//! BasicOCSPResponse ::= SEQUENCE {
//!     tbsResponseData     ResponseData,
//!     signatureAlgorithm  AlgorithmIdentifier,
//!     signature           BIT STRING,
//!     certs               [0] EXPLICIT SEQUENCE OF Certificate OPTIONAL
//! }
//!
//! ResponseData ::= SEQUENCE {
//!     version             [0] EXPLICIT Version DEFAULT v1,
//!     responderID         ResponderID,
//!     producedAt          GeneralizedTime,
//!     responses           SEQUENCE OF SingleResponse,
//!     responseExtensions  [1] EXPLICIT Extensions OPTIONAL
//! }
//!
//! ResponderID ::= CHOICE {
//!     byName              [1] Name,
//!     byKey               [2] KeyHash
//! }
//!
//! SingleResponse ::= SEQUENCE {
//!     certID              CertID,
//!     certStatus          CertStatus,
//!     thisUpdate          GeneralizedTime,
//!     nextUpdate          [0] EXPLICIT GeneralizedTime OPTIONAL,
//!     singleExtensions    [1] EXPLICIT Extensions OPTIONAL
//! }
//!
//! CertStatus ::= CHOICE {
//!     good                [0] IMPLICIT NULL,
//!     revoked             [1] IMPLICIT RevokedInfo,
//!     unknown             [2] IMPLICIT UnknownInfo
//! }
//! ```
//!
//! # Validation order
//!
//! [`validate`] runs the checks below in order and stops at the first
//! failure. Nothing from the payload is trusted before step 4 succeeds.
//!
//! 1. Decode the envelope
//! 2. Reject non-successful `responseStatus`
//! 3. Decode the basic response
//! 4. Authorize the signer and verify the signature
//! 5. Match the CertID that was sent
//! 6. Check the nonce echo
//! 7. Check `thisUpdate` / `nextUpdate` against the clock
//! 8. Map the certificate status

use crate::asn1::{self, oid, oid_is};
use crate::certificate::{Certificate, SerialNumber};
use crate::config::NoncePolicy;
use crate::error::{ResponderStatusError, ValidationError};
use crate::request::{nonce_from_extension_value, CertId, HashAlgorithm, StatusRequest};
use crate::signature;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Result, BERReader, Tag};

/// OCSP response status (RFC 6960 Section 4.2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcspResponseStatus {
    /// Response has valid confirmations
    Successful = 0,
    /// Illegal confirmation request
    MalformedRequest = 1,
    /// Internal error in issuer
    InternalError = 2,
    /// Try again later
    TryLater = 3,
    /// Must sign the request
    SigRequired = 5,
    /// Request unauthorized
    Unauthorized = 6,
}

impl OcspResponseStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Successful),
            1 => Some(Self::MalformedRequest),
            2 => Some(Self::InternalError),
            3 => Some(Self::TryLater),
            5 => Some(Self::SigRequired),
            6 => Some(Self::Unauthorized),
            _ => None,
        }
    }

    /// The protocol error this status represents, `None` for success
    pub fn error(self) -> Option<ResponderStatusError> {
        match self {
            Self::Successful => None,
            Self::MalformedRequest => Some(ResponderStatusError::MalformedRequest),
            Self::InternalError => Some(ResponderStatusError::InternalError),
            Self::TryLater => Some(ResponderStatusError::TryLater),
            Self::SigRequired => Some(ResponderStatusError::SignatureRequired),
            Self::Unauthorized => Some(ResponderStatusError::Unauthorized),
        }
    }
}

/// CRLReason (RFC 5280 Section 5.3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
    /// Code outside the RFC 5280 enumeration (including the unused value 7)
    Unrecognized(i64),
}

impl RevocationReason {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Unspecified,
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            other => Self::Unrecognized(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Unspecified => 0,
            Self::KeyCompromise => 1,
            Self::CaCompromise => 2,
            Self::AffiliationChanged => 3,
            Self::Superseded => 4,
            Self::CessationOfOperation => 5,
            Self::CertificateHold => 6,
            Self::RemoveFromCrl => 8,
            Self::PrivilegeWithdrawn => 9,
            Self::AaCompromise => 10,
            Self::Unrecognized(code) => code,
        }
    }

    /// ASN.1 name of the reason, `None` for unrecognized codes
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::Unspecified => "unspecified",
            Self::KeyCompromise => "keyCompromise",
            Self::CaCompromise => "cACompromise",
            Self::AffiliationChanged => "affiliationChanged",
            Self::Superseded => "superseded",
            Self::CessationOfOperation => "cessationOfOperation",
            Self::CertificateHold => "certificateHold",
            Self::RemoveFromCrl => "removeFromCRL",
            Self::PrivilegeWithdrawn => "privilegeWithdrawn",
            Self::AaCompromise => "aACompromise",
            Self::Unrecognized(_) => return None,
        };
        Some(name)
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "unrecognized ({})", self.code()),
        }
    }
}

impl Serialize for RevocationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Certificate status reported by the responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CertificateStatus {
    /// Certificate is not revoked
    Good,
    /// Certificate has been revoked
    Revoked {
        revoked_at: DateTime<Utc>,
        reason: Option<RevocationReason>,
    },
    /// Responder does not know the certificate
    Unknown,
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => f.write_str("good"),
            Self::Revoked { .. } => f.write_str("revoked"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// A validated OCSP answer for one certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: CertificateStatus,
    pub serial_number: SerialNumber,
    pub produced_at: DateTime<Utc>,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    /// Responder the answer came from; set by the fetch orchestrator
    pub responder_url: Option<String>,
    /// A nonce was sent and the responder echoed it unchanged
    pub nonce_verified: bool,
}

impl StatusResponse {
    pub fn is_good(&self) -> bool {
        self.status == CertificateStatus::Good
    }

    pub fn is_revoked(&self) -> bool {
        matches!(self.status, CertificateStatus::Revoked { .. })
    }
}

/// Knobs for [`validate`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    pub nonce_policy: NoncePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResponderId {
    ByName(Vec<u8>),
    ByKey(Vec<u8>),
}

impl ResponderId {
    fn matches(&self, cert: &Certificate) -> bool {
        match self {
            Self::ByName(name) => name.as_slice() == cert.subject().der(),
            Self::ByKey(key_hash) => {
                *key_hash == HashAlgorithm::Sha1.digest(cert.public_key().key_bytes())
            }
        }
    }
}

#[derive(Debug, Clone)]
struct SingleResponse {
    /// `None` when the entry uses a hash algorithm we never request with
    cert_id: Option<CertId>,
    status: CertificateStatus,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct ResponseData {
    responder_id: ResponderId,
    produced_at: DateTime<Utc>,
    responses: Vec<SingleResponse>,
    extensions: Vec<asn1::Extension>,
}

#[derive(Debug, Clone)]
struct BasicResponse {
    tbs_der: Vec<u8>,
    data: ResponseData,
    signature_algorithm: ObjectIdentifier,
    signature: Vec<u8>,
    certs: Vec<Certificate>,
}

/// Validate a raw OCSP response against the request that produced it
///
/// Uses the current system time for the freshness check.
pub fn validate(
    raw: &[u8],
    issuer: &Certificate,
    request: &StatusRequest,
    options: &ValidationOptions,
) -> Result<StatusResponse, ValidationError> {
    validate_at(raw, issuer, request, options, Utc::now())
}

/// Validate a raw OCSP response at an explicit point in time
pub fn validate_at(
    raw: &[u8],
    issuer: &Certificate,
    request: &StatusRequest,
    options: &ValidationOptions,
    now: DateTime<Utc>,
) -> Result<StatusResponse, ValidationError> {
    // 1. Envelope
    let (status_code, response_bytes) = yasna::parse_der(raw, read_envelope)
        .map_err(|e| ValidationError::Malformed(format!("invalid OCSPResponse: {}", e)))?;

    // 2. Response status
    let status = u8::try_from(status_code)
        .ok()
        .and_then(OcspResponseStatus::from_u8)
        .ok_or_else(|| {
            ValidationError::Malformed(format!("unassigned response status {}", status_code))
        })?;
    if let Some(error) = status.error() {
        return Err(ValidationError::Protocol(error));
    }

    // 3. Basic response
    let (response_type, response) = response_bytes.ok_or_else(|| {
        ValidationError::Malformed("successful response without responseBytes".to_string())
    })?;
    if !oid_is(&response_type, oid::OCSP_BASIC) {
        return Err(ValidationError::Malformed(format!(
            "unsupported response type {}",
            asn1::dotted(&response_type)
        )));
    }
    let basic = decode_basic_response(&response)?;

    tracing::debug!(
        responses = basic.data.responses.len(),
        certs = basic.certs.len(),
        produced_at = %basic.data.produced_at,
        "Decoded basic OCSP response"
    );
    for ext in &basic.data.extensions {
        if ext.critical && !oid_is(&ext.id, oid::OCSP_NONCE) {
            tracing::debug!(extension = %asn1::dotted(&ext.id), "Ignoring critical response extension");
        }
    }

    // 4. Signer and signature
    let signer = resolve_signer(&basic, issuer, now)?;
    signature::verify_signed_data(
        signer.public_key(),
        &basic.signature_algorithm,
        &basic.tbs_der,
        &basic.signature,
    )
    .map_err(|e| ValidationError::SignatureInvalid(e.to_string()))?;

    // 5. CertID
    let single = basic
        .data
        .responses
        .iter()
        .find(|single| single.cert_id.as_ref() == Some(request.cert_id()))
        .ok_or(ValidationError::CertIdMismatch)?;

    // 6. Nonce
    let nonce_verified = check_nonce(&basic.data.extensions, request, options.nonce_policy)?;

    // 7. Freshness
    if now < single.this_update {
        return Err(ValidationError::StaleOrNotYetValid(format!(
            "thisUpdate {} is in the future",
            single.this_update
        )));
    }
    if let Some(next_update) = single.next_update {
        if now > next_update {
            return Err(ValidationError::StaleOrNotYetValid(format!(
                "nextUpdate {} has passed",
                next_update
            )));
        }
    }

    // 8. Status
    Ok(StatusResponse {
        status: single.status.clone(),
        serial_number: request.cert_id().serial_number.clone(),
        produced_at: basic.data.produced_at,
        this_update: single.this_update,
        next_update: single.next_update,
        responder_url: None,
        nonce_verified,
    })
}

/// Pick the certificate whose key must have signed the response
fn resolve_signer<'a>(
    basic: &'a BasicResponse,
    issuer: &'a Certificate,
    now: DateTime<Utc>,
) -> Result<&'a Certificate, ValidationError> {
    let responder_id = &basic.data.responder_id;
    if responder_id.matches(issuer) {
        return Ok(issuer);
    }

    let delegate = basic
        .certs
        .iter()
        .find(|cert| responder_id.matches(cert))
        .ok_or_else(|| {
            ValidationError::SignatureInvalid(
                "responder is neither the issuer nor an included certificate".to_string(),
            )
        })?;

    delegate.verify_issued_by(issuer).map_err(|e| {
        ValidationError::SignatureInvalid(format!(
            "responder certificate {} not issued by {}: {}",
            delegate.subject(),
            issuer.subject(),
            e
        ))
    })?;
    if !delegate.is_ocsp_signer() {
        return Err(ValidationError::SignatureInvalid(format!(
            "responder certificate {} is not authorized for OCSP signing",
            delegate.subject()
        )));
    }
    if !delegate.is_valid_at(now) {
        return Err(ValidationError::SignatureInvalid(format!(
            "responder certificate {} is outside its validity period",
            delegate.subject()
        )));
    }

    tracing::debug!(responder = %delegate.subject(), "Using delegated OCSP responder");
    Ok(delegate)
}

/// Returns whether the nonce was echoed
fn check_nonce(
    extensions: &[asn1::Extension],
    request: &StatusRequest,
    policy: NoncePolicy,
) -> Result<bool, ValidationError> {
    let Some(sent) = request.nonce() else {
        return Ok(false);
    };

    let echoed = extensions
        .iter()
        .find(|ext| oid_is(&ext.id, oid::OCSP_NONCE))
        .map(|ext| nonce_from_extension_value(&ext.value));

    let problem = match echoed {
        Some(nonce) if nonce == sent => return Ok(true),
        Some(_) => "responder echoed a different nonce",
        None => "responder did not echo the nonce",
    };

    match policy {
        NoncePolicy::Require => Err(ValidationError::NonceMismatch(problem.to_string())),
        NoncePolicy::Warn => {
            tracing::warn!("{}; accepting response without replay protection", problem);
            Ok(false)
        }
    }
}

type ResponseBytes = (ObjectIdentifier, Vec<u8>);

fn read_envelope(reader: BERReader) -> ASN1Result<(i64, Option<ResponseBytes>)> {
    reader.read_sequence(|reader| {
        let status = reader.next().read_enum()?;
        let bytes = reader.read_optional(|reader| {
            reader.read_tagged(Tag::context(0), |reader| {
                reader.read_sequence(|reader| {
                    let response_type = reader.next().read_oid()?;
                    let response = reader.next().read_bytes()?;
                    Ok((response_type, response))
                })
            })
        })?;
        Ok((status, bytes))
    })
}

fn decode_basic_response(der: &[u8]) -> Result<BasicResponse, ValidationError> {
    let (tbs_der, signature_algorithm, signature, cert_ders) = yasna::parse_der(der, |reader| {
        reader.read_sequence(|reader| {
            let tbs_der = reader.next().read_der()?;
            let signature_algorithm = asn1::read_algorithm_identifier(reader.next())?;
            let (signature, _) = reader.next().read_bitvec_bytes()?;
            let certs = reader.read_optional(|reader| {
                reader.read_tagged(Tag::context(0), |reader| {
                    let mut certs = Vec::new();
                    reader.read_sequence_of(|reader| {
                        certs.push(reader.read_der()?);
                        Ok(())
                    })?;
                    Ok(certs)
                })
            })?;
            Ok((tbs_der, signature_algorithm, signature, certs.unwrap_or_default()))
        })
    })
    .map_err(|e| ValidationError::Malformed(format!("invalid BasicOCSPResponse: {}", e)))?;

    let data = yasna::parse_der(&tbs_der, read_response_data)
        .map_err(|e| ValidationError::Malformed(format!("invalid ResponseData: {}", e)))?;

    let certs = cert_ders
        .iter()
        .map(|der| Certificate::from_der(der))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ValidationError::Malformed(format!("invalid responder certificate: {}", e)))?;

    Ok(BasicResponse {
        tbs_der,
        data,
        signature_algorithm,
        signature,
        certs,
    })
}

fn read_response_data(reader: BERReader) -> ASN1Result<ResponseData> {
    reader.read_sequence(|reader| {
        reader.read_optional(|reader| {
            reader.read_tagged(Tag::context(0), |reader| reader.read_u8())
        })?;

        let by_name = reader.read_optional(|reader| {
            reader.read_tagged(Tag::context(1), |reader| reader.read_der())
        })?;
        let responder_id = match by_name {
            Some(name) => ResponderId::ByName(name),
            None => ResponderId::ByKey(
                reader
                    .next()
                    .read_tagged(Tag::context(2), |reader| reader.read_bytes())?,
            ),
        };

        let produced_at = asn1::read_generalized_time(reader.next())?;

        let mut responses = Vec::new();
        reader.next().read_sequence_of(|reader| {
            responses.push(read_single_response(reader)?);
            Ok(())
        })?;

        let extensions = reader.read_optional(|reader| {
            reader.read_tagged(Tag::context(1), asn1::read_extensions)
        })?;

        Ok(ResponseData {
            responder_id,
            produced_at,
            responses,
            extensions: extensions.unwrap_or_default(),
        })
    })
}

fn read_single_response(reader: BERReader) -> ASN1Result<SingleResponse> {
    reader.read_sequence(|reader| {
        let cert_id = CertId::read(reader.next())?;

        let good = reader.read_optional(|reader| {
            reader.read_tagged_implicit(Tag::context(0), |reader| reader.read_null())
        })?;
        let status = if good.is_some() {
            CertificateStatus::Good
        } else if let Some((revoked_at, reason)) = reader.read_optional(|reader| {
            reader.read_tagged_implicit(Tag::context(1), |reader| {
                reader.read_sequence(|reader| {
                    let revoked_at = asn1::read_generalized_time(reader.next())?;
                    let reason = reader.read_optional(|reader| {
                        reader.read_tagged(Tag::context(0), |reader| reader.read_enum())
                    })?;
                    Ok((revoked_at, reason))
                })
            })
        })? {
            CertificateStatus::Revoked {
                revoked_at,
                reason: reason.map(RevocationReason::from_code),
            }
        } else {
            reader
                .next()
                .read_tagged_implicit(Tag::context(2), |reader| reader.read_null())?;
            CertificateStatus::Unknown
        };

        let this_update = asn1::read_generalized_time(reader.next())?;
        let next_update = reader.read_optional(|reader| {
            reader.read_tagged(Tag::context(0), asn1::read_generalized_time)
        })?;
        // singleExtensions are not interpreted
        reader.read_optional(|reader| {
            reader.read_tagged(Tag::context(1), |reader| reader.read_der())
        })?;

        Ok(SingleResponse {
            cert_id,
            status,
            this_update,
            next_update,
        })
    })
}
