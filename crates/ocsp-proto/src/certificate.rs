//! Certificate model
//!
//! Owned, immutable view of an X.509 certificate holding exactly what the
//! OCSP engine needs: names (display form and raw DER), serial number,
//! public key, validity, signature over the TBS bytes, the OCSP signing
//! extended key usage, and the OCSP responder URLs from the Authority
//! Information Access extension.
//!
//! Decoding is delegated to `x509-parser`. No IO happens here; callers hand
//! over bytes they acquired elsewhere.
//!
//! # Example
//!
//! ```no_run
//! use ocsp_proto::Certificate;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pem = std::fs::read("client.pem")?;
//! let cert = Certificate::parse(&pem)?;
//!
//! for url in cert.ocsp_urls() {
//!     println!("OCSP responder: {}", url);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::DecodeError;
use crate::signature::{self, SignatureError};
use chrono::{DateTime, Utc};
use num_bigint::{BigInt, BigUint, Sign};
use serde::{Serialize, Serializer};
use std::fmt;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::oid_registry::asn1_rs::{oid, Oid};
use x509_parser::parse_x509_certificate;
use x509_parser::pem::Pem;
use yasna::models::ObjectIdentifier;

/// PEM labels accepted as certificate blocks
const CERTIFICATE_LABELS: &[&str] = &["CERTIFICATE", "X509 CERTIFICATE"];

/// Certificate serial number (arbitrary precision, signed)
///
/// RFC 5280 requires positive serials, but legacy CAs issued certificates
/// whose serial INTEGER has the sign bit set. The value is kept exactly as
/// encoded so that a CertID names the same INTEGER the certificate carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber(BigInt);

impl SerialNumber {
    /// Build from big-endian magnitude bytes; leading zeros are ignored
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Self(BigInt::from_bytes_be(Sign::Plus, bytes))
    }

    /// Build from the content octets of a DER INTEGER (two's complement)
    pub fn from_der_content(bytes: &[u8]) -> Self {
        Self(BigInt::from_signed_bytes_be(bytes))
    }

    /// Content octets of the DER INTEGER encoding
    pub fn to_der_content(&self) -> Vec<u8> {
        self.0.to_signed_bytes_be()
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.sign() == Sign::Minus
    }

    /// Lowercase hex of the DER content octets, colon separated (`01:a2:ff`)
    pub fn to_hex(&self) -> String {
        self.to_der_content()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl From<BigInt> for SerialNumber {
    fn from(value: BigInt) -> Self {
        Self(value)
    }
}

impl From<BigUint> for SerialNumber {
    fn from(value: BigUint) -> Self {
        Self(BigInt::from(value))
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for SerialNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A distinguished name in display form plus its exact DER encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    display: String,
    der: Vec<u8>,
}

impl DistinguishedName {
    /// DER encoding of the `Name`, as hashed into a CertID
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Subject public key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    algorithm: ObjectIdentifier,
    key: Vec<u8>,
    spki_der: Vec<u8>,
}

impl PublicKeyInfo {
    /// Key algorithm (e.g. rsaEncryption, id-ecPublicKey)
    pub fn algorithm(&self) -> &ObjectIdentifier {
        &self.algorithm
    }

    /// Contents of the `subjectPublicKey` BIT STRING
    pub fn key_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Full `SubjectPublicKeyInfo` DER
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }
}

/// Parsed X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: DistinguishedName,
    issuer: DistinguishedName,
    serial_number: SerialNumber,
    public_key: PublicKeyInfo,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    tbs_der: Vec<u8>,
    signature_algorithm: ObjectIdentifier,
    signature: Vec<u8>,
    ocsp_signing: bool,
    ocsp_urls: Vec<String>,
}

impl Certificate {
    /// Parse a single certificate from PEM or raw DER
    ///
    /// DER is assumed when the input starts with a SEQUENCE tag. Otherwise
    /// the input is scanned for PEM blocks and the first certificate block is
    /// decoded; other blocks (keys, CRLs) are skipped.
    ///
    /// # Errors
    ///
    /// * `DecodeError::NoCertificateFound` - no certificate block present
    /// * `DecodeError::Malformed` - the certificate fails ASN.1 parsing
    pub fn parse(input: &[u8]) -> Result<Self, DecodeError> {
        if looks_like_der(input) {
            return Self::from_der(input);
        }

        let der = certificate_blocks(input, Some(1))?
            .into_iter()
            .next()
            .ok_or(DecodeError::NoCertificateFound)?;
        Self::from_der(&der)
    }

    /// Parse every certificate block in a PEM bundle (or a single DER cert)
    pub fn parse_all(input: &[u8]) -> Result<Vec<Self>, DecodeError> {
        if looks_like_der(input) {
            return Ok(vec![Self::from_der(input)?]);
        }

        let blocks = certificate_blocks(input, None)?;
        if blocks.is_empty() {
            return Err(DecodeError::NoCertificateFound);
        }
        blocks.iter().map(|der| Self::from_der(der)).collect()
    }

    /// Parse a DER-encoded certificate
    pub fn from_der(der: &[u8]) -> Result<Self, DecodeError> {
        let (_, x509) = parse_x509_certificate(der)
            .map_err(|e| DecodeError::Malformed(format!("failed to parse certificate: {}", e)))?;

        let spki = x509.public_key();
        let validity = x509.validity();

        Ok(Self {
            der: der.to_vec(),
            subject: DistinguishedName {
                display: x509.subject().to_string(),
                der: x509.subject().as_raw().to_vec(),
            },
            issuer: DistinguishedName {
                display: x509.issuer().to_string(),
                der: x509.issuer().as_raw().to_vec(),
            },
            serial_number: SerialNumber::from_der_content(x509.tbs_certificate.raw_serial()),
            public_key: PublicKeyInfo {
                algorithm: to_object_identifier(&spki.algorithm.algorithm)?,
                key: spki.subject_public_key.data.to_vec(),
                spki_der: spki.raw.to_vec(),
            },
            not_before: to_utc(validity.not_before.timestamp())?,
            not_after: to_utc(validity.not_after.timestamp())?,
            tbs_der: x509.tbs_certificate.as_ref().to_vec(),
            signature_algorithm: to_object_identifier(&x509.signature_algorithm.algorithm)?,
            signature: x509.signature_value.data.to_vec(),
            ocsp_signing: matches!(
                x509.extended_key_usage(),
                Ok(Some(eku)) if eku.value.ocsp_signing
            ),
            ocsp_urls: extract_ocsp_urls(&x509),
        })
    }

    /// The certificate's own DER encoding
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }

    pub fn public_key(&self) -> &PublicKeyInfo {
        &self.public_key
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// DER of the `tbsCertificate` covered by [`signature`](Self::signature)
    pub fn tbs_der(&self) -> &[u8] {
        &self.tbs_der
    }

    pub fn signature_algorithm(&self) -> &ObjectIdentifier {
        &self.signature_algorithm
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Whether the certificate carries the id-kp-OCSPSigning extended key usage
    pub fn is_ocsp_signer(&self) -> bool {
        self.ocsp_signing
    }

    /// OCSP responder URLs in the order they appear in the AIA extension
    pub fn ocsp_urls(&self) -> &[String] {
        &self.ocsp_urls
    }

    /// Whether `now` falls within `notBefore..=notAfter`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Check that this certificate was signed by `issuer`
    ///
    /// Compares the issuer name with the issuer's subject and verifies the
    /// certificate signature with the issuer's public key.
    pub fn verify_issued_by(&self, issuer: &Certificate) -> Result<(), SignatureError> {
        if self.issuer.der != issuer.subject.der {
            return Err(SignatureError::IssuerMismatch);
        }
        signature::verify_signed_data(
            issuer.public_key(),
            &self.signature_algorithm,
            &self.tbs_der,
            &self.signature,
        )
    }
}

fn looks_like_der(input: &[u8]) -> bool {
    input.first() == Some(&0x30)
}

/// Collect the DER contents of certificate PEM blocks
///
/// A block that fails to decode has already been consumed by the iterator, so
/// the scan moves on to the next one. Encrypted legacy keys carry
/// `Proc-Type`/`DEK-Info` headers that never decode as base64. The first such
/// error is only reported when no certificate block was found at all.
fn certificate_blocks(input: &[u8], limit: Option<usize>) -> Result<Vec<Vec<u8>>, DecodeError> {
    let mut blocks = Vec::new();
    let mut first_error = None;

    for pem in Pem::iter_from_buffer(input) {
        match pem {
            Ok(pem) => {
                if CERTIFICATE_LABELS.contains(&pem.label.as_str()) {
                    blocks.push(pem.contents);
                    if limit.is_some_and(|limit| blocks.len() >= limit) {
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping undecodable PEM block");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if blocks.is_empty() => {
            Err(DecodeError::Malformed(format!("invalid PEM data: {}", e)))
        }
        _ => Ok(blocks),
    }
}

/// Extract OCSP responder URLs from the Authority Information Access extension
fn extract_ocsp_urls(cert: &X509Certificate<'_>) -> Vec<String> {
    let ocsp_method = oid!(1.3.6.1.5.5.7.48.1);
    let mut urls = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() {
            for access_desc in aia.accessdescs.iter() {
                if access_desc.access_method != ocsp_method {
                    continue;
                }
                if let GeneralName::URI(uri) = &access_desc.access_location {
                    urls.push(uri.to_string());
                }
            }
        }
    }

    urls
}

fn to_object_identifier(oid: &Oid<'_>) -> Result<ObjectIdentifier, DecodeError> {
    oid.iter()
        .map(|arcs| ObjectIdentifier::new(arcs.collect()))
        .ok_or_else(|| DecodeError::Malformed(format!("unsupported object identifier {}", oid)))
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| DecodeError::Malformed(format!("timestamp {} out of range", timestamp)))
}
