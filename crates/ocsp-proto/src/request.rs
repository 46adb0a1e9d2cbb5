//! OCSP request building (RFC 6960 Section 4.1)
//!
//! ```asn1
//! OCSPRequest ::= SEQUENCE {
//!     tbsRequest          TBSRequest,
//!     optionalSignature   [0] EXPLICIT Signature OPTIONAL
//! }
//!
//! TBSRequest ::= SEQUENCE {
//!     version             [0] EXPLICIT Version DEFAULT v1,
//!     requestorName       [1] EXPLICIT GeneralName OPTIONAL,
//!     requestList         SEQUENCE OF Request,
//!     requestExtensions   [2] EXPLICIT Extensions OPTIONAL
//! }
//!
//! Request ::= SEQUENCE {
//!     reqCert                 CertID,
//!     singleRequestExtensions [0] EXPLICIT Extensions OPTIONAL
//! }
//!
//! CertID ::= SEQUENCE {
//!     hashAlgorithm       AlgorithmIdentifier,
//!     issuerNameHash      OCTET STRING,
//!     issuerKeyHash       OCTET STRING,
//!     serialNumber        CertificateSerialNumber
//! }
//! ```
//!
//! Requests are always unsigned and carry exactly one `Request`.

use crate::asn1::{self, oid, oid_is};
use crate::certificate::{Certificate, SerialNumber};
use crate::error::DecodeError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Result, BERReader, DERWriter, Tag};

/// Nonce length in bytes (RFC 8954 recommends at least 16)
pub const NONCE_LEN: usize = 16;

/// Hash algorithm used for the CertID name and key hashes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-1, the RFC 5019 profile default
    #[default]
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Arcs of the algorithm's object identifier
    pub fn oid(self) -> &'static [u64] {
        match self {
            Self::Sha1 => oid::SHA1,
            Self::Sha256 => oid::SHA256,
        }
    }

    pub fn from_oid(algorithm: &ObjectIdentifier) -> Option<Self> {
        if oid_is(algorithm, oid::SHA1) {
            Some(Self::Sha1)
        } else if oid_is(algorithm, oid::SHA256) {
            Some(Self::Sha256)
        } else {
            None
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

/// Identifies a certificate by issuer hashes and serial number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertId {
    pub hash_algorithm: HashAlgorithm,
    pub issuer_name_hash: Vec<u8>,
    pub issuer_key_hash: Vec<u8>,
    pub serial_number: SerialNumber,
}

impl CertId {
    /// Compute the CertID of `subject` as issued by `issuer`
    ///
    /// Both hashes come from the issuer certificate: its subject name DER
    /// and the value of its `subjectPublicKey` BIT STRING.
    pub fn for_certificate(
        subject: &Certificate,
        issuer: &Certificate,
        hash_algorithm: HashAlgorithm,
    ) -> Self {
        Self {
            hash_algorithm,
            issuer_name_hash: hash_algorithm.digest(issuer.subject().der()),
            issuer_key_hash: hash_algorithm.digest(issuer.public_key().key_bytes()),
            serial_number: subject.serial_number().clone(),
        }
    }

    pub(crate) fn write(&self, writer: DERWriter) {
        writer.write_sequence(|writer| {
            writer.next().write_sequence(|writer| {
                writer
                    .next()
                    .write_oid(&ObjectIdentifier::from_slice(self.hash_algorithm.oid()));
                writer.next().write_null();
            });
            writer.next().write_bytes(&self.issuer_name_hash);
            writer.next().write_bytes(&self.issuer_key_hash);
            writer.next().write_bigint(self.serial_number.as_bigint());
        });
    }

    /// Read a CertID; `None` when its hash algorithm is not one we produce
    pub(crate) fn read(reader: BERReader) -> ASN1Result<Option<Self>> {
        reader.read_sequence(|reader| {
            let algorithm = asn1::read_algorithm_identifier(reader.next())?;
            let issuer_name_hash = reader.next().read_bytes()?;
            let issuer_key_hash = reader.next().read_bytes()?;
            let serial_number = reader.next().read_bigint()?;

            Ok(HashAlgorithm::from_oid(&algorithm).map(|hash_algorithm| Self {
                hash_algorithm,
                issuer_name_hash,
                issuer_key_hash,
                serial_number: serial_number.into(),
            }))
        })
    }
}

/// Knobs for [`StatusRequest::build`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub hash_algorithm: HashAlgorithm,
    pub include_nonce: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Sha1,
            include_nonce: true,
        }
    }
}

/// A single-certificate OCSP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    cert_id: CertId,
    nonce: Option<Vec<u8>>,
}

impl StatusRequest {
    /// Build a request for `subject`, generating a fresh nonce if enabled
    pub fn build(subject: &Certificate, issuer: &Certificate, options: &RequestOptions) -> Self {
        let cert_id = CertId::for_certificate(subject, issuer, options.hash_algorithm);
        let nonce = options.include_nonce.then(generate_nonce);

        let nonce_hex = nonce.as_deref().map(hex::encode);
        tracing::debug!(
            serial = %cert_id.serial_number,
            hash_algorithm = ?options.hash_algorithm,
            nonce = nonce_hex.as_deref().unwrap_or("none"),
            "Built OCSP request"
        );

        Self { cert_id, nonce }
    }

    pub fn new(cert_id: CertId, nonce: Option<Vec<u8>>) -> Self {
        Self { cert_id, nonce }
    }

    pub fn cert_id(&self) -> &CertId {
        &self.cert_id
    }

    /// Nonce carried in the request extensions, if any
    pub fn nonce(&self) -> Option<&[u8]> {
        self.nonce.as_deref()
    }

    /// Encode as a DER `OCSPRequest`
    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                // tbsRequest
                writer.next().write_sequence(|writer| {
                    // requestList
                    writer.next().write_sequence(|writer| {
                        writer.next().write_sequence(|writer| {
                            self.cert_id.write(writer.next());
                        });
                    });

                    if let Some(nonce) = &self.nonce {
                        writer.next().write_tagged(Tag::context(2), |writer| {
                            write_nonce_extensions(writer, nonce);
                        });
                    }
                });
            });
        })
    }

    /// Decode a DER `OCSPRequest` holding exactly one `Request`
    pub fn from_der(der: &[u8]) -> Result<Self, DecodeError> {
        let (cert_ids, nonce) = yasna::parse_der(der, |reader| {
            reader.read_sequence(|reader| {
                let parsed = reader.next().read_sequence(|reader| {
                    reader.read_optional(|reader| {
                        reader.read_tagged(Tag::context(0), |reader| reader.read_u8())
                    })?;
                    reader.read_optional(|reader| {
                        reader.read_tagged(Tag::context(1), |reader| reader.read_der())
                    })?;

                    let mut cert_ids = Vec::new();
                    reader.next().read_sequence_of(|reader| {
                        let cert_id = reader.read_sequence(|reader| {
                            let cert_id = CertId::read(reader.next())?;
                            reader.read_optional(|reader| {
                                reader.read_tagged(Tag::context(0), |reader| reader.read_der())
                            })?;
                            Ok(cert_id)
                        })?;
                        cert_ids.push(cert_id);
                        Ok(())
                    })?;

                    let extensions = reader.read_optional(|reader| {
                        reader.read_tagged(Tag::context(2), asn1::read_extensions)
                    })?;
                    Ok((cert_ids, extensions))
                })?;

                // optionalSignature
                reader.read_optional(|reader| {
                    reader.read_tagged(Tag::context(0), |reader| reader.read_der())
                })?;
                Ok(parsed)
            })
        })
        .map_err(|e| DecodeError::Malformed(format!("invalid OCSP request: {}", e)))?;

        let cert_id = match cert_ids.as_slice() {
            [Some(cert_id)] => cert_id.clone(),
            [None] => {
                return Err(DecodeError::Malformed(
                    "unsupported CertID hash algorithm".to_string(),
                ))
            }
            other => {
                return Err(DecodeError::Malformed(format!(
                    "expected exactly one request entry, found {}",
                    other.len()
                )))
            }
        };

        let nonce = nonce.and_then(|extensions| {
            extensions
                .iter()
                .find(|ext| oid_is(&ext.id, oid::OCSP_NONCE))
                .map(|ext| nonce_from_extension_value(&ext.value))
        });

        Ok(Self { cert_id, nonce })
    }
}

fn generate_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Write `Extensions` holding only the nonce extension
fn write_nonce_extensions(writer: DERWriter, nonce: &[u8]) {
    writer.write_sequence(|writer| {
        writer.next().write_sequence(|writer| {
            writer
                .next()
                .write_oid(&ObjectIdentifier::from_slice(oid::OCSP_NONCE));
            // RFC 8954: extnValue wraps an OCTET STRING holding the nonce
            writer
                .next()
                .write_bytes(&yasna::construct_der(|writer| writer.write_bytes(nonce)));
        });
    });
}

/// Nonce bytes from an `extnValue`
///
/// Responders predating RFC 8954 sometimes put the raw nonce in `extnValue`
/// without the inner OCTET STRING; those values are returned unchanged.
pub(crate) fn nonce_from_extension_value(value: &[u8]) -> Vec<u8> {
    yasna::parse_der(value, |reader| reader.read_bytes()).unwrap_or_else(|_| value.to_vec())
}
