//! ASN.1 helpers shared by the request builder and the response validator
//!
//! Object identifiers are carried as [`ObjectIdentifier`] values and compared
//! against the arc constants below.

use chrono::{DateTime, NaiveDateTime, Utc};
use yasna::models::ObjectIdentifier;
use yasna::tags::TAG_GENERALIZEDTIME;
use yasna::{ASN1Error, ASN1ErrorKind, ASN1Result, BERReader};

pub mod oid {
    //! Object identifier arcs used by OCSP

    /// id-sha1
    pub const SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
    /// id-sha256
    pub const SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];

    /// id-pkix-ocsp-basic
    pub const OCSP_BASIC: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1, 1];
    /// id-pkix-ocsp-nonce
    pub const OCSP_NONCE: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1, 2];

    pub const RSA_ENCRYPTION: &[u64] = &[1, 2, 840, 113549, 1, 1, 1];
    pub const SHA1_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 5];
    pub const SHA256_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 11];
    pub const SHA384_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 12];
    pub const SHA512_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 13];

    pub const EC_PUBLIC_KEY: &[u64] = &[1, 2, 840, 10045, 2, 1];
    pub const ECDSA_WITH_SHA256: &[u64] = &[1, 2, 840, 10045, 4, 3, 2];
    pub const ECDSA_WITH_SHA384: &[u64] = &[1, 2, 840, 10045, 4, 3, 3];

    pub const ED25519: &[u64] = &[1, 3, 101, 112];
}

/// Check whether `oid` has exactly the given arcs
pub fn oid_is(oid: &ObjectIdentifier, arcs: &[u64]) -> bool {
    oid.components()[..] == *arcs
}

/// Render an OID in dotted form
pub fn dotted(oid: &ObjectIdentifier) -> String {
    oid.components()
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// A decoded X.509 / OCSP extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Extension {
    pub id: ObjectIdentifier,
    pub critical: bool,
    pub value: Vec<u8>,
}

/// Read `Extensions ::= SEQUENCE SIZE (1..MAX) OF Extension`
///
/// `critical` is accepted when present even if it carries the default value,
/// which strict DER forbids but several responders emit.
pub(crate) fn read_extensions(reader: BERReader) -> ASN1Result<Vec<Extension>> {
    let mut extensions = Vec::new();
    reader.read_sequence_of(|reader| {
        let extension = reader.read_sequence(|reader| {
            let id = reader.next().read_oid()?;
            let critical = reader.read_optional(|reader| reader.read_bool())?;
            let value = reader.next().read_bytes()?;
            Ok(Extension {
                id,
                critical: critical.unwrap_or(false),
                value,
            })
        })?;
        extensions.push(extension);
        Ok(())
    })?;
    Ok(extensions)
}

/// Read an `AlgorithmIdentifier`, discarding its parameters
pub(crate) fn read_algorithm_identifier(reader: BERReader) -> ASN1Result<ObjectIdentifier> {
    reader.read_sequence(|reader| {
        let algorithm = reader.next().read_oid()?;
        reader.read_optional(|reader| reader.read_der())?;
        Ok(algorithm)
    })
}

/// Read a `GeneralizedTime` as UTC
pub(crate) fn read_generalized_time(reader: BERReader) -> ASN1Result<DateTime<Utc>> {
    let raw = reader.read_tagged_implicit(TAG_GENERALIZEDTIME, |reader| reader.read_bytes())?;
    let text = std::str::from_utf8(&raw).map_err(|_| ASN1Error::new(ASN1ErrorKind::Invalid))?;
    parse_generalized_time(text).ok_or_else(|| ASN1Error::new(ASN1ErrorKind::Invalid))
}

/// Parse GeneralizedTime text: `YYYYMMDDHHMMSS[.fff]Z`
pub fn parse_generalized_time(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%SZ")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S%.fZ"))
        .ok()
        .map(|datetime| datetime.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use yasna::Tag;

    #[test]
    fn test_parse_generalized_time() {
        let time = parse_generalized_time("20240315120530Z").unwrap();
        assert_eq!(time.year(), 2024);
        assert_eq!(time.month(), 3);
        assert_eq!(time.day(), 15);
        assert_eq!(time.hour(), 12);
        assert_eq!(time.minute(), 5);
        assert_eq!(time.second(), 30);
    }

    #[test]
    fn test_parse_generalized_time_fractional() {
        let time = parse_generalized_time("20240315120530.250Z").unwrap();
        assert_eq!(time.second(), 30);
        assert_eq!(time.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_generalized_time_rejects_local_time() {
        assert!(parse_generalized_time("20240315120530").is_none());
        assert!(parse_generalized_time("not a time").is_none());
    }

    #[test]
    fn test_read_generalized_time() {
        let der = yasna::construct_der(|writer| {
            writer.write_tagged_implicit(TAG_GENERALIZEDTIME, |writer| {
                writer.write_bytes(b"20300101000000Z")
            })
        });

        let time = yasna::parse_der(&der, |reader| read_generalized_time(reader)).unwrap();
        assert_eq!(time.year(), 2030);
    }

    #[test]
    fn test_read_extensions_with_and_without_critical() {
        let der = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(oid::OCSP_NONCE));
                    writer.next().write_bytes(&[0x04, 0x01, 0xAA]);
                });
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(&[2, 5, 29, 99]));
                    writer.next().write_bool(true);
                    writer.next().write_bytes(&[0x05, 0x00]);
                });
            })
        });

        let extensions = yasna::parse_der(&der, |reader| read_extensions(reader)).unwrap();
        assert_eq!(extensions.len(), 2);
        assert!(oid_is(&extensions[0].id, oid::OCSP_NONCE));
        assert!(!extensions[0].critical);
        assert_eq!(extensions[0].value, vec![0x04, 0x01, 0xAA]);
        assert!(extensions[1].critical);
    }

    #[test]
    fn test_read_algorithm_identifier_ignores_parameters() {
        let with_null = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_oid(&ObjectIdentifier::from_slice(oid::SHA1));
                writer.next().write_null();
            })
        });
        let without = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_oid(&ObjectIdentifier::from_slice(oid::SHA1));
            })
        });

        for der in [with_null, without] {
            let algorithm = yasna::parse_der(&der, |reader| read_algorithm_identifier(reader)).unwrap();
            assert!(oid_is(&algorithm, oid::SHA1));
        }
    }

    #[test]
    fn test_dotted() {
        let sha256 = ObjectIdentifier::from_slice(oid::SHA256);
        assert_eq!(dotted(&sha256), "2.16.840.1.101.3.4.2.1");
    }

    #[test]
    fn test_tagged_context_is_not_generalized_time() {
        let der = yasna::construct_der(|writer| {
            writer.write_tagged(Tag::context(0), |writer| writer.write_null())
        });
        assert!(yasna::parse_der(&der, |reader| read_generalized_time(reader)).is_err());
    }
}
