//! Shared test PKI and OCSP response builder
//!
//! Certificates are generated with `rcgen` (ECDSA P-256), responses are
//! assembled with `yasna` and signed with `ring`.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use ocsp_proto::{CertId, Certificate, CertificateStatus, HashAlgorithm};
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair,
};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use sha1::{Digest, Sha1};
use yasna::models::ObjectIdentifier;
use yasna::tags::TAG_GENERALIZEDTIME;
use yasna::{DERWriter, Tag};

const AIA: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 1];
const AD_OCSP: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1];
const OCSP_BASIC: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1, 1];
const OCSP_NONCE: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1, 2];
const ECDSA_WITH_SHA256: &[u64] = &[1, 2, 840, 10045, 4, 3, 2];

/// A certificate together with its signing key
pub struct Identity {
    pub key: KeyPair,
    pub cert: rcgen::Certificate,
    pub parsed: Certificate,
}

impl Identity {
    /// Self-signed CA
    pub fn authority(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let cert = params.self_signed(&key).unwrap();
        let parsed = Certificate::from_der(cert.der()).unwrap();
        Self { key, cert, parsed }
    }

    /// End-entity certificate advertising `ocsp_urls` in its AIA extension
    pub fn issue_leaf(&self, serial: &[u8], ocsp_urls: &[&str]) -> Certificate {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["leaf.test".to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, "leaf.test");
        params.serial_number = Some(rcgen::SerialNumber::from_slice(serial));
        if !ocsp_urls.is_empty() {
            params.custom_extensions = vec![CustomExtension::from_oid_content(
                AIA,
                authority_info_access(ocsp_urls),
            )];
        }
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        Certificate::from_der(cert.der()).unwrap()
    }

    /// Leaf whose serial INTEGER content is rewritten from `serial` to
    /// `encoded` in place, e.g. `0x01` to a sign-bit `0x81`
    ///
    /// The certificate signature no longer verifies; only the serial matters.
    pub fn issue_leaf_with_raw_serial(
        &self,
        serial: u8,
        encoded: u8,
        ocsp_urls: &[&str],
    ) -> Certificate {
        let leaf = self.issue_leaf(&[serial], ocsp_urls);
        let mut der = leaf.der().to_vec();
        // version [0] INTEGER 2, then serialNumber INTEGER
        let prefix = [0xA0, 0x03, 0x02, 0x01, 0x02, 0x02, 0x01, serial];
        let at = der
            .windows(prefix.len())
            .position(|window| window == prefix)
            .unwrap();
        der[at + prefix.len() - 1] = encoded;
        Certificate::from_der(&der).unwrap()
    }

    /// Delegated responder certificate issued by this authority
    pub fn issue_responder(&self, name: &str, ocsp_signing: bool) -> Identity {
        self.issue_responder_with(name, ocsp_signing, None)
    }

    /// Delegated responder valid only within `(not_before, not_after)`
    pub fn issue_responder_with(
        &self,
        name: &str,
        ocsp_signing: bool,
        validity: Option<((i32, u8, u8), (i32, u8, u8))>,
    ) -> Identity {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        if ocsp_signing {
            params.extended_key_usages = vec![ExtendedKeyUsagePurpose::OcspSigning];
        }
        if let Some(((y1, m1, d1), (y2, m2, d2))) = validity {
            params.not_before = rcgen::date_time_ymd(y1, m1, d1);
            params.not_after = rcgen::date_time_ymd(y2, m2, d2);
        }
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        let parsed = Certificate::from_der(cert.der()).unwrap();
        Identity { key, cert, parsed }
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &self.key.serialize_der(), &rng)
                .unwrap();
        key_pair.sign(&rng, message).unwrap().as_ref().to_vec()
    }
}

fn authority_info_access(urls: &[&str]) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for url in urls {
                writer.next().write_sequence(|writer| {
                    writer.next().write_oid(&ObjectIdentifier::from_slice(AD_OCSP));
                    writer
                        .next()
                        .write_tagged_implicit(Tag::context(6), |writer| {
                            writer.write_bytes(url.as_bytes())
                        });
                });
            }
        });
    })
}

/// Fixed reference clock for validation
pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2030-06-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

enum ResponderId {
    ByName(Vec<u8>),
    ByKey(Vec<u8>),
}

/// Builds signed `OCSPResponse` DER
pub struct ResponseBuilder {
    cert_id: CertId,
    status: CertificateStatus,
    responder_id: Option<ResponderId>,
    produced_at: DateTime<Utc>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    nonce: Option<Vec<u8>>,
    certs: Vec<Vec<u8>>,
    /// Entries written before the main one
    extra: Vec<(CertId, CertificateStatus)>,
}

impl ResponseBuilder {
    /// A Good answer for `cert_id`, fresh at [`now`]
    pub fn new(cert_id: CertId) -> Self {
        let now = now();
        Self {
            cert_id,
            status: CertificateStatus::Good,
            responder_id: None,
            produced_at: now - Duration::minutes(5),
            this_update: now - Duration::hours(1),
            next_update: Some(now + Duration::days(1)),
            nonce: None,
            certs: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn status(mut self, status: CertificateStatus) -> Self {
        self.status = status;
        self
    }

    pub fn this_update(mut self, this_update: DateTime<Utc>) -> Self {
        self.this_update = this_update;
        self
    }

    pub fn next_update(mut self, next_update: Option<DateTime<Utc>>) -> Self {
        self.next_update = next_update;
        self
    }

    pub fn nonce(mut self, nonce: Option<&[u8]>) -> Self {
        self.nonce = nonce.map(<[u8]>::to_vec);
        self
    }

    /// Identify the responder by subject name
    pub fn responder(mut self, identity: &Identity) -> Self {
        self.responder_id = Some(ResponderId::ByName(identity.parsed.subject().der().to_vec()));
        self
    }

    /// Identify the responder by SHA-1 of its public key
    pub fn responder_by_key(mut self, identity: &Identity) -> Self {
        let key_hash = Sha1::digest(identity.parsed.public_key().key_bytes()).to_vec();
        self.responder_id = Some(ResponderId::ByKey(key_hash));
        self
    }

    /// Add a Good entry for another certificate ahead of the requested one
    pub fn extra_entry(mut self, cert_id: CertId) -> Self {
        self.extra.push((cert_id, CertificateStatus::Good));
        self
    }

    pub fn include_cert(mut self, identity: &Identity) -> Self {
        self.certs.push(identity.cert.der().to_vec());
        self
    }

    /// Sign with `signer`; the responder ID defaults to the signer's name
    pub fn sign(self, signer: &Identity) -> Vec<u8> {
        let responder_id = match self.responder_id {
            Some(ref id) => match id {
                ResponderId::ByName(name) => ResponderId::ByName(name.clone()),
                ResponderId::ByKey(hash) => ResponderId::ByKey(hash.clone()),
            },
            None => ResponderId::ByName(signer.parsed.subject().der().to_vec()),
        };

        let tbs = self.response_data(&responder_id);
        let signature = signer.sign(&tbs);

        let basic = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_der(&tbs);
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(ECDSA_WITH_SHA256));
                });
                writer
                    .next()
                    .write_bitvec_bytes(&signature, signature.len() * 8);
                if !self.certs.is_empty() {
                    writer.next().write_tagged(Tag::context(0), |writer| {
                        writer.write_sequence(|writer| {
                            for cert in &self.certs {
                                writer.next().write_der(cert);
                            }
                        });
                    });
                }
            });
        });

        envelope(0, Some(&basic))
    }

    fn response_data(&self, responder_id: &ResponderId) -> Vec<u8> {
        yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                match responder_id {
                    ResponderId::ByName(name) => {
                        writer
                            .next()
                            .write_tagged(Tag::context(1), |writer| writer.write_der(name));
                    }
                    ResponderId::ByKey(hash) => {
                        writer
                            .next()
                            .write_tagged(Tag::context(2), |writer| writer.write_bytes(hash));
                    }
                }
                write_time(writer.next(), self.produced_at);
                writer.next().write_sequence(|writer| {
                    for (cert_id, status) in &self.extra {
                        self.write_single(writer.next(), cert_id, status);
                    }
                    self.write_single(writer.next(), &self.cert_id, &self.status);
                });
                if let Some(nonce) = &self.nonce {
                    writer.next().write_tagged(Tag::context(1), |writer| {
                        writer.write_sequence(|writer| {
                            writer.next().write_sequence(|writer| {
                                writer.next().write_oid(&ObjectIdentifier::from_slice(OCSP_NONCE));
                                writer
                                    .next()
                                    .write_bytes(&yasna::construct_der(|writer| writer.write_bytes(nonce)));
                            });
                        });
                    });
                }
            });
        })
    }

    fn write_single(&self, writer: DERWriter, cert_id: &CertId, status: &CertificateStatus) {
        writer.write_sequence(|writer| {
            write_cert_id(writer.next(), cert_id);
            write_status(writer.next(), status);
            write_time(writer.next(), self.this_update);
            if let Some(next_update) = self.next_update {
                writer
                    .next()
                    .write_tagged(Tag::context(0), |writer| write_time(writer, next_update));
            }
        });
    }
}

/// An unsuccessful `OCSPResponse` carrying only `responseStatus`
pub fn error_response(status: i64) -> Vec<u8> {
    envelope(status, None)
}

fn envelope(status: i64, basic: Option<&[u8]>) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_enum(status);
            if let Some(basic) = basic {
                writer.next().write_tagged(Tag::context(0), |writer| {
                    writer.write_sequence(|writer| {
                        writer.next().write_oid(&ObjectIdentifier::from_slice(OCSP_BASIC));
                        writer.next().write_bytes(basic);
                    });
                });
            }
        });
    })
}

fn write_cert_id(writer: DERWriter, cert_id: &CertId) {
    writer.write_sequence(|writer| {
        writer.next().write_sequence(|writer| {
            writer
                .next()
                .write_oid(&ObjectIdentifier::from_slice(cert_id.hash_algorithm.oid()));
            writer.next().write_null();
        });
        writer.next().write_bytes(&cert_id.issuer_name_hash);
        writer.next().write_bytes(&cert_id.issuer_key_hash);
        writer.next().write_bigint(cert_id.serial_number.as_bigint());
    });
}

fn write_status(writer: DERWriter, status: &CertificateStatus) {
    match status {
        CertificateStatus::Good => {
            writer.write_tagged_implicit(Tag::context(0), |writer| writer.write_null());
        }
        CertificateStatus::Revoked { revoked_at, reason } => {
            writer.write_tagged_implicit(Tag::context(1), |writer| {
                writer.write_sequence(|writer| {
                    write_time(writer.next(), *revoked_at);
                    if let Some(reason) = reason {
                        writer
                            .next()
                            .write_tagged(Tag::context(0), |writer| writer.write_enum(reason.code()));
                    }
                });
            });
        }
        CertificateStatus::Unknown => {
            writer.write_tagged_implicit(Tag::context(2), |writer| writer.write_null());
        }
    }
}

fn write_time(writer: DERWriter, time: DateTime<Utc>) {
    let text = time.format("%Y%m%d%H%M%SZ").to_string();
    writer.write_tagged_implicit(TAG_GENERALIZEDTIME, |writer| writer.write_bytes(text.as_bytes()));
}

/// CertID for `subject` under `issuer` with SHA-1
pub fn cert_id(subject: &Certificate, issuer: &Identity) -> CertId {
    CertId::for_certificate(subject, &issuer.parsed, HashAlgorithm::Sha1)
}
