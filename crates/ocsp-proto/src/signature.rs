//! Signature verification for OCSP responses and responder certificates
//!
//! Maps an X.509 signature algorithm OID and a subject public key onto a
//! `ring` verification algorithm.
//!
//! Supported combinations:
//! - RSA PKCS#1 v1.5 with SHA-1, SHA-256, SHA-384, SHA-512, for 2048 to
//!   8192 bit moduli
//! - ECDSA P-256 / P-384 with SHA-256 or SHA-384
//! - Ed25519
//!
//! Not supported: RSASSA-PSS, ECDSA P-521, DSA and RSA keys below 2048 bits.
//! These fail with [`SignatureError::UnsupportedAlgorithm`],
//! [`SignatureError::KeyMismatch`] or [`SignatureError::KeyTooSmall`] rather
//! than [`SignatureError::BadSignature`], so a responder using them can be told
//! apart from a forged response.

use crate::asn1::{dotted, oid, oid_is};
use crate::certificate::PublicKeyInfo;
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use yasna::models::ObjectIdentifier;

/// Uncompressed P-256 point length
const P256_POINT_LEN: usize = 65;
/// Uncompressed P-384 point length
const P384_POINT_LEN: usize = 97;
/// Smallest RSA modulus `ring` verifies with
const MIN_RSA_BITS: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("unsupported signature algorithm {0}")]
    UnsupportedAlgorithm(String),

    #[error("signature algorithm {algorithm} does not match {key} public key")]
    KeyMismatch { algorithm: String, key: String },

    #[error("RSA key of {0} bits is below the supported minimum of 2048 bits")]
    KeyTooSmall(usize),

    #[error("signature does not verify")]
    BadSignature,

    #[error("issuer name does not match signer subject")]
    IssuerMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureScheme {
    RsaSha1,
    RsaSha256,
    RsaSha384,
    RsaSha512,
    EcdsaSha256,
    EcdsaSha384,
    Ed25519,
}

impl SignatureScheme {
    fn from_oid(algorithm: &ObjectIdentifier) -> Option<Self> {
        let scheme = if oid_is(algorithm, oid::SHA1_WITH_RSA) {
            Self::RsaSha1
        } else if oid_is(algorithm, oid::SHA256_WITH_RSA) {
            Self::RsaSha256
        } else if oid_is(algorithm, oid::SHA384_WITH_RSA) {
            Self::RsaSha384
        } else if oid_is(algorithm, oid::SHA512_WITH_RSA) {
            Self::RsaSha512
        } else if oid_is(algorithm, oid::ECDSA_WITH_SHA256) {
            Self::EcdsaSha256
        } else if oid_is(algorithm, oid::ECDSA_WITH_SHA384) {
            Self::EcdsaSha384
        } else if oid_is(algorithm, oid::ED25519) {
            Self::Ed25519
        } else {
            return None;
        };
        Some(scheme)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Rsa,
    P256,
    P384,
    Ed25519,
}

impl KeyKind {
    fn of(key: &PublicKeyInfo) -> Option<Self> {
        let algorithm = key.algorithm();
        if oid_is(algorithm, oid::RSA_ENCRYPTION) {
            Some(Self::Rsa)
        } else if oid_is(algorithm, oid::ED25519) {
            Some(Self::Ed25519)
        } else if oid_is(algorithm, oid::EC_PUBLIC_KEY) {
            // Curve from the uncompressed point size; the named-curve
            // parameter is not kept on PublicKeyInfo.
            match key.key_bytes().len() {
                P256_POINT_LEN => Some(Self::P256),
                P384_POINT_LEN => Some(Self::P384),
                _ => None,
            }
        } else {
            None
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::Ed25519 => "Ed25519",
        }
    }
}

fn algorithm_for(
    scheme: SignatureScheme,
    key: KeyKind,
) -> Option<&'static dyn VerificationAlgorithm> {
    use KeyKind as K;
    use SignatureScheme as S;

    let algorithm: &'static dyn VerificationAlgorithm = match (scheme, key) {
        (S::RsaSha1, K::Rsa) => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        (S::RsaSha256, K::Rsa) => &signature::RSA_PKCS1_2048_8192_SHA256,
        (S::RsaSha384, K::Rsa) => &signature::RSA_PKCS1_2048_8192_SHA384,
        (S::RsaSha512, K::Rsa) => &signature::RSA_PKCS1_2048_8192_SHA512,
        (S::EcdsaSha256, K::P256) => &signature::ECDSA_P256_SHA256_ASN1,
        (S::EcdsaSha384, K::P256) => &signature::ECDSA_P256_SHA384_ASN1,
        (S::EcdsaSha256, K::P384) => &signature::ECDSA_P384_SHA256_ASN1,
        (S::EcdsaSha384, K::P384) => &signature::ECDSA_P384_SHA384_ASN1,
        (S::Ed25519, K::Ed25519) => &signature::ED25519,
        _ => return None,
    };
    Some(algorithm)
}

/// Verify `signature` over `message` with `key` using `algorithm`
pub(crate) fn verify_signed_data(
    key: &PublicKeyInfo,
    algorithm: &ObjectIdentifier,
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    let scheme = SignatureScheme::from_oid(algorithm)
        .ok_or_else(|| SignatureError::UnsupportedAlgorithm(dotted(algorithm)))?;
    let kind = KeyKind::of(key)
        .ok_or_else(|| SignatureError::UnsupportedAlgorithm(dotted(key.algorithm())))?;
    let verifier = algorithm_for(scheme, kind).ok_or_else(|| SignatureError::KeyMismatch {
        algorithm: dotted(algorithm),
        key: kind.name().to_string(),
    })?;

    if kind == KeyKind::Rsa {
        if let Some(bits) = rsa_modulus_bits(key.key_bytes()) {
            if bits < MIN_RSA_BITS {
                return Err(SignatureError::KeyTooSmall(bits));
            }
        }
    }

    UnparsedPublicKey::new(verifier, key.key_bytes())
        .verify(message, signature)
        .map_err(|_| SignatureError::BadSignature)
}

/// Modulus size of a PKCS#1 `RSAPublicKey`, `None` if it does not decode
fn rsa_modulus_bits(key: &[u8]) -> Option<usize> {
    let modulus = yasna::parse_der(key, |reader| {
        reader.read_sequence(|reader| {
            let (modulus, _) = reader.next().read_bigint_bytes()?;
            reader.next().read_bigint_bytes()?;
            Ok(modulus)
        })
    })
    .ok()?;

    let start = modulus.iter().position(|&byte| byte != 0)?;
    let significant = &modulus[start..];
    Some(significant.len() * 8 - significant[0].leading_zeros() as usize)
}
