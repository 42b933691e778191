//! Cryptographic operation wrapper for the ceremony validators.
//!
//! This module exists so the validator pipeline never touches a signature
//! or digest primitive directly -- every operation goes through the
//! [`CryptoProvider`] seam, which keeps the core auditable and lets a caller
//! swap backends (e.g. to pick up an algorithm the default provider lacks)
//! without touching ceremony logic.

use ring::digest;
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use tracing::{debug, warn};

use crate::error::{WebauthnError, WebauthnResult};
use crate::model::{CoseAlgorithm, CoseKey, CoseKeyMaterial, EcdsaCurve};

/// Computes a SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = digest::digest(&digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_ref());
    out
}

/// Builds `authenticatorData ‖ SHA-256(clientDataJSON)`, the data signed
/// over by an assertion (and, with `clientDataHash` precomputed, by most
/// attestation formats too).
pub fn signed_data(authenticator_data_bytes: &[u8], client_data_json_bytes: &[u8]) -> Vec<u8> {
    let hash = sha256(client_data_json_bytes);
    let mut out = Vec::with_capacity(authenticator_data_bytes.len() + hash.len());
    out.extend_from_slice(authenticator_data_bytes);
    out.extend_from_slice(&hash);
    out
}

/// The digest algorithm implied by a COSE signature algorithm, used by
/// formats (tpm) that hash data themselves rather than delegating the whole
/// signature to `ring`.
pub fn digest_algorithm_for(alg: CoseAlgorithm) -> WebauthnResult<&'static digest::Algorithm> {
    Ok(match alg {
        CoseAlgorithm::ES256 | CoseAlgorithm::RS256 | CoseAlgorithm::PS256 => &digest::SHA256,
        CoseAlgorithm::ES384 | CoseAlgorithm::RS384 | CoseAlgorithm::PS384 => &digest::SHA384,
        CoseAlgorithm::ES512 | CoseAlgorithm::RS512 | CoseAlgorithm::PS512 => &digest::SHA512,
        CoseAlgorithm::EdDSA => &digest::SHA512,
    })
}

/// Computes a digest with an arbitrary `ring` algorithm, returning owned bytes.
pub fn digest_with(algorithm: &'static digest::Algorithm, data: &[u8]) -> Vec<u8> {
    digest::digest(algorithm, data).as_ref().to_vec()
}

/// Seam for every cryptographic primitive the validators need: message
/// digests and algorithm-keyed signature verification. A single
/// implementation is expected to be constructed once and shared across
/// threads (it is `Send + Sync`); per-call state (verifier objects) is
/// always local to the call.
pub trait CryptoProvider: Send + Sync {
    /// Verifies `signature` over `message` using `key`. Returns `Ok(())` on
    /// a valid signature, `Err(WebauthnError::BadSignature)` otherwise (or
    /// `Err(WebauthnError::NotAllowedAlgorithm)` if the provider cannot
    /// evaluate `key.alg` at all).
    fn verify(&self, key: &CoseKey, message: &[u8], signature: &[u8]) -> WebauthnResult<()>;

    /// Verifies `signature` over `message` using an X.509 certificate's
    /// public key (DER-encoded), for the given COSE algorithm.
    fn verify_with_certificate(
        &self,
        alg: CoseAlgorithm,
        certificate_der: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> WebauthnResult<()>;
}

/// Default [`CryptoProvider`] backed by `ring`.
///
/// ES256/ES384 (ECDSA over P-256/P-384), RS256/384/512 (RSASSA-PKCS1-v1_5),
/// PS256/384/512 (RSASSA-PSS) and EdDSA (Ed25519) are supported. ES512
/// (P-521) is a recognised COSE algorithm identifier but `ring` has no
/// P-521 support; callers that must accept ES512 credentials need to supply
/// an alternative `CryptoProvider`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RingCryptoProvider;

impl RingCryptoProvider {
    pub fn new() -> Self {
        Self
    }

    fn verify_raw(
        &self,
        alg: CoseAlgorithm,
        spki_or_raw: SubjectPublicKey<'_>,
        message: &[u8],
        signature: &[u8],
    ) -> WebauthnResult<()> {
        let verification_alg: &dyn VerificationAlgorithm = match alg {
            CoseAlgorithm::ES256 => &signature::ECDSA_P256_SHA256_ASN1,
            CoseAlgorithm::ES384 => &signature::ECDSA_P384_SHA384_ASN1,
            CoseAlgorithm::ES512 => {
                warn!("ES512 (P-521) is not supported by the default crypto provider");
                return Err(WebauthnError::NotAllowedAlgorithm(alg));
            }
            CoseAlgorithm::RS256 => &signature::RSA_PKCS1_2048_8192_SHA256,
            CoseAlgorithm::RS384 => &signature::RSA_PKCS1_2048_8192_SHA384,
            CoseAlgorithm::RS512 => &signature::RSA_PKCS1_2048_8192_SHA512,
            CoseAlgorithm::PS256 => &signature::RSA_PSS_2048_8192_SHA256,
            CoseAlgorithm::PS384 => &signature::RSA_PSS_2048_8192_SHA384,
            CoseAlgorithm::PS512 => &signature::RSA_PSS_2048_8192_SHA512,
            CoseAlgorithm::EdDSA => &signature::ED25519,
        };

        let key_bytes: &[u8] = match spki_or_raw {
            SubjectPublicKey::Raw(bytes) => bytes,
        };

        let public_key = UnparsedPublicKey::new(verification_alg, key_bytes);
        public_key.verify(message, signature).map_err(|_| {
            debug!(?alg, "signature verification failed");
            WebauthnError::BadSignature
        })
    }
}

enum SubjectPublicKey<'a> {
    Raw(&'a [u8]),
}

impl CryptoProvider for RingCryptoProvider {
    fn verify(&self, key: &CoseKey, message: &[u8], signature: &[u8]) -> WebauthnResult<()> {
        let raw_key = cose_key_to_raw_bytes(key)?;
        self.verify_raw(key.alg, SubjectPublicKey::Raw(&raw_key), message, signature)
    }

    fn verify_with_certificate(
        &self,
        alg: CoseAlgorithm,
        certificate_der: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> WebauthnResult<()> {
        let (_, cert) = x509_parser::parse_x509_certificate(certificate_der)
            .map_err(|_| WebauthnError::BadAttestationStatement {
                reason: "x5c[0] is not a parseable X.509 certificate".into(),
            })?;
        let spki = cert.public_key().raw;
        self.verify_raw(alg, SubjectPublicKey::Raw(spki), message, signature)
    }
}

/// Converts a COSE key into the raw bytes `ring::signature::UnparsedPublicKey`
/// expects for the matching algorithm family: SEC1 uncompressed point for
/// EC2 keys, DER `RSAPublicKey` for RSA keys, raw 32 bytes for OKP/Ed25519.
fn cose_key_to_raw_bytes(key: &CoseKey) -> WebauthnResult<Vec<u8>> {
    match &key.material {
        CoseKeyMaterial::Ec2(ec2) => {
            validate_ec2_curve_matches_alg(key.alg, ec2.curve)?;
            let mut out = Vec::with_capacity(1 + ec2.x.len() + ec2.y.len());
            out.push(0x04);
            out.extend_from_slice(&ec2.x);
            out.extend_from_slice(&ec2.y);
            Ok(out)
        }
        CoseKeyMaterial::Rsa(rsa) => encode_rsa_public_key_der(&rsa.n, &rsa.e),
        CoseKeyMaterial::Okp(okp) => Ok(okp.x.clone()),
    }
}

fn validate_ec2_curve_matches_alg(alg: CoseAlgorithm, curve: EcdsaCurve) -> WebauthnResult<()> {
    let expected = match alg {
        CoseAlgorithm::ES256 => EcdsaCurve::Secp256r1,
        CoseAlgorithm::ES384 => EcdsaCurve::Secp384r1,
        CoseAlgorithm::ES512 => EcdsaCurve::Secp521r1,
        _ => return Err(WebauthnError::NotAllowedAlgorithm(alg)),
    };
    if expected == curve {
        Ok(())
    } else {
        Err(WebauthnError::ConstraintViolation {
            reason: "COSE key curve does not match its declared algorithm",
        })
    }
}

/// Minimal DER encoder for an `RSAPublicKey ::= SEQUENCE { modulus INTEGER,
/// publicExponent INTEGER }`, which is what `ring`'s RSA verification
/// algorithms expect as the "public key" byte string.
fn encode_rsa_public_key_der(n: &[u8], e: &[u8]) -> WebauthnResult<Vec<u8>> {
    if n.is_empty() {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "RSA modulus is empty".into(),
        });
    }
    // Default exponent of 65537 when the caller-decoded key left it
    // unspecified (mirrors the TPM pubArea convention in).
    let e = if e.is_empty() { &[0x01, 0x00, 0x01][..] } else { e };

    let mut out = Vec::new();
    let mut body = Vec::new();
    der_encode_unsigned_integer(&mut body, n);
    der_encode_unsigned_integer(&mut body, e);
    der_encode_tlv(&mut out, 0x30, &body);
    Ok(out)
}

fn der_encode_unsigned_integer(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    let mut value = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        value.push(0);
    }
    value.extend_from_slice(trimmed);
    der_encode_tlv(out, 0x02, &value);
}

fn der_encode_tlv(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    der_encode_length(out, value.len());
    out.extend_from_slice(value);
}

fn der_encode_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let len_bytes = len.to_be_bytes();
    let first_nonzero = len_bytes.iter().position(|&b| b != 0).unwrap_or(len_bytes.len() - 1);
    let significant = &len_bytes[first_nonzero..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

    #[test]
    fn sha256_matches_known_vector() {
        let digest = sha256(b"abc");
        let expected: [u8; 32] = hex_literal::hex!(
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(expected, digest);
    }

    #[test]
    fn verify_roundtrip_es256() {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                .unwrap();
        let message = b"authenticator data || client data hash";
        let signature = key_pair.sign(&rng, message).unwrap();

        let public = key_pair.public_key().as_ref();
        // public is 0x04 || X(32) || Y(32)
        let x = public[1..33].to_vec();
        let y = public[33..65].to_vec();
        let cose = CoseKey::new_ec2(CoseAlgorithm::ES256, EcdsaCurve::Secp256r1, x, y);

        let provider = RingCryptoProvider::new();
        provider
            .verify(&cose, message, signature.as_ref())
            .expect("valid signature should verify");

        let mut tampered = signature.as_ref().to_vec();
        tampered[0] ^= 0xff;
        assert!(provider.verify(&cose, message, &tampered).is_err());
    }

    #[test]
    fn rejects_es512() {
        let cose = CoseKey::new_ec2(CoseAlgorithm::ES512, EcdsaCurve::Secp521r1, vec![0; 66], vec![0; 66]);
        let provider = RingCryptoProvider::new();
        let err = provider.verify(&cose, b"msg", b"sig").unwrap_err();
        assert!(matches!(err, WebauthnError::NotAllowedAlgorithm(CoseAlgorithm::ES512)));
    }
}
