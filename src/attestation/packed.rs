//! `packed` attestation: the general-purpose CBOR format, used
//! both with a full X.509 certificate chain and, for integrated
//! authenticators, with self-attestation via the credential key itself.

use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::crypto::CryptoProvider;
use crate::error::{WebauthnError, WebauthnResult};
use crate::model::{AttestationType, AuthenticatorData, PackedAttestationStatement};
use crate::trust::{require_not_ca, require_version_3, unwrap_octet_string_extension_value};

const FIDO_GEN_CE_AAGUID_OID: &str = "1.3.6.1.4.1.45724.1.1.4";

pub fn verify(
    crypto: &dyn CryptoProvider,
    stmt: &PackedAttestationStatement,
    auth_data: &AuthenticatorData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
) -> WebauthnResult<AttestationType> {
    let mut message = Vec::with_capacity(auth_data_bytes.len() + client_data_hash.len());
    message.extend_from_slice(auth_data_bytes);
    message.extend_from_slice(client_data_hash);

    if stmt.x5c.is_empty() {
        return verify_self(crypto, stmt, auth_data, &message);
    }

    let leaf_der = &stmt.x5c[0].0;
    crypto.verify_with_certificate(stmt.alg, leaf_der, &message, &stmt.sig)?;

    let (_, leaf) = X509Certificate::from_der(leaf_der).map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "packed x5c[0] is not a parseable X.509 certificate".into(),
    })?;

    require_version_3(&leaf)?;
    require_not_ca(&leaf)?;

    let ou_matches = leaf
        .subject()
        .iter_organizational_unit()
        .any(|ou| ou.as_str() == Ok("Authenticator Attestation"));
    if !ou_matches {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "packed attestation certificate subject OU must be \"Authenticator Attestation\"".into(),
        });
    }

    if let Some(attested) = &auth_data.attested_credential_data {
        for ext in leaf.extensions() {
            if ext.oid.to_id_string() == FIDO_GEN_CE_AAGUID_OID {
                let aaguid = unwrap_octet_string_extension_value(ext.value)?;
                if aaguid != attested.aaguid.0 {
                    return Err(WebauthnError::BadAttestationStatement {
                        reason: "id-fido-gen-ce-aaguid extension does not match authData.aaguid".into(),
                    });
                }
            }
        }
    }

    Ok(AttestationType::Basic)
}

fn verify_self(
    crypto: &dyn CryptoProvider,
    stmt: &PackedAttestationStatement,
    auth_data: &AuthenticatorData,
    message: &[u8],
) -> WebauthnResult<AttestationType> {
    let attested = auth_data.attested_credential_data.as_ref().ok_or(WebauthnError::ConstraintViolation {
        reason: "self-attestation requires attestedCredentialData",
    })?;

    if stmt.alg != attested.credential_public_key.alg {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "packed self-attestation alg does not match the credential public key's alg".into(),
        });
    }

    crypto.verify(&attested.credential_public_key, message, &stmt.sig)?;

    Ok(AttestationType::SelfAttestation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RingCryptoProvider;
    use crate::model::{Aaguid, AttestationCertificate, AttestedCredentialData, AuthenticatorDataFlags, CoseAlgorithm, CoseKey, EcdsaCurve, ExtensionOutputs};
    use ring::rand::SystemRandom;
    use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

    fn self_attested_auth_data(public_key: CoseKey) -> AuthenticatorData {
        AuthenticatorData {
            rp_id_hash: [0u8; 32],
            flags: AuthenticatorDataFlags::UP | AuthenticatorDataFlags::AT,
            sign_count: 0,
            attested_credential_data: Some(AttestedCredentialData {
                aaguid: Aaguid([0u8; 16]),
                credential_id: vec![1, 2, 3],
                credential_public_key: public_key,
            }),
            extensions: ExtensionOutputs::new(),
        }
    }

    #[test]
    fn self_attestation_accepts_matching_alg_and_signature() {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng).unwrap();
        let public = key_pair.public_key().as_ref();
        let cose = CoseKey::new_ec2(CoseAlgorithm::ES256, EcdsaCurve::Secp256r1, public[1..33].to_vec(), public[33..65].to_vec());

        let auth_data = self_attested_auth_data(cose);
        let auth_data_bytes = b"authenticator-data-bytes".to_vec();
        let client_data_hash = [7u8; 32];
        let mut message = auth_data_bytes.clone();
        message.extend_from_slice(&client_data_hash);
        let sig = key_pair.sign(&rng, &message).unwrap();

        let stmt = PackedAttestationStatement {
            alg: CoseAlgorithm::ES256,
            sig: sig.as_ref().to_vec(),
            x5c: Vec::new(),
        };

        let crypto = RingCryptoProvider::new();
        let result = verify(&crypto, &stmt, &auth_data, &auth_data_bytes, &client_data_hash).unwrap();
        assert_eq!(result, AttestationType::SelfAttestation);
    }

    #[test]
    fn self_attestation_rejects_alg_mismatch() {
        let auth_data = self_attested_auth_data(CoseKey::new_ec2(CoseAlgorithm::ES256, EcdsaCurve::Secp256r1, vec![0; 32], vec![0; 32]));
        let stmt = PackedAttestationStatement {
            alg: CoseAlgorithm::ES384,
            sig: vec![0; 8],
            x5c: Vec::new(),
        };
        let crypto = RingCryptoProvider::new();
        let err = verify(&crypto, &stmt, &auth_data, b"bytes", &[0u8; 32]).unwrap_err();
        assert!(matches!(err, WebauthnError::BadAttestationStatement { .. }));
    }

    #[test]
    fn full_attestation_requires_parseable_certificate() {
        let auth_data = self_attested_auth_data(CoseKey::new_ec2(CoseAlgorithm::ES256, EcdsaCurve::Secp256r1, vec![0; 32], vec![0; 32]));
        let stmt = PackedAttestationStatement {
            alg: CoseAlgorithm::ES256,
            sig: vec![0; 8],
            x5c: vec![AttestationCertificate(vec![0xde, 0xad, 0xbe, 0xef])],
        };
        let crypto = RingCryptoProvider::new();
        let err = verify(&crypto, &stmt, &auth_data, b"bytes", &[0u8; 32]).unwrap_err();
        assert!(matches!(err, WebauthnError::BadAttestationStatement { .. } | WebauthnError::BadSignature));
    }
}
