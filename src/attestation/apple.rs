//! `apple` attestation: Apple's anonymous attestation for platform
//! authenticators (Touch ID / Face ID / Secure Enclave). There is no
//! signature to verify against `authData ‖ clientDataHash` directly; instead
//! the leaf certificate carries a nonce extension binding it to the
//! ceremony, and the credential key itself never signs anything here.

use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::crypto::{sha256, CryptoProvider};
use crate::error::{WebauthnError, WebauthnResult};
use crate::model::{AppleAttestationStatement, AttestationType, AuthenticatorData, CoseKeyMaterial};

const APPLE_ANONYMOUS_ATTESTATION_OID: &str = "1.2.840.113635.100.8.2";

pub fn verify(
    crypto: &dyn CryptoProvider,
    stmt: &AppleAttestationStatement,
    auth_data: &AuthenticatorData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
) -> WebauthnResult<AttestationType> {
    let _ = crypto;
    if stmt.x5c.is_empty() {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "apple attestation requires a non-empty x5c".into(),
        });
    }

    let attested = auth_data.attested_credential_data.as_ref().ok_or(WebauthnError::ConstraintViolation {
        reason: "apple attestation requires attestedCredentialData",
    })?;

    let leaf_der = &stmt.x5c[0].0;
    let (_, leaf) = X509Certificate::from_der(leaf_der).map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "apple x5c[0] is not a parseable X.509 certificate".into(),
    })?;

    let extension = leaf
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == APPLE_ANONYMOUS_ATTESTATION_OID)
        .ok_or(WebauthnError::BadAttestationStatement {
            reason: "apple leaf certificate is missing the anonymous attestation extension".into(),
        })?;

    let mut nonce_input = Vec::with_capacity(auth_data_bytes.len() + client_data_hash.len());
    nonce_input.extend_from_slice(auth_data_bytes);
    nonce_input.extend_from_slice(client_data_hash);
    let expected_nonce = sha256(&nonce_input);

    // The extension wraps a single OCTET STRING nonce inside an outer
    // SEQUENCE/context-tag; rather than a full ASN.1 walk, the nonce is
    // located by its fixed 32-byte length within the extension payload.
    let nonce_matches = extension
        .value
        .windows(expected_nonce.len())
        .any(|w| w == expected_nonce);
    if !nonce_matches {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "apple attestation nonce does not match SHA-256(authData || clientDataHash)".into(),
        });
    }

    let spki = leaf.public_key().raw;
    let key_matches = match &attested.credential_public_key.material {
        CoseKeyMaterial::Ec2(ec2) => {
            let mut point = Vec::with_capacity(1 + ec2.x.len() + ec2.y.len());
            point.push(0x04);
            point.extend_from_slice(&ec2.x);
            point.extend_from_slice(&ec2.y);
            spki.windows(point.len()).any(|w| w == point.as_slice())
        }
        CoseKeyMaterial::Rsa(rsa) => spki.windows(rsa.n.len().min(spki.len())).any(|w| w == &rsa.n[..w.len()]),
        CoseKeyMaterial::Okp(okp) => spki.windows(okp.x.len()).any(|w| w == okp.x.as_slice()),
    };
    if !key_matches {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "apple x5c[0] public key does not match the credential public key".into(),
        });
    }

    Ok(AttestationType::AnonCa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RingCryptoProvider;
    use crate::model::{Aaguid, AttestedCredentialData, AuthenticatorDataFlags, CoseAlgorithm, CoseKey, EcdsaCurve, ExtensionOutputs};

    #[test]
    fn rejects_empty_x5c() {
        let auth_data = AuthenticatorData {
            rp_id_hash: [0u8; 32],
            flags: AuthenticatorDataFlags::UP | AuthenticatorDataFlags::AT,
            sign_count: 0,
            attested_credential_data: Some(AttestedCredentialData {
                aaguid: Aaguid([0u8; 16]),
                credential_id: vec![1],
                credential_public_key: CoseKey::new_ec2(CoseAlgorithm::ES256, EcdsaCurve::Secp256r1, vec![0; 32], vec![0; 32]),
            }),
            extensions: ExtensionOutputs::new(),
        };
        let stmt = AppleAttestationStatement { x5c: Vec::new() };
        let crypto = RingCryptoProvider::new();
        let err = verify(&crypto, &stmt, &auth_data, b"bytes", &[0u8; 32]).unwrap_err();
        assert!(matches!(err, WebauthnError::BadAttestationStatement { .. }));
    }
}
