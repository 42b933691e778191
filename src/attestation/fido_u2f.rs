//! `fido-u2f` attestation: the legacy U2F raw-message format,
//! still the most common "Basic" attestation on the wire.
//!
//! The signed-data layout below assumes a 65-byte uncompressed P-256 point
//! (`1 + 32 + 32`). Non-P-256 credentials are rejected before that buffer
//! is ever built.

use crate::crypto::CryptoProvider;
use crate::error::{WebauthnError, WebauthnResult};
use crate::model::{
    AttestationType, AuthenticatorData, CoseAlgorithm, CoseKeyMaterial, EcdsaCurve,
    FidoU2fAttestationStatement,
};

/// Builds the U2F raw signed-data buffer:
/// `0x00 ‖ rpIdHash ‖ clientDataHash ‖ credentialId ‖ (0x04 ‖ X ‖ Y)`.
fn signed_data(rp_id_hash: &[u8; 32], client_data_hash: &[u8], credential_id: &[u8], ec_point: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 32 + client_data_hash.len() + credential_id.len() + ec_point.len());
    out.push(0x00);
    out.extend_from_slice(rp_id_hash);
    out.extend_from_slice(client_data_hash);
    out.extend_from_slice(credential_id);
    out.extend_from_slice(ec_point);
    out
}

pub fn verify(
    crypto: &dyn CryptoProvider,
    stmt: &FidoU2fAttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> WebauthnResult<AttestationType> {
    if stmt.x5c.len() != 1 {
        return Err(WebauthnError::BadAttestationStatement {
            reason: format!("fido-u2f requires exactly one certificate, found {}", stmt.x5c.len()),
        });
    }

    let attested = auth_data.attested_credential_data.as_ref().ok_or(WebauthnError::ConstraintViolation {
        reason: "fido-u2f attestation requires attestedCredentialData",
    })?;

    let ec2 = match &attested.credential_public_key.material {
        CoseKeyMaterial::Ec2(ec2) if ec2.curve == EcdsaCurve::Secp256r1 => ec2,
        _ => {
            return Err(WebauthnError::BadAttestationStatement {
                reason: "fido-u2f requires a P-256 EC2 credential public key".into(),
            })
        }
    };

    let mut ec_point = Vec::with_capacity(65);
    ec_point.push(0x04);
    ec_point.extend_from_slice(&ec2.x);
    ec_point.extend_from_slice(&ec2.y);

    let signed = signed_data(&auth_data.rp_id_hash, client_data_hash, &attested.credential_id, &ec_point);

    crypto.verify_with_certificate(CoseAlgorithm::ES256, &stmt.x5c[0].0, &signed, &stmt.sig)?;

    Ok(AttestationType::Basic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RingCryptoProvider;
    use crate::model::{Aaguid, AttestationCertificate, AttestedCredentialData, AuthenticatorDataFlags, CoseKey, ExtensionOutputs};

    #[test]
    fn signed_data_matches_u2f_layout() {
        let rp_id_hash = [1u8; 32];
        let client_data_hash = [2u8; 32];
        let credential_id = vec![3u8, 4];
        let ec_point = vec![0x04; 65];
        let built = signed_data(&rp_id_hash, &client_data_hash, &credential_id, &ec_point);

        assert_eq!(built[0], 0x00);
        assert_eq!(&built[1..33], &rp_id_hash);
        assert_eq!(&built[33..65], &client_data_hash);
        assert_eq!(&built[65..67], &credential_id[..]);
        assert_eq!(&built[67..], &ec_point[..]);
    }

    #[test]
    fn rejects_non_p256_credential() {
        let auth_data = AuthenticatorData {
            rp_id_hash: [0u8; 32],
            flags: AuthenticatorDataFlags::UP | AuthenticatorDataFlags::AT,
            sign_count: 0,
            attested_credential_data: Some(AttestedCredentialData {
                aaguid: Aaguid([0u8; 16]),
                credential_id: vec![1],
                credential_public_key: CoseKey::new_okp(CoseAlgorithm::EdDSA, vec![0u8; 32]),
            }),
            extensions: ExtensionOutputs::new(),
        };
        let stmt = FidoU2fAttestationStatement {
            sig: vec![0; 8],
            x5c: vec![AttestationCertificate(vec![0xde, 0xad])],
        };
        let crypto = RingCryptoProvider::new();
        let err = verify(&crypto, &stmt, &auth_data, &[0u8; 32]).unwrap_err();
        assert!(matches!(err, WebauthnError::BadAttestationStatement { .. }));
    }
}
