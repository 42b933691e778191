//! `android-key` attestation: Android's hardware-backed Keystore
//! attestation extension, carried in the leaf certificate rather than in a
//! bespoke CBOR structure.

use x509_parser::certificate::X509Certificate;
use x509_parser::der_parser::ber::{parse_ber_sequence, BerObject, BerObjectContent};
use x509_parser::prelude::FromDer;

use crate::crypto::CryptoProvider;
use crate::error::{WebauthnError, WebauthnResult};
use crate::model::{AndroidKeyAttestationStatement, AttestationType, AuthenticatorData, CoseKeyMaterial};

const ANDROID_KEY_ATTESTATION_OID: &str = "1.3.6.1.4.1.11129.2.1.17";

pub fn verify(
    crypto: &dyn CryptoProvider,
    stmt: &AndroidKeyAttestationStatement,
    auth_data: &AuthenticatorData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
    tee_enforced_only: bool,
) -> WebauthnResult<AttestationType> {
    if stmt.x5c.is_empty() {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "android-key requires a non-empty x5c".into(),
        });
    }

    let attested = auth_data.attested_credential_data.as_ref().ok_or(WebauthnError::ConstraintViolation {
        reason: "android-key attestation requires attestedCredentialData",
    })?;

    let leaf_der = &stmt.x5c[0].0;
    let (_, leaf) = X509Certificate::from_der(leaf_der).map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "android-key x5c[0] is not a parseable X.509 certificate".into(),
    })?;

    ensure_leaf_key_matches_credential(&leaf, &attested.credential_public_key.material)?;

    let mut message = Vec::with_capacity(auth_data_bytes.len() + client_data_hash.len());
    message.extend_from_slice(auth_data_bytes);
    message.extend_from_slice(client_data_hash);
    crypto.verify_with_certificate(stmt.alg, leaf_der, &message, &stmt.sig)?;

    let extension = leaf
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == ANDROID_KEY_ATTESTATION_OID)
        .ok_or(WebauthnError::BadAttestationStatement {
            reason: "android-key leaf certificate is missing the key attestation extension".into(),
        })?;

    validate_key_description(&extension.value, client_data_hash, tee_enforced_only)?;

    Ok(AttestationType::Basic)
}

fn ensure_leaf_key_matches_credential(leaf: &X509Certificate<'_>, credential_key: &CoseKeyMaterial) -> WebauthnResult<()> {
    let spki = leaf.public_key().raw;
    let matches = match credential_key {
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
    if matches {
        Ok(())
    } else {
        Err(WebauthnError::BadAttestationStatement {
            reason: "android-key leaf certificate public key does not match the credential public key".into(),
        })
    }
}

/// Minimal parse of the `KeyDescription` ASN.1 SEQUENCE (Android Keystore
/// attestation extension) down to the fields the validator cares about:
/// `attestationChallenge`, and the `allApplications`/`origin`/`purpose`
/// presence inside the software- and TEE-enforced authorization lists.
///
/// `KeyDescription ::= SEQUENCE { attestationVersion INTEGER,
///   attestationSecurityLevel ENUMERATED, keymasterVersion INTEGER,
///   keymasterSecurityLevel ENUMERATED, attestationChallenge OCTET STRING,
///   uniqueId OCTET STRING, softwareEnforced AuthorizationList,
///   teeEnforced AuthorizationList }`
fn validate_key_description(der: &[u8], client_data_hash: &[u8], tee_enforced_only: bool) -> WebauthnResult<()> {
    let (_, seq) = parse_ber_sequence(der).map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "android-key KeyDescription is not a valid DER SEQUENCE".into(),
    })?;
    let fields = sequence_items(&seq).ok_or(WebauthnError::BadAttestationStatement {
        reason: "android-key KeyDescription has an unexpected shape".into(),
    })?;
    if fields.len() < 8 {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "android-key KeyDescription is missing fields".into(),
        });
    }

    let attestation_challenge = fields[4].as_slice().map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "android-key attestationChallenge is not an OCTET STRING".into(),
    })?;
    if attestation_challenge != client_data_hash {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "android-key attestationChallenge does not equal clientDataHash".into(),
        });
    }

    let software_enforced = sequence_items(&fields[6]).unwrap_or_default();
    let tee_enforced = sequence_items(&fields[7]).unwrap_or_default();

    // AuthorizationList tags: allApplications = 600, origin = 702, purpose = 1.
    if authorization_list_has_tag(&software_enforced, 600) || authorization_list_has_tag(&tee_enforced, 600) {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "android-key allApplications must be absent from both authorization lists".into(),
        });
    }

    if tee_enforced_only {
        if authorization_list_has_tag(&software_enforced, 702) || authorization_list_has_tag(&software_enforced, 1) {
            return Err(WebauthnError::BadAttestationStatement {
                reason: "android-key origin/purpose must appear only in the TEE-enforced authorization list".into(),
            });
        }
    }

    Ok(())
}

fn sequence_items<'a>(obj: &'a BerObject<'a>) -> Option<Vec<BerObject<'a>>> {
    match &obj.content {
        BerObjectContent::Sequence(items) => Some(items.clone()),
        _ => None,
    }
}

fn authorization_list_has_tag(items: &[BerObject<'_>], tag: u32) -> bool {
    items.iter().any(|item| match &item.content {
        BerObjectContent::Tagged(explicit_tag, _) => explicit_tag.0 == tag,
        _ => false,
    })
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
        let stmt = AndroidKeyAttestationStatement {
            alg: CoseAlgorithm::ES256,
            sig: vec![0; 8],
            x5c: Vec::new(),
        };
        let crypto = RingCryptoProvider::new();
        let err = verify(&crypto, &stmt, &auth_data, b"bytes", &[0u8; 32], false).unwrap_err();
        assert!(matches!(err, WebauthnError::BadAttestationStatement { .. }));
    }
}
