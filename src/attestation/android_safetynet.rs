//! `android-safetynet` attestation: a signed attestation obtained
//! from Google Play Services, carried as a compact JWS.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::crypto::{sha256, CryptoProvider};
use crate::error::{WebauthnError, WebauthnResult};
use crate::model::{AndroidSafetyNetAttestationStatement, AttestationType, AuthenticatorData, CoseAlgorithm};

const EXPECTED_LEAF_CN: &str = "attest.android.com";

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
    x5c: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SafetyNetPayload {
    nonce: String,
    #[serde(rename = "ctsProfileMatch")]
    cts_profile_match: bool,
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
}

fn jwt_alg_to_cose(alg: &str) -> Option<CoseAlgorithm> {
    match alg {
        "RS256" => Some(CoseAlgorithm::RS256),
        "RS384" => Some(CoseAlgorithm::RS384),
        "RS512" => Some(CoseAlgorithm::RS512),
        "ES256" => Some(CoseAlgorithm::ES256),
        "ES384" => Some(CoseAlgorithm::ES384),
        _ => None,
    }
}

pub fn verify(
    crypto: &dyn CryptoProvider,
    stmt: &AndroidSafetyNetAttestationStatement,
    auth_data: &AuthenticatorData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
    timestamp_skew_seconds: u64,
) -> WebauthnResult<AttestationType> {
    let _ = auth_data;
    if stmt.ver.is_empty() {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "android-safetynet ver must not be empty".into(),
        });
    }

    let response = std::str::from_utf8(&stmt.response).map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "android-safetynet response is not valid UTF-8".into(),
    })?;
    let mut parts = response.splitn(3, '.');
    let (header_b64, payload_b64, signature_b64) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s)) => (h, p, s),
        _ => {
            return Err(WebauthnError::BadAttestationStatement {
                reason: "android-safetynet response is not a three-part compact JWS".into(),
            })
        }
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(jws_decode_err)?;
    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64).map_err(jws_decode_err)?;
    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(jws_decode_err)?;

    let header: JwsHeader = serde_json::from_slice(&header_bytes).map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "android-safetynet JWS header is not valid JSON".into(),
    })?;
    let payload: SafetyNetPayload =
        serde_json::from_slice(&payload_bytes).map_err(|_| WebauthnError::BadAttestationStatement {
            reason: "android-safetynet JWS payload is not valid JSON".into(),
        })?;

    let alg = jwt_alg_to_cose(&header.alg).ok_or_else(|| WebauthnError::BadAttestationStatement {
        reason: format!("android-safetynet JWS alg {:?} is not supported", header.alg),
    })?;

    if header.x5c.is_empty() {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "android-safetynet JWS header is missing x5c".into(),
        });
    }
    let leaf_der = STANDARD.decode(&header.x5c[0]).map_err(jws_decode_err)?;
    let (_, leaf) = X509Certificate::from_der(&leaf_der).map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "android-safetynet x5c[0] is not a parseable X.509 certificate".into(),
    })?;

    let cn_matches = leaf.subject().iter_common_name().any(|cn| cn.as_str() == Ok(EXPECTED_LEAF_CN));
    if !cn_matches {
        return Err(WebauthnError::BadAttestationStatement {
            reason: format!("android-safetynet leaf certificate CN must be {:?}", EXPECTED_LEAF_CN),
        });
    }

    let signed_input = format!("{header_b64}.{payload_b64}");
    crypto.verify_with_certificate(alg, &leaf_der, signed_input.as_bytes(), &signature)?;

    let mut nonce_input = Vec::with_capacity(auth_data_bytes.len() + client_data_hash.len());
    nonce_input.extend_from_slice(auth_data_bytes);
    nonce_input.extend_from_slice(client_data_hash);
    let expected_nonce = STANDARD.encode(sha256(&nonce_input));
    if payload.nonce != expected_nonce {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "android-safetynet nonce does not match SHA-256(authData || clientDataHash)".into(),
        });
    }

    if !payload.cts_profile_match {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "android-safetynet ctsProfileMatch is false".into(),
        });
    }

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i128)
        .unwrap_or(0);
    let skew_ms = i128::from(timestamp_skew_seconds) * 1000;
    let delta = now_ms - payload.timestamp_ms as i128;
    if delta < -skew_ms.min(60_000) || delta > skew_ms {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "android-safetynet response timestamp is outside the configured skew".into(),
        });
    }

    Ok(AttestationType::Basic)
}

fn jws_decode_err(_: base64::DecodeError) -> WebauthnError {
    WebauthnError::BadAttestationStatement {
        reason: "android-safetynet JWS segment is not valid base64".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RingCryptoProvider;
    use crate::model::{Aaguid, AttestedCredentialData, AuthenticatorDataFlags, CoseAlgorithm as Alg, CoseKey, EcdsaCurve, ExtensionOutputs};

    fn auth_data() -> AuthenticatorData {
        AuthenticatorData {
            rp_id_hash: [0u8; 32],
            flags: AuthenticatorDataFlags::UP | AuthenticatorDataFlags::AT,
            sign_count: 0,
            attested_credential_data: Some(AttestedCredentialData {
                aaguid: Aaguid([0u8; 16]),
                credential_id: vec![1],
                credential_public_key: CoseKey::new_ec2(Alg::ES256, EcdsaCurve::Secp256r1, vec![0; 32], vec![0; 32]),
            }),
            extensions: ExtensionOutputs::new(),
        }
    }

    #[test]
    fn rejects_empty_version() {
        let stmt = AndroidSafetyNetAttestationStatement {
            ver: String::new(),
            response: b"a.b.c".to_vec(),
        };
        let crypto = RingCryptoProvider::new();
        let err = verify(&crypto, &stmt, &auth_data(), b"bytes", &[0u8; 32], 60).unwrap_err();
        assert!(matches!(err, WebauthnError::BadAttestationStatement { .. }));
    }

    #[test]
    fn rejects_malformed_jws() {
        let stmt = AndroidSafetyNetAttestationStatement {
            ver: "18".into(),
            response: b"not-a-jws".to_vec(),
        };
        let crypto = RingCryptoProvider::new();
        let err = verify(&crypto, &stmt, &auth_data(), b"bytes", &[0u8; 32], 60).unwrap_err();
        assert!(matches!(err, WebauthnError::BadAttestationStatement { .. }));
    }
}
