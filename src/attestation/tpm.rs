//! `tpm` attestation: Windows Hello and other TPM 2.0-backed
//! authenticators. The AIK never signs the credential directly; it signs a
//! `TPMS_ATTEST` (`certInfo`) that in turn names the `pubArea`.

use ring::digest;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::crypto::{digest_algorithm_for, digest_with, CryptoProvider};
use crate::error::{WebauthnError, WebauthnResult};
use crate::hooks::{TpmDevicePropertyDecoder, TpmDevicePropertyValidator};
use crate::model::{
    AttestationType, AuthenticatorData, CoseKeyMaterial, TpmAttestationStatement, TpmNameAlg, TpmPublicKey,
};
use crate::trust::{require_not_ca, unwrap_octet_string_extension_value};

const TPM_GENERATED_VALUE: u32 = 0xFF54_4347;
const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;
const FIDO_GEN_CE_AAGUID_OID: &str = "1.3.6.1.4.1.45724.1.1.4";
const TCG_KP_AIK_CERTIFICATE_OID: &str = "2.23.133.8.3";

fn name_digest(name_alg: TpmNameAlg, pub_area_bytes: &[u8]) -> Vec<u8> {
    let algorithm = match name_alg {
        TpmNameAlg::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
        TpmNameAlg::Sha256 => &digest::SHA256,
        TpmNameAlg::Sha384 => &digest::SHA384,
        TpmNameAlg::Sha512 => &digest::SHA512,
    };
    digest_with(algorithm, pub_area_bytes)
}

fn pub_area_matches_credential_key(pub_area: &TpmPublicKey, credential_key: &CoseKeyMaterial) -> bool {
    match (pub_area, credential_key) {
        (TpmPublicKey::Rsa { modulus, exponent }, CoseKeyMaterial::Rsa(rsa)) => {
            let expected_exponent: u32 = if rsa.e.is_empty() {
                65537
            } else {
                rsa.e.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
            };
            modulus.as_slice() == rsa.n.as_slice() && *exponent == expected_exponent
        }
        (TpmPublicKey::Ecc { curve, x, y }, CoseKeyMaterial::Ec2(ec2)) => {
            *curve == ec2.curve && x.as_slice() == ec2.x.as_slice() && y.as_slice() == ec2.y.as_slice()
        }
        _ => false,
    }
}

pub fn verify(
    crypto: &dyn CryptoProvider,
    stmt: &TpmAttestationStatement,
    auth_data: &AuthenticatorData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
) -> WebauthnResult<AttestationType> {
    verify_with_device_property(crypto, stmt, auth_data, auth_data_bytes, client_data_hash, None, None)
}

/// Same as [`verify`] but threads through an optional TPM device-property
/// decoder/validator pair, for callers that enforce a vendor allow-list on
/// the AIK's SAN-carried manufacturer/model/firmware triple.
pub fn verify_with_device_property(
    crypto: &dyn CryptoProvider,
    stmt: &TpmAttestationStatement,
    auth_data: &AuthenticatorData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
    decoder: Option<&dyn TpmDevicePropertyDecoder>,
    validator: Option<&dyn TpmDevicePropertyValidator>,
) -> WebauthnResult<AttestationType> {
    if stmt.ver != "2.0" {
        return Err(WebauthnError::BadAttestationStatement {
            reason: format!("tpm ver must be \"2.0\", found {:?}", stmt.ver),
        });
    }

    let attested = auth_data.attested_credential_data.as_ref().ok_or(WebauthnError::ConstraintViolation {
        reason: "tpm attestation requires attestedCredentialData",
    })?;

    if !pub_area_matches_credential_key(&stmt.pub_area.public_key, &attested.credential_public_key.material) {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm pubArea key does not match the credential public key".into(),
        });
    }

    if stmt.cert_info.magic != TPM_GENERATED_VALUE {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm certInfo.magic is not TPM_GENERATED_VALUE".into(),
        });
    }
    if stmt.cert_info.ty != TPM_ST_ATTEST_CERTIFY {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm certInfo.type is not TPM_ST_ATTEST_CERTIFY".into(),
        });
    }

    let mut signed = Vec::with_capacity(auth_data_bytes.len() + client_data_hash.len());
    signed.extend_from_slice(auth_data_bytes);
    signed.extend_from_slice(client_data_hash);
    let expected_extra_data = digest_with(digest_algorithm_for(stmt.alg)?, &signed);
    if stmt.cert_info.extra_data != expected_extra_data {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm certInfo.extraData does not match H_alg(authData || clientDataHash)".into(),
        });
    }

    let expected_name = name_digest(stmt.cert_info.name_alg, &stmt.pub_area.raw);
    if stmt.cert_info.attested_name != expected_name {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm certInfo.attested.name does not match the recomputed pubArea digest".into(),
        });
    }

    if stmt.x5c.is_empty() {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm attestation without x5c (ECDAA) is not supported".into(),
        });
    }

    let leaf_der = &stmt.x5c[0].0;
    crypto.verify_with_certificate(stmt.alg, leaf_der, &stmt.cert_info.raw, &stmt.sig)?;

    let (_, leaf) = X509Certificate::from_der(leaf_der).map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "tpm x5c[0] is not a parseable X.509 certificate".into(),
    })?;

    if leaf.version != x509_parser::x509::X509Version::V3 {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm AIK certificate must be X.509 version 3".into(),
        });
    }
    if !leaf.subject().as_raw().is_empty() {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm AIK certificate must have an empty Subject".into(),
        });
    }
    require_not_ca(&leaf)?;

    let eku_ok = leaf
        .extended_key_usage()
        .ok()
        .flatten()
        .map(|eku| eku.value.other.iter().any(|oid| oid.to_id_string() == TCG_KP_AIK_CERTIFICATE_OID))
        .unwrap_or(false);
    if !eku_ok {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm AIK certificate EKU must contain tcg-kp-AIKCertificate".into(),
        });
    }

    let device_property = if let (Some(decoder), Some(san_triple)) = (decoder, extract_san_tpm_triple(&leaf)) {
        let (manufacturer, model, version) = san_triple;
        let property = decoder.decode(&manufacturer, &model, &version)?;
        Some(property)
    } else {
        None
    };
    if let (Some(validator), Some(property)) = (validator, device_property.as_ref()) {
        if !validator.is_acceptable(property) {
            return Err(WebauthnError::BadAttestationStatement {
                reason: "tpm AIK device property rejected by policy".into(),
            });
        }
    }
    if decoder.is_some() && device_property.is_none() {
        return Err(WebauthnError::BadAttestationStatement {
            reason: "tpm AIK certificate SAN does not carry a decodable TPM device property".into(),
        });
    }

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

    Ok(AttestationType::AttCa)
}

/// Pulls the `directoryName` TPM device-property string out of a SAN
/// extension, if present. The three TPM OIDs (`tcg-at-tpmManufacturer`,
/// `tcg-at-tpmModel`, `tcg-at-tpmVersion`) are carried as
/// `AttributeTypeAndValue`s inside a single `directoryName` GeneralName.
fn extract_san_tpm_triple(cert: &X509Certificate<'_>) -> Option<(String, String, String)> {
    const TCG_AT_TPM_MANUFACTURER: &str = "2.23.133.2.1";
    const TCG_AT_TPM_MODEL: &str = "2.23.133.2.2";
    const TCG_AT_TPM_VERSION: &str = "2.23.133.2.3";

    let san = cert.subject_alternative_name().ok().flatten()?;
    for name in &san.value.general_names {
        if let x509_parser::extensions::GeneralName::DirectoryName(dir_name) = name {
            let mut manufacturer = None;
            let mut model = None;
            let mut version = None;
            for attr in dir_name.iter_attributes() {
                let oid = attr.attr_type.to_id_string();
                let value = attr.attr_value.as_str().ok()?.to_string();
                if oid == TCG_AT_TPM_MANUFACTURER {
                    manufacturer = Some(value);
                } else if oid == TCG_AT_TPM_MODEL {
                    model = Some(value);
                } else if oid == TCG_AT_TPM_VERSION {
                    version = Some(value);
                }
            }
            if let (Some(m), Some(mo), Some(v)) = (manufacturer, model, version) {
                return Some((m, mo, v));
            }
        }
    }
    None
}
