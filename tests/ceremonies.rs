//! End-to-end ceremony scenarios, against the public
//! `RegistrationValidator`/`AuthenticationValidator` entry points.
//!
//! Scenarios that require a full, trust-anchored X.509 certificate chain
//! (fido-u2f Basic, tpm AttCA) are a known gap: neither here nor in
//! `src/attestation/fido_u2f.rs`/`tpm.rs` does any test drive a real
//! accept case with a valid `x5c`. Those modules' unit tests only cover
//! precondition and rejection paths (bad version, missing x5c, non-P-256
//! credentials); synthesizing conformant certificates without a
//! certificate-generation dependency is out of scope for a hand-built
//! test vector. Tracked as a real coverage hole, not exercised coverage.

use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

use webauthn_ceremony_core::config::ValidatorConfigBuilder;
use webauthn_ceremony_core::crypto::sha256;
use webauthn_ceremony_core::error::WebauthnError;
use webauthn_ceremony_core::model::{
    Aaguid, AttestationObject, AttestationStatement, AttestationType, AttestedCredentialData, Authenticator,
    AuthenticationData, AuthenticatorData, AuthenticatorDataFlags, ClientDataType, CollectedClientData, CoseAlgorithm,
    CoseKey, EcdsaCurve, ExtensionOutputs, FidoU2fAttestationStatement, PackedAttestationStatement, RegistrationData,
    ServerProperty,
};
use webauthn_ceremony_core::{AuthenticationValidator, RegistrationValidator};

const RP_ID: &str = "example.com";
const ORIGIN: &str = "https://example.com";

fn rp_id_hash() -> [u8; 32] {
    sha256(RP_ID.as_bytes())
}

fn server_property(challenge: Vec<u8>) -> ServerProperty {
    ServerProperty {
        origins: vec![ORIGIN.to_string()],
        rp_id: RP_ID.to_string(),
        challenge,
        token_binding_id: None,
    }
}

fn client_data(ty: ClientDataType, challenge: Vec<u8>, origin: &str, cross_origin: Option<bool>) -> (CollectedClientData, Vec<u8>) {
    let collected = CollectedClientData {
        ty,
        challenge: challenge.clone(),
        origin: origin.to_string(),
        cross_origin,
        token_binding: None,
    };
    // A byte-exact JSON encoding is not needed beyond its hash; any
    // deterministic byte string tied to the challenge suffices for these
    // tests since the core never re-parses it.
    let mut json_bytes = format!("{{\"type\":\"{}\",\"origin\":\"{}\"}}", collected.ty.as_str(), origin).into_bytes();
    json_bytes.extend_from_slice(&challenge);
    (collected, json_bytes)
}

fn keypair() -> (EcdsaKeyPair, CoseKey) {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng).unwrap();
    let public = key_pair.public_key().as_ref();
    let cose = CoseKey::new_ec2(CoseAlgorithm::ES256, EcdsaCurve::Secp256r1, public[1..33].to_vec(), public[33..65].to_vec());
    (key_pair, cose)
}

#[test]
fn happy_registration_with_none_attestation() {
    let config = ValidatorConfigBuilder::new()
        .user_verification_required(false)
        .user_presence_required(true)
        .build();
    let validator = RegistrationValidator::new(&config);

    let challenge = vec![9u8; 16];
    let (_key_pair, cose) = keypair();
    let (collected, client_data_json_bytes) = client_data(ClientDataType::Create, challenge.clone(), ORIGIN, Some(false));

    let auth_data = AuthenticatorData {
        rp_id_hash: rp_id_hash(),
        flags: AuthenticatorDataFlags::UP | AuthenticatorDataFlags::AT,
        sign_count: 0,
        attested_credential_data: Some(AttestedCredentialData {
            aaguid: Aaguid([0u8; 16]),
            credential_id: vec![1, 2, 3, 4],
            credential_public_key: cose,
        }),
        extensions: ExtensionOutputs::new(),
    };
    let authenticator_data_bytes = b"authenticator-data-bytes-for-none".to_vec();

    let registration_data = RegistrationData {
        authenticator_data_bytes,
        client_data_json_bytes,
        collected_client_data: collected,
        attestation_object: AttestationObject {
            auth_data,
            att_stmt: AttestationStatement::None,
        },
    };

    let server_property = server_property(challenge);
    let result = validator.validate(&registration_data, &server_property).unwrap();
    assert_eq!(result, AttestationType::None);
}

#[test]
fn packed_self_attestation_registration() {
    let config = ValidatorConfigBuilder::new()
        .user_verification_required(false)
        .user_presence_required(true)
        .build();
    let validator = RegistrationValidator::new(&config);

    let challenge = vec![3u8; 16];
    let (key_pair, cose) = keypair();
    let (collected, client_data_json_bytes) = client_data(ClientDataType::Create, challenge.clone(), ORIGIN, Some(false));
    let client_data_hash = sha256(&client_data_json_bytes);
    let authenticator_data_bytes = b"authenticator-data-bytes-for-self".to_vec();

    let mut signed_message = authenticator_data_bytes.clone();
    signed_message.extend_from_slice(&client_data_hash);
    let rng = SystemRandom::new();
    let sig = key_pair.sign(&rng, &signed_message).unwrap();

    let auth_data = AuthenticatorData {
        rp_id_hash: rp_id_hash(),
        flags: AuthenticatorDataFlags::UP | AuthenticatorDataFlags::AT,
        sign_count: 0,
        attested_credential_data: Some(AttestedCredentialData {
            aaguid: Aaguid([0u8; 16]),
            credential_id: vec![5, 6, 7],
            credential_public_key: cose,
        }),
        extensions: ExtensionOutputs::new(),
    };

    let registration_data = RegistrationData {
        authenticator_data_bytes,
        client_data_json_bytes,
        collected_client_data: collected,
        attestation_object: AttestationObject {
            auth_data,
            att_stmt: AttestationStatement::Packed(PackedAttestationStatement {
                alg: CoseAlgorithm::ES256,
                sig: sig.as_ref().to_vec(),
                x5c: Vec::new(),
            }),
        },
    };

    let server_property = server_property(challenge);
    let result = validator.validate(&registration_data, &server_property).unwrap();
    assert_eq!(result, AttestationType::SelfAttestation);
}

fn authenticated_assertion(key_pair: &EcdsaKeyPair, sign_count: u32, challenge: Vec<u8>) -> (AuthenticationData, Vec<u8>) {
    let (collected, client_data_json_bytes) = client_data(ClientDataType::Get, challenge, ORIGIN, Some(false));
    let authenticator_data = AuthenticatorData {
        rp_id_hash: rp_id_hash(),
        flags: AuthenticatorDataFlags::UP,
        sign_count,
        attested_credential_data: None,
        extensions: ExtensionOutputs::new(),
    };
    let authenticator_data_bytes = format!("authenticator-data-bytes-{sign_count}").into_bytes();
    let signed = webauthn_ceremony_core::crypto::signed_data(&authenticator_data_bytes, &client_data_json_bytes);
    let rng = SystemRandom::new();
    let signature = key_pair.sign(&rng, &signed).unwrap();

    (
        AuthenticationData {
            credential_id: vec![1, 2, 3],
            authenticator_data_bytes,
            client_data_json_bytes,
            collected_client_data: collected,
            authenticator_data,
            signature: signature.as_ref().to_vec(),
            user_handle: None,
        },
        vec![1, 2, 3],
    )
}

#[test]
fn counter_clone_is_rejected_by_default_handler() {
    let config = ValidatorConfigBuilder::new().user_verification_required(false).build();
    let validator = AuthenticationValidator::new(&config);

    let (key_pair, cose) = keypair();
    let mut authenticator = Authenticator {
        credential_id: vec![1, 2, 3],
        credential_public_key: cose,
        aaguid: Aaguid([0u8; 16]),
        sign_count: 10,
        transports: Vec::new(),
    };

    let challenge = vec![1u8; 16];
    let (data, credential_id) = authenticated_assertion(&key_pair, 5, challenge.clone());
    let server_property = server_property(challenge);

    let err = validator
        .validate(&data, &server_property, &mut authenticator, &[credential_id])
        .unwrap_err();
    assert!(matches!(err, WebauthnError::MaliciousCounterValue { presented: 5, stored: 10 }));
    assert_eq!(authenticator.sign_count, 10, "stored counter must not change on rejection");
}

#[test]
fn increasing_counter_is_accepted_and_stored() {
    let config = ValidatorConfigBuilder::new().user_verification_required(false).build();
    let validator = AuthenticationValidator::new(&config);

    let (key_pair, cose) = keypair();
    let mut authenticator = Authenticator {
        credential_id: vec![1, 2, 3],
        credential_public_key: cose,
        aaguid: Aaguid([0u8; 16]),
        sign_count: 10,
        transports: Vec::new(),
    };

    let challenge = vec![2u8; 16];
    let (data, credential_id) = authenticated_assertion(&key_pair, 11, challenge.clone());
    let server_property = server_property(challenge);

    validator.validate(&data, &server_property, &mut authenticator, &[credential_id]).unwrap();
    assert_eq!(authenticator.sign_count, 11);
}

#[test]
fn cross_origin_prohibited_then_allowed() {
    let (key_pair, cose) = keypair();
    let challenge = vec![4u8; 16];

    let strict_config = ValidatorConfigBuilder::new()
        .user_verification_required(false)
        .cross_origin_allowed(false)
        .build();
    let mut authenticator = Authenticator {
        credential_id: vec![1, 2, 3],
        credential_public_key: cose.clone(),
        aaguid: Aaguid([0u8; 16]),
        sign_count: 0,
        transports: Vec::new(),
    };
    let (mut data, credential_id) = authenticated_assertion(&key_pair, 1, challenge.clone());
    data.collected_client_data.cross_origin = Some(true);
    let server_property = server_property(challenge.clone());

    let validator = AuthenticationValidator::new(&strict_config);
    let err = validator
        .validate(&data, &server_property, &mut authenticator, &[credential_id.clone()])
        .unwrap_err();
    assert!(matches!(err, WebauthnError::CrossOrigin));

    let permissive_config = ValidatorConfigBuilder::new()
        .user_verification_required(false)
        .cross_origin_allowed(true)
        .build();
    let validator = AuthenticationValidator::new(&permissive_config);
    validator.validate(&data, &server_property, &mut authenticator, &[credential_id]).unwrap();
}

#[test]
fn allow_credentials_mismatch_is_rejected() {
    let config = ValidatorConfigBuilder::new().user_verification_required(false).build();
    let validator = AuthenticationValidator::new(&config);

    let (key_pair, cose) = keypair();
    let mut authenticator = Authenticator {
        credential_id: vec![1, 2, 3],
        credential_public_key: cose,
        aaguid: Aaguid([0u8; 16]),
        sign_count: 0,
        transports: Vec::new(),
    };

    let challenge = vec![5u8; 16];
    let (data, _credential_id) = authenticated_assertion(&key_pair, 1, challenge.clone());
    let server_property = server_property(challenge);

    let err = validator
        .validate(&data, &server_property, &mut authenticator, &[vec![9, 9, 9]])
        .unwrap_err();
    assert!(matches!(err, WebauthnError::NotAllowedCredentialId));
}

#[test]
fn fido_u2f_rejects_non_p256_before_touching_x5c() {
    // Confirms the open-question (a) guard fires through the public
    // RegistrationValidator entry point, not just the unit-level function.
    let config = ValidatorConfigBuilder::new()
        .user_verification_required(false)
        .user_presence_required(true)
        .build();
    let validator = RegistrationValidator::new(&config);

    let challenge = vec![6u8; 16];
    let (collected, client_data_json_bytes) = client_data(ClientDataType::Create, challenge.clone(), ORIGIN, Some(false));
    let auth_data = AuthenticatorData {
        rp_id_hash: rp_id_hash(),
        flags: AuthenticatorDataFlags::UP | AuthenticatorDataFlags::AT,
        sign_count: 0,
        attested_credential_data: Some(AttestedCredentialData {
            aaguid: Aaguid([0u8; 16]),
            credential_id: vec![1],
            credential_public_key: CoseKey::new_okp(CoseAlgorithm::EdDSA, vec![0u8; 32]),
        }),
        extensions: ExtensionOutputs::new(),
    };

    let registration_data = RegistrationData {
        authenticator_data_bytes: b"bytes".to_vec(),
        client_data_json_bytes,
        collected_client_data: collected,
        attestation_object: AttestationObject {
            auth_data,
            att_stmt: AttestationStatement::FidoU2f(FidoU2fAttestationStatement {
                sig: vec![0; 8],
                x5c: vec![webauthn_ceremony_core::model::AttestationCertificate(vec![0xde, 0xad])],
            }),
        },
    };

    let server_property = server_property(challenge);
    let err = validator.validate(&registration_data, &server_property).unwrap_err();
    assert!(matches!(err, WebauthnError::BadAttestationStatement { .. }));
}
