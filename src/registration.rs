//! Registration-ceremony orchestration.

use tracing::{debug, instrument};

use crate::attestation::AttestationDispatcher;
use crate::common::{validate_challenge, validate_token_binding};
use crate::config::ValidatorConfig;
use crate::crypto::sha256;
use crate::error::{WebauthnError, WebauthnResult};
use crate::extensions::validate_extension_outputs;
use crate::model::{AttestationType, ClientDataType, RegistrationData, ServerProperty};
use crate::self_attestation::SelfAttestationTrustworthinessValidator;
use crate::trust::{CertPathTrustworthinessValidator, MetadataBackedTrustAnchorResolver};

/// Orchestrates the 8-step registration ceremony. Stateless: every
/// `validate` call is independent and safe to run concurrently.
pub struct RegistrationValidator<'a> {
    config: &'a ValidatorConfig,
}

impl<'a> RegistrationValidator<'a> {
    pub fn new(config: &'a ValidatorConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self, data, server_property), fields(rp_id = %server_property.rp_id))]
    pub fn validate(&self, data: &RegistrationData, server_property: &ServerProperty) -> WebauthnResult<AttestationType> {
        let auth_data = &data.attestation_object.auth_data;

        // Step 1: attestedCredentialData present.
        let attested = auth_data.attested_credential_data.as_ref().ok_or(WebauthnError::ConstraintViolation {
            reason: "registration authenticatorData is missing attestedCredentialData",
        })?;

        if data.collected_client_data.ty != ClientDataType::Create {
            return Err(WebauthnError::InconsistentClientDataType {
                expected: "webauthn.create",
                actual: format!("{:?}", data.collected_client_data.ty),
            });
        }

        validate_challenge(&data.collected_client_data.challenge, &server_property.challenge)?;

        if !self.config.origin_validator.is_valid_origin(&data.collected_client_data.origin, server_property) {
            return Err(WebauthnError::BadOrigin {
                origin: data.collected_client_data.origin.clone(),
            });
        }

        if data.collected_client_data.cross_origin == Some(true) && !self.config.cross_origin_allowed {
            return Err(WebauthnError::CrossOrigin);
        }

        validate_token_binding(&data.collected_client_data, server_property)?;

        // Step 2: rpIdHash equality.
        if auth_data.rp_id_hash != sha256(server_property.rp_id.as_bytes()) {
            return Err(WebauthnError::BadRpId);
        }

        // Step 3: UV/UP policy.
        if self.config.user_verification_required && !auth_data.user_verified() {
            return Err(WebauthnError::UserNotVerified);
        }
        if self.config.user_presence_required && !auth_data.user_present() {
            return Err(WebauthnError::UserNotPresent);
        }

        // Step 4: algorithm allow-list.
        if !self.config.accepted_algorithms.is_empty()
            && !self.config.accepted_algorithms.contains(&attested.credential_public_key.alg)
        {
            return Err(WebauthnError::NotAllowedAlgorithm(attested.credential_public_key.alg));
        }

        // Step 5: extension outputs.
        validate_extension_outputs(&auth_data.extensions, self.config.extension_registry.as_ref())?;

        // Step 6: dispatch attestation.
        let client_data_hash = sha256(&data.client_data_json_bytes);
        let dispatcher = AttestationDispatcher::new(self.config.crypto.as_ref(), self.config.attestation_policy);
        let attestation_type =
            dispatcher.dispatch(&data.attestation_object, &data.authenticator_data_bytes, &client_data_hash)?;

        // Step 7: trustworthiness, keyed by the kind of attestation returned.
        match attestation_type {
            AttestationType::Basic | AttestationType::AttCa | AttestationType::AnonCa => {
                let x5c = x5c_of(&data.attestation_object.att_stmt);
                let resolver = MetadataBackedTrustAnchorResolver {
                    metadata: self.config.metadata.as_ref(),
                    repository: self.config.trust_anchors.as_ref(),
                };
                let anchors = resolver.resolve_by_aaguid(attested.aaguid)?;
                let validator = CertPathTrustworthinessValidator::new(self.config.crypto.as_ref());
                validator.validate(x5c, &anchors)?;
            }
            AttestationType::SelfAttestation => {
                self.config.self_attestation_validator.validate()?;
            }
            AttestationType::None => {}
        }

        // Step 8: custom validators, in insertion order.
        for validator in &self.config.custom_registration_validators {
            validator.validate(data, server_property)?;
        }

        debug!(?attestation_type, aaguid = %attested.aaguid, "registration ceremony accepted");
        Ok(attestation_type)
    }
}

fn x5c_of(stmt: &crate::model::AttestationStatement) -> &[crate::model::AttestationCertificate] {
    use crate::model::AttestationStatement::*;
    match stmt {
        Packed(s) => &s.x5c,
        Tpm(s) => &s.x5c,
        AndroidKey(s) => &s.x5c,
        Apple(s) => &s.x5c,
        FidoU2f(s) => &s.x5c,
        AndroidSafetyNet(_) | None => &[],
    }
}
