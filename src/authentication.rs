//! Authentication-ceremony (assertion) orchestration.

use tracing::{debug, instrument, warn};

use crate::common::{validate_challenge, validate_token_binding};
use crate::config::ValidatorConfig;
use crate::crypto::{sha256, CryptoProvider};
use crate::error::{WebauthnError, WebauthnResult};
use crate::extensions::validate_extension_outputs;
use crate::model::{Authenticator, AuthenticationData, ClientDataType, ServerProperty};

/// Orchestrates the 12-step authentication ceremony. Stateless
/// beyond the in-place `signCount` update on the caller-owned `Authenticator`.
pub struct AuthenticationValidator<'a> {
    config: &'a ValidatorConfig,
}

impl<'a> AuthenticationValidator<'a> {
    pub fn new(config: &'a ValidatorConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self, data, server_property, authenticator, allow_credentials), fields(rp_id = %server_property.rp_id))]
    pub fn validate(
        &self,
        data: &AuthenticationData,
        server_property: &ServerProperty,
        authenticator: &mut Authenticator,
        allow_credentials: &[Vec<u8>],
    ) -> WebauthnResult<()> {
        // Step 1: allow-list, public data, no timing-safe compare required.
        if !allow_credentials.is_empty() && !allow_credentials.iter().any(|id| id == &data.credential_id) {
            return Err(WebauthnError::NotAllowedCredentialId);
        }

        // Step 2: client-data type.
        if data.collected_client_data.ty != ClientDataType::Get {
            return Err(WebauthnError::InconsistentClientDataType {
                expected: "webauthn.get",
                actual: format!("{:?}", data.collected_client_data.ty),
            });
        }

        // Step 3: challenge equality, constant-time.
        validate_challenge(&data.collected_client_data.challenge, &server_property.challenge)?;

        // Step 4: origin.
        if !self.config.origin_validator.is_valid_origin(&data.collected_client_data.origin, server_property) {
            return Err(WebauthnError::BadOrigin {
                origin: data.collected_client_data.origin.clone(),
            });
        }

        // Step 5: cross-origin policy.
        if data.collected_client_data.cross_origin == Some(true) && !self.config.cross_origin_allowed {
            return Err(WebauthnError::CrossOrigin);
        }

        // Step 6: token binding.
        validate_token_binding(&data.collected_client_data, server_property)?;

        // Step 7: rpIdHash equality.
        if data.authenticator_data.rp_id_hash != sha256(server_property.rp_id.as_bytes()) {
            return Err(WebauthnError::BadRpId);
        }

        // Step 8: UV/UP policy.
        if self.config.user_verification_required && !data.authenticator_data.user_verified() {
            return Err(WebauthnError::UserNotVerified);
        }
        if self.config.user_presence_required && !data.authenticator_data.user_present() {
            return Err(WebauthnError::UserNotPresent);
        }

        // Step 9: attestedCredentialData MUST be absent; extension outputs.
        if data.authenticator_data.attested_credential_data.is_some() {
            return Err(WebauthnError::ConstraintViolation {
                reason: "authentication authenticatorData must not carry attestedCredentialData",
            });
        }
        validate_extension_outputs(&data.authenticator_data.extensions, self.config.extension_registry.as_ref())?;

        // Step 10: assertion signature.
        let signed_data = crate::crypto::signed_data(&data.authenticator_data_bytes, &data.client_data_json_bytes);
        self.config
            .crypto
            .verify(&authenticator.credential_public_key, &signed_data, &data.signature)?;

        // Step 11: counter anti-clone.
        let presented = data.authenticator_data.sign_count;
        let stored = authenticator.sign_count;
        if presented == 0 && stored == 0 {
            debug!("authenticator does not maintain a signature counter; skipping clone check");
        } else if presented > stored {
            authenticator.sign_count = presented;
        } else {
            warn!(presented, stored, "non-increasing signature counter");
            self.config.malicious_counter_handler.handle(presented, stored)?;
        }

        // Step 12: custom validators, in insertion order.
        for validator in &self.config.custom_authentication_validators {
            validator.validate(data, server_property)?;
        }

        debug!("authentication ceremony accepted");
        Ok(())
    }
}

