//! Checks shared verbatim between the registration and authentication
//! pipelines: challenge equality and token-binding status handling.

use subtle::ConstantTimeEq;

use crate::error::{WebauthnError, WebauthnResult};
use crate::model::{CollectedClientData, ServerProperty, TokenBindingStatus};

/// Constant-time challenge comparison; lengths are compared first (in the
/// clear -- challenge length is not a secret) to avoid `subtle`'s
/// equal-length precondition panicking on mismatched inputs.
pub fn validate_challenge(presented: &[u8], expected: &[u8]) -> WebauthnResult<()> {
    if presented.len() != expected.len() || presented.ct_eq(expected).unwrap_u8() != 1 {
        Err(WebauthnError::BadChallenge)
    } else {
        Ok(())
    }
}

/// `status == supported` without a server-side expected id is treated as a
/// pass rather than a failure. `status == present` always requires a
/// server-side expected id to compare against; a server that never
/// recorded one cannot have bound anything, so that case fails too.
pub fn validate_token_binding(client_data: &CollectedClientData, server_property: &ServerProperty) -> WebauthnResult<()> {
    let Some(token_binding) = &client_data.token_binding else {
        return Ok(());
    };
    match token_binding.status {
        TokenBindingStatus::Present => {
            let Some(expected_id) = server_property.token_binding_id.as_deref() else {
                return Err(WebauthnError::TokenBindingException {
                    reason: "token binding present but the server recorded no expected id".into(),
                });
            };
            if token_binding.id.as_deref() != Some(expected_id) {
                return Err(WebauthnError::TokenBindingException {
                    reason: "token binding id does not match the server-side expected id".into(),
                });
            }
            Ok(())
        }
        TokenBindingStatus::Supported => Ok(()),
    }
}
