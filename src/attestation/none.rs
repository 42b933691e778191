//! `none` attestation: no attestation statement is presented at all.

use crate::error::WebauthnResult;
use crate::model::{AttestationType, AuthenticatorData};

/// The `none` format carries no statement to verify; its presence already
/// establishes `AttestationType::None`. `auth_data` is accepted for
/// signature-uniformity with the other format verifiers even though it is
/// unused here.
pub fn verify(_auth_data: &AuthenticatorData) -> WebauthnResult<AttestationType> {
    Ok(AttestationType::None)
}
