//! Attestation-statement dispatch: selects the format-specific
//! validator by `attStmt.fmt` and runs it. Each arm is a plain function over
//! a narrow input type -- no reflection, no shared base class.

pub mod android_key;
pub mod android_safetynet;
pub mod apple;
pub mod fido_u2f;
pub mod none;
pub mod packed;
pub mod tpm;

use tracing::instrument;

use crate::crypto::CryptoProvider;
use crate::error::WebauthnResult;
use crate::model::{AttestationObject, AttestationStatement, AttestationType};

/// RP policy that affects how attestation statements are evaluated, beyond
/// pure cryptography.
#[derive(Debug, Clone, Copy)]
pub struct AttestationPolicy {
    /// android-key: restrict `origin`/`purpose` fields to the TEE-enforced
    /// authorization list.
    pub android_key_tee_enforced_only: bool,
    /// android-safetynet: forward clock-skew tolerance, in seconds, applied
    /// in both directions around "now" (default 60).
    pub android_safetynet_timestamp_skew_seconds: u64,
}

impl Default for AttestationPolicy {
    fn default() -> Self {
        Self {
            android_key_tee_enforced_only: false,
            android_safetynet_timestamp_skew_seconds: 60,
        }
    }
}

/// Dispatches to the per-format attestation validator.
pub struct AttestationDispatcher<'a> {
    pub crypto: &'a dyn CryptoProvider,
    pub policy: AttestationPolicy,
}

impl<'a> AttestationDispatcher<'a> {
    pub fn new(crypto: &'a dyn CryptoProvider, policy: AttestationPolicy) -> Self {
        Self { crypto, policy }
    }

    /// `auth_data_bytes` is the raw, still-encoded authenticator data: most
    /// formats sign over its exact bytes concatenated with `clientDataHash`,
    /// so the core carries both the parsed `AuthenticatorData` (for field
    /// access) and the original bytes (for signing) rather than re-encoding.
    #[instrument(skip(self, attestation_object, auth_data_bytes, client_data_hash), fields(fmt = attestation_object.att_stmt.fmt()))]
    pub fn dispatch(
        &self,
        attestation_object: &AttestationObject,
        auth_data_bytes: &[u8],
        client_data_hash: &[u8],
    ) -> WebauthnResult<AttestationType> {
        let auth_data = &attestation_object.auth_data;
        match &attestation_object.att_stmt {
            AttestationStatement::Packed(stmt) => {
                packed::verify(self.crypto, stmt, auth_data, auth_data_bytes, client_data_hash)
            }
            AttestationStatement::Tpm(stmt) => {
                tpm::verify(self.crypto, stmt, auth_data, auth_data_bytes, client_data_hash)
            }
            AttestationStatement::AndroidKey(stmt) => android_key::verify(
                self.crypto,
                stmt,
                auth_data,
                auth_data_bytes,
                client_data_hash,
                self.policy.android_key_tee_enforced_only,
            ),
            AttestationStatement::AndroidSafetyNet(stmt) => android_safetynet::verify(
                self.crypto,
                stmt,
                auth_data,
                auth_data_bytes,
                client_data_hash,
                self.policy.android_safetynet_timestamp_skew_seconds,
            ),
            AttestationStatement::Apple(stmt) => {
                apple::verify(self.crypto, stmt, auth_data, auth_data_bytes, client_data_hash)
            }
            AttestationStatement::FidoU2f(stmt) => {
                fido_u2f::verify(self.crypto, stmt, auth_data, client_data_hash)
            }
            AttestationStatement::None => none::verify(auth_data),
        }
    }
}
