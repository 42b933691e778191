//! Self-attestation trustworthiness policy.
//!
//! Self-attestation makes no cryptographic promise about the authenticator
//! model, only that the credential key itself signed the attestation
//! statement (already checked by the `packed` validator). Whether an RP is
//! willing to accept that is a pure policy decision.

use crate::error::{WebauthnError, WebauthnResult};

pub trait SelfAttestationTrustworthinessValidator: Send + Sync {
    fn validate(&self) -> WebauthnResult<()>;
}

/// Default policy: reject self-attestation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectSelfAttestation;

impl SelfAttestationTrustworthinessValidator for RejectSelfAttestation {
    fn validate(&self) -> WebauthnResult<()> {
        Err(WebauthnError::BadAttestationStatement {
            reason: "self-attestation is not permitted by this relying party's policy".into(),
        })
    }
}

/// Opt-in policy for RPs that accept self-attestation without further
/// cryptographic work beyond what the format validator already performed.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowSelfAttestation;

impl SelfAttestationTrustworthinessValidator for AllowSelfAttestation {
    fn validate(&self) -> WebauthnResult<()> {
        Ok(())
    }
}
