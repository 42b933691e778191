//! Flat error taxonomy for the ceremony validators.
//!
//! Every rejection the core can produce is represented here. Variants carry
//! only the context needed to diagnose a rejection from logs -- never
//! challenge bytes, signatures, or private key material.

use thiserror::Error;

use crate::model::CoseAlgorithm;

/// The single error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum WebauthnError {
    #[error("challenge did not match the expected value")]
    BadChallenge,

    #[error("origin {origin:?} is not in the set of acceptable origins")]
    BadOrigin { origin: String },

    #[error("rpIdHash did not match SHA-256(rpId)")]
    BadRpId,

    #[error("signature verification failed")]
    BadSignature,

    #[error("authenticator or attestation metadata status is not acceptable: {reason}")]
    BadStatus { reason: String },

    #[error("collectedClientData.type was {actual:?}, expected {expected:?}")]
    InconsistentClientDataType {
        expected: &'static str,
        actual: String,
    },

    #[error("cross-origin request rejected by policy")]
    CrossOrigin,

    #[error("token binding validation failed: {reason}")]
    TokenBindingException { reason: String },

    #[error("user presence (UP) flag was not set")]
    UserNotPresent,

    #[error("user verification (UV) flag was not set")]
    UserNotVerified,

    #[error("credential id was not a member of the allow-list")]
    NotAllowedCredentialId,

    #[error("COSE algorithm {0:?} is not an allowed algorithm for this ceremony")]
    NotAllowedAlgorithm(CoseAlgorithm),

    #[error("attestation statement is malformed: {reason}")]
    BadAttestationStatement { reason: String },

    #[error("certificate path validation failed: {reason}")]
    CertificateException { reason: String },

    #[error("no trust anchor could be resolved for this authenticator")]
    TrustAnchorNotFound,

    #[error("signature counter did not increase (presented={presented}, stored={stored}); possible cloned authenticator")]
    MaliciousCounterValue { presented: u32, stored: u32 },

    #[error("structural invariant violated: {reason}")]
    ConstraintViolation { reason: &'static str },

    #[error("unrecognised extension identifier: {identifier}")]
    UnsupportedExtension { identifier: String },

    #[error("a custom validator rejected the ceremony: {reason}")]
    CustomValidatorRejected { reason: String },
}

pub type WebauthnResult<T> = Result<T, WebauthnError>;
