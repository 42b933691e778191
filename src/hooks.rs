//! Single-method policy hooks the caller may inject into a `ValidatorConfig`.
//!
//! Each is a narrow trait so an RP can supply exactly the policy it needs
//! without implementing a fat interface.

use crate::error::WebauthnResult;
use crate::model::{AuthenticationData, RegistrationData, ServerProperty};

/// Decides whether a presented origin is acceptable. The default
/// implementation used by `ValidatorConfig` does an exact string match
/// against `ServerProperty::origins`; an injected validator MAY relax this
/// (e.g. to accept a set of subdomains).
pub trait OriginValidator: Send + Sync {
    fn is_valid_origin(&self, origin: &str, server_property: &ServerProperty) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExactOriginValidator;

impl OriginValidator for ExactOriginValidator {
    fn is_valid_origin(&self, origin: &str, server_property: &ServerProperty) -> bool {
        server_property.origins.iter().any(|o| o == origin)
    }
}

/// An RP-specific additional check run after the built-in registration
/// pipeline succeeds. Hooks run in insertion order; the first to fail
/// aborts the ceremony.
pub trait CustomRegistrationValidator: Send + Sync {
    fn validate(&self, data: &RegistrationData, server_property: &ServerProperty) -> WebauthnResult<()>;
}

/// An RP-specific additional check run after the built-in authentication
/// pipeline succeeds.
pub trait CustomAuthenticationValidator: Send + Sync {
    fn validate(&self, data: &AuthenticationData, server_property: &ServerProperty) -> WebauthnResult<()>;
}

/// Policy for what happens when a presented signature counter does not
/// strictly increase.
pub trait MaliciousCounterValueHandler: Send + Sync {
    fn handle(&self, presented: u32, stored: u32) -> WebauthnResult<()>;
}

/// Default policy: reject with `MaliciousCounterValue`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectOnMaliciousCounter;

impl MaliciousCounterValueHandler for RejectOnMaliciousCounter {
    fn handle(&self, presented: u32, stored: u32) -> WebauthnResult<()> {
        Err(crate::error::WebauthnError::MaliciousCounterValue { presented, stored })
    }
}

/// Alternative policy for RPs that want to downgrade a non-increasing
/// counter to a logged warning instead of aborting the ceremony.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreMaliciousCounter;

impl MaliciousCounterValueHandler for IgnoreMaliciousCounter {
    fn handle(&self, presented: u32, stored: u32) -> WebauthnResult<()> {
        tracing::warn!(presented, stored, "ignoring non-increasing signature counter");
        Ok(())
    }
}

/// Decodes a TPM AIK certificate's Subject Alternative Name directory-name
/// attribute values into a vendor/model/firmware-version triple.
pub trait TpmDevicePropertyDecoder: Send + Sync {
    fn decode(&self, manufacturer: &str, model: &str, version: &str) -> WebauthnResult<TpmDeviceProperty>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmDeviceProperty {
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
}

/// Decides whether a decoded TPM device property is acceptable to this RP
/// (e.g. a manufacturer allow-list).
pub trait TpmDevicePropertyValidator: Send + Sync {
    fn is_acceptable(&self, property: &TpmDeviceProperty) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAnyTpmDeviceProperty;

impl TpmDevicePropertyValidator for AcceptAnyTpmDeviceProperty {
    fn is_acceptable(&self, _property: &TpmDeviceProperty) -> bool {
        true
    }
}
