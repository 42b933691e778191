//! Extension-output validation.
//!
//! Client and authenticator extensions are modelled as a keyed map whose
//! values are a closed sum type (`ExtensionOutput`). An identifier with no
//! registered decoder is rejected outright rather than silently ignored --
//! a permissive extension story is how RPs end up trusting data they never
//! actually validated.

use crate::error::{WebauthnError, WebauthnResult};
use crate::model::ExtensionOutputs;

/// The authenticator extension identifiers this core understands. RPs that
/// need additional extensions supply their own `ExtensionRegistry`.
pub fn default_known_extensions() -> Vec<&'static str> {
    vec!["credProtect", "hmac-secret", "credBlob", "minPinLength", "largeBlob"]
}

/// Policy object deciding which authenticator extension identifiers are
/// acceptable for a ceremony.
pub trait ExtensionRegistry: Send + Sync {
    fn is_known(&self, identifier: &str) -> bool;
}

/// Default registry: the extensions enumerated in
/// [`default_known_extensions`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtensionRegistry;

impl ExtensionRegistry for DefaultExtensionRegistry {
    fn is_known(&self, identifier: &str) -> bool {
        default_known_extensions().contains(&identifier)
    }
}

/// Rejects the ceremony if any extension output carries an identifier the
/// registry does not recognise.
pub fn validate_extension_outputs(
    outputs: &ExtensionOutputs,
    registry: &dyn ExtensionRegistry,
) -> WebauthnResult<()> {
    for identifier in outputs.keys() {
        if !registry.is_known(identifier) {
            return Err(WebauthnError::UnsupportedExtension {
                identifier: identifier.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtensionOutput;

    #[test]
    fn known_extension_passes() {
        let mut outputs = ExtensionOutputs::new();
        outputs.insert("credProtect".into(), ExtensionOutput::Boolean(true));
        assert!(validate_extension_outputs(&outputs, &DefaultExtensionRegistry).is_ok());
    }

    #[test]
    fn unknown_extension_rejected() {
        let mut outputs = ExtensionOutputs::new();
        outputs.insert("x-vendor-secret".into(), ExtensionOutput::Boolean(true));
        let err = validate_extension_outputs(&outputs, &DefaultExtensionRegistry).unwrap_err();
        assert!(matches!(err, WebauthnError::UnsupportedExtension { .. }));
    }
}
