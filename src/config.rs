//! Immutable ceremony configuration.
//!
//! `ValidatorConfig` replaces the mutable-setter reconfiguration the source
//! permits on a live validator: everything here is assembled once through
//! `ValidatorConfigBuilder` and then shared, read-only, across however many
//! concurrent `validate` calls a host process makes.

use std::sync::Arc;

use crate::attestation::AttestationPolicy;
use crate::crypto::{CryptoProvider, RingCryptoProvider};
use crate::extensions::{DefaultExtensionRegistry, ExtensionRegistry};
use crate::hooks::{
    AcceptAnyTpmDeviceProperty, CustomAuthenticationValidator, CustomRegistrationValidator, ExactOriginValidator,
    MaliciousCounterValueHandler, OriginValidator, RejectOnMaliciousCounter, TpmDevicePropertyDecoder,
    TpmDevicePropertyValidator,
};
use crate::model::CoseAlgorithm;
use crate::self_attestation::{RejectSelfAttestation, SelfAttestationTrustworthinessValidator};
use crate::trust::{EmptyMetadataProvider, EmptyTrustAnchorRepository, MetadataProvider, TrustAnchorRepository};

/// Immutable, `Send + Sync` ceremony configuration shared by every
/// `validate` call a host process makes. Built once via
/// [`ValidatorConfigBuilder`]; there is no setter on this type.
pub struct ValidatorConfig {
    pub user_verification_required: bool,
    pub user_presence_required: bool,
    pub cross_origin_allowed: bool,
    pub accepted_algorithms: Vec<CoseAlgorithm>,
    pub attestation_policy: AttestationPolicy,
    pub crypto: Arc<dyn CryptoProvider>,
    pub trust_anchors: Arc<dyn TrustAnchorRepository>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub origin_validator: Arc<dyn OriginValidator>,
    pub self_attestation_validator: Arc<dyn SelfAttestationTrustworthinessValidator>,
    pub malicious_counter_handler: Arc<dyn MaliciousCounterValueHandler>,
    pub extension_registry: Arc<dyn ExtensionRegistry>,
    pub tpm_device_property_decoder: Option<Arc<dyn TpmDevicePropertyDecoder>>,
    pub tpm_device_property_validator: Option<Arc<dyn TpmDevicePropertyValidator>>,
    pub custom_registration_validators: Vec<Arc<dyn CustomRegistrationValidator>>,
    pub custom_authentication_validators: Vec<Arc<dyn CustomAuthenticationValidator>>,
}

/// Builds a [`ValidatorConfig`]. Every `with_*` method consumes and returns
/// `self`; there is no way to mutate a config after [`build`](Self::build)
/// has produced it.
pub struct ValidatorConfigBuilder {
    user_verification_required: bool,
    user_presence_required: bool,
    cross_origin_allowed: bool,
    accepted_algorithms: Vec<CoseAlgorithm>,
    attestation_policy: AttestationPolicy,
    crypto: Arc<dyn CryptoProvider>,
    trust_anchors: Arc<dyn TrustAnchorRepository>,
    metadata: Arc<dyn MetadataProvider>,
    origin_validator: Arc<dyn OriginValidator>,
    self_attestation_validator: Arc<dyn SelfAttestationTrustworthinessValidator>,
    malicious_counter_handler: Arc<dyn MaliciousCounterValueHandler>,
    extension_registry: Arc<dyn ExtensionRegistry>,
    tpm_device_property_decoder: Option<Arc<dyn TpmDevicePropertyDecoder>>,
    tpm_device_property_validator: Option<Arc<dyn TpmDevicePropertyValidator>>,
    custom_registration_validators: Vec<Arc<dyn CustomRegistrationValidator>>,
    custom_authentication_validators: Vec<Arc<dyn CustomAuthenticationValidator>>,
}

impl Default for ValidatorConfigBuilder {
    fn default() -> Self {
        Self {
            user_verification_required: true,
            user_presence_required: true,
            cross_origin_allowed: false,
            accepted_algorithms: Vec::new(),
            attestation_policy: AttestationPolicy::default(),
            crypto: Arc::new(RingCryptoProvider::new()),
            trust_anchors: Arc::new(EmptyTrustAnchorRepository),
            metadata: Arc::new(EmptyMetadataProvider),
            origin_validator: Arc::new(ExactOriginValidator),
            self_attestation_validator: Arc::new(RejectSelfAttestation),
            malicious_counter_handler: Arc::new(RejectOnMaliciousCounter),
            extension_registry: Arc::new(DefaultExtensionRegistry::default()),
            tpm_device_property_decoder: None,
            tpm_device_property_validator: Some(Arc::new(AcceptAnyTpmDeviceProperty)),
            custom_registration_validators: Vec::new(),
            custom_authentication_validators: Vec::new(),
        }
    }
}

impl ValidatorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_verification_required(mut self, required: bool) -> Self {
        self.user_verification_required = required;
        self
    }

    pub fn user_presence_required(mut self, required: bool) -> Self {
        self.user_presence_required = required;
        self
    }

    pub fn cross_origin_allowed(mut self, allowed: bool) -> Self {
        self.cross_origin_allowed = allowed;
        self
    }

    /// Acceptable COSE algorithms for a newly registered credential; an
    /// empty list means "accept any".
    pub fn accepted_algorithms(mut self, algorithms: Vec<CoseAlgorithm>) -> Self {
        self.accepted_algorithms = algorithms;
        self
    }

    pub fn attestation_policy(mut self, policy: AttestationPolicy) -> Self {
        self.attestation_policy = policy;
        self
    }

    pub fn crypto_provider(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn trust_anchor_repository(mut self, repository: Arc<dyn TrustAnchorRepository>) -> Self {
        self.trust_anchors = repository;
        self
    }

    pub fn metadata_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = provider;
        self
    }

    pub fn origin_validator(mut self, validator: Arc<dyn OriginValidator>) -> Self {
        self.origin_validator = validator;
        self
    }

    pub fn self_attestation_validator(mut self, validator: Arc<dyn SelfAttestationTrustworthinessValidator>) -> Self {
        self.self_attestation_validator = validator;
        self
    }

    pub fn malicious_counter_handler(mut self, handler: Arc<dyn MaliciousCounterValueHandler>) -> Self {
        self.malicious_counter_handler = handler;
        self
    }

    pub fn extension_registry(mut self, registry: Arc<dyn ExtensionRegistry>) -> Self {
        self.extension_registry = registry;
        self
    }

    pub fn tpm_device_property_decoder(mut self, decoder: Arc<dyn TpmDevicePropertyDecoder>) -> Self {
        self.tpm_device_property_decoder = Some(decoder);
        self
    }

    pub fn tpm_device_property_validator(mut self, validator: Arc<dyn TpmDevicePropertyValidator>) -> Self {
        self.tpm_device_property_validator = Some(validator);
        self
    }

    pub fn with_custom_registration_validator(mut self, validator: Arc<dyn CustomRegistrationValidator>) -> Self {
        self.custom_registration_validators.push(validator);
        self
    }

    pub fn with_custom_authentication_validator(mut self, validator: Arc<dyn CustomAuthenticationValidator>) -> Self {
        self.custom_authentication_validators.push(validator);
        self
    }

    pub fn build(self) -> ValidatorConfig {
        ValidatorConfig {
            user_verification_required: self.user_verification_required,
            user_presence_required: self.user_presence_required,
            cross_origin_allowed: self.cross_origin_allowed,
            accepted_algorithms: self.accepted_algorithms,
            attestation_policy: self.attestation_policy,
            crypto: self.crypto,
            trust_anchors: self.trust_anchors,
            metadata: self.metadata,
            origin_validator: self.origin_validator,
            self_attestation_validator: self.self_attestation_validator,
            malicious_counter_handler: self.malicious_counter_handler,
            extension_registry: self.extension_registry,
            tpm_device_property_decoder: self.tpm_device_property_decoder,
            tpm_device_property_validator: self.tpm_device_property_validator,
            custom_registration_validators: self.custom_registration_validators,
            custom_authentication_validators: self.custom_authentication_validators,
        }
    }
}
