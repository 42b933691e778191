//! Certificate-path trustworthiness and the FIDO Metadata Service
//! collaborator interfaces it is layered on.

use tracing::{debug, trace, warn};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_parser::x509::X509Version;

use crate::crypto::CryptoProvider;
use crate::error::{WebauthnError, WebauthnResult};
use crate::model::{Aaguid, AttestationCertificate, AttestationType, CoseAlgorithm};

/// A root certificate an RP is willing to trust attestation chains against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    pub certificate_der: Vec<u8>,
    pub subject_key_identifier: Option<Vec<u8>>,
}

/// Resolves candidate trust anchors by AAGUID or by Authority/Subject Key
/// Identifier.
pub trait TrustAnchorRepository: Send + Sync {
    fn find_by_aaguid(&self, aaguid: Aaguid) -> Vec<TrustAnchor>;
    fn find_by_subject_key_identifier(&self, ski: &[u8]) -> Vec<TrustAnchor>;
}

/// A repository with no configured anchors; every lookup fails closed.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyTrustAnchorRepository;

impl TrustAnchorRepository for EmptyTrustAnchorRepository {
    fn find_by_aaguid(&self, _aaguid: Aaguid) -> Vec<TrustAnchor> {
        Vec::new()
    }

    fn find_by_subject_key_identifier(&self, _ski: &[u8]) -> Vec<TrustAnchor> {
        Vec::new()
    }
}

/// A static, in-memory repository, the common case for an RP that pins a
/// fixed set of vendor root certificates.
#[derive(Debug, Default, Clone)]
pub struct StaticTrustAnchorRepository {
    by_aaguid: Vec<(Aaguid, TrustAnchor)>,
    anchors: Vec<TrustAnchor>,
}

impl StaticTrustAnchorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anchor_for_aaguid(mut self, aaguid: Aaguid, anchor: TrustAnchor) -> Self {
        self.by_aaguid.push((aaguid, anchor));
        self
    }

    pub fn with_anchor(mut self, anchor: TrustAnchor) -> Self {
        self.anchors.push(anchor);
        self
    }
}

impl TrustAnchorRepository for StaticTrustAnchorRepository {
    fn find_by_aaguid(&self, aaguid: Aaguid) -> Vec<TrustAnchor> {
        self.by_aaguid
            .iter()
            .filter(|(a, _)| *a == aaguid)
            .map(|(_, anchor)| anchor.clone())
            .collect()
    }

    fn find_by_subject_key_identifier(&self, ski: &[u8]) -> Vec<TrustAnchor> {
        self.anchors
            .iter()
            .chain(self.by_aaguid.iter().map(|(_, a)| a))
            .filter(|a| a.subject_key_identifier.as_deref() == Some(ski))
            .cloned()
            .collect()
    }
}

/// FIDO Metadata Service status report values that make an authenticator's
/// attestation untrustworthy regardless of an otherwise-valid chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReport {
    AttestationKeyCompromise,
    UserVerificationBypass,
    UserKeyRemoteCompromise,
    UserKeyPhysicalCompromise,
    Revoked,
    Other,
}

impl StatusReport {
    pub const fn is_blocking(self) -> bool {
        !matches!(self, StatusReport::Other)
    }
}

/// One FIDO Metadata Service entry.
#[derive(Debug, Clone)]
pub struct MetadataStatement {
    pub aaguid: Aaguid,
    pub attestation_root_certificates_der: Vec<Vec<u8>>,
    pub status_reports: Vec<StatusReport>,
    pub allowed_attestation_types: Vec<AttestationType>,
}

/// Streams metadata statements the RP has configured (typically backed by a
/// FIDO MDS blob fetched and cached outside the core).
pub trait MetadataProvider: Send + Sync {
    fn statements(&self) -> Vec<MetadataStatement>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyMetadataProvider;

impl MetadataProvider for EmptyMetadataProvider {
    fn statements(&self) -> Vec<MetadataStatement> {
        Vec::new()
    }
}

/// Resolves trust anchors by layering a `MetadataProvider` on top of a
/// `TrustAnchorRepository`: metadata-derived anchors are checked first
/// (honouring blocking status reports), falling back to the repository.
pub struct MetadataBackedTrustAnchorResolver<'a> {
    pub metadata: &'a dyn MetadataProvider,
    pub repository: &'a dyn TrustAnchorRepository,
}

impl<'a> MetadataBackedTrustAnchorResolver<'a> {
    pub fn resolve_by_aaguid(&self, aaguid: Aaguid) -> WebauthnResult<Vec<TrustAnchor>> {
        let mut anchors = Vec::new();
        for statement in self.metadata.statements() {
            if statement.aaguid != aaguid {
                continue;
            }
            if let Some(bad) = statement.status_reports.iter().find(|s| s.is_blocking()) {
                return Err(WebauthnError::BadStatus {
                    reason: format!("{:?}", bad),
                });
            }
            for der in statement.attestation_root_certificates_der {
                anchors.push(TrustAnchor {
                    certificate_der: der,
                    subject_key_identifier: None,
                });
            }
        }
        if anchors.is_empty() {
            anchors.extend(self.repository.find_by_aaguid(aaguid));
        }
        Ok(anchors)
    }

    pub fn resolve_by_subject_key_identifier(&self, ski: &[u8]) -> Vec<TrustAnchor> {
        self.repository.find_by_subject_key_identifier(ski)
    }
}

/// Validates an `x5c` chain (leaf-first) against the resolved trust
/// anchors: basic constraints, validity window, and a hop-by-hop signature
/// chain up to an anchor.
pub struct CertPathTrustworthinessValidator<'a> {
    pub crypto: &'a dyn CryptoProvider,
}

impl<'a> CertPathTrustworthinessValidator<'a> {
    pub fn new(crypto: &'a dyn CryptoProvider) -> Self {
        Self { crypto }
    }

    pub fn validate(&self, x5c: &[AttestationCertificate], anchors: &[TrustAnchor]) -> WebauthnResult<()> {
        if anchors.is_empty() {
            return Err(WebauthnError::TrustAnchorNotFound);
        }
        if x5c.is_empty() {
            return Err(WebauthnError::CertificateException {
                reason: "empty certificate chain".into(),
            });
        }

        let parsed: Vec<X509Certificate<'_>> = x5c
            .iter()
            .map(|c| {
                X509Certificate::from_der(&c.0)
                    .map(|(_, cert)| cert)
                    .map_err(|_| WebauthnError::CertificateException {
                        reason: "unparseable certificate in x5c".into(),
                    })
            })
            .collect::<WebauthnResult<Vec<_>>>()?;

        for (idx, cert) in parsed.iter().enumerate() {
            if !cert.validity.is_valid() {
                return Err(WebauthnError::CertificateException {
                    reason: format!("certificate at x5c[{idx}] is outside its validity window"),
                });
            }
            if idx > 0 {
                // Every non-leaf certificate in the chain must be a CA.
                let is_ca = cert
                    .basic_constraints()
                    .ok()
                    .flatten()
                    .map(|bc| bc.value.ca)
                    .unwrap_or(false);
                if !is_ca {
                    return Err(WebauthnError::CertificateException {
                        reason: format!("certificate at x5c[{idx}] is not a CA"),
                    });
                }
            }
        }

        // Verify the leaf's signature is vouched for by the next certificate,
        // and so on up the chain supplied in x5c. The algorithm that signed
        // each hop is the issuing CA's own signing algorithm, never the
        // credential's COSE algorithm -- those are unrelated keys.
        let mut alg = infer_alg_from_signature_algorithm(&parsed[0]).ok_or(WebauthnError::CertificateException {
            reason: "unrecognised leaf certificate signature algorithm".into(),
        })?;
        for window in parsed.windows(2) {
            let (subject, issuer) = (&window[0], &window[1]);
            self.crypto
                .verify_with_certificate(alg, issuer.public_key().raw, subject.tbs_certificate.as_ref(), subject.signature_value.as_ref())
                .map_err(|_| WebauthnError::CertificateException {
                    reason: "chain hop failed signature verification".into(),
                })?;
            // Intermediates are virtually always RSA or ECDSA with SHA-256;
            // the signing algorithm is carried in the certificate itself
            // rather than reused from the leaf's COSE alg for subsequent hops.
            alg = infer_alg_from_signature_algorithm(issuer).unwrap_or(alg);
        }

        // The top of the supplied chain must itself be vouched for by a
        // configured anchor: either it equals the anchor certificate
        // outright, or the anchor signs it.
        let top = parsed.last().expect("non-empty chain checked above");
        let top_der = &x5c.last().unwrap().0;
        let trusted = anchors.iter().any(|anchor| &anchor.certificate_der == top_der)
            || anchors.iter().any(|anchor| {
                X509Certificate::from_der(&anchor.certificate_der)
                    .ok()
                    .map(|(_, anchor_cert)| {
                        self.crypto
                            .verify_with_certificate(
                                alg,
                                anchor_cert.public_key().raw,
                                top.tbs_certificate.as_ref(),
                                top.signature_value.as_ref(),
                            )
                            .is_ok()
                    })
                    .unwrap_or(false)
            });

        if !trusted {
            trace!("no configured trust anchor vouches for the supplied chain");
            return Err(WebauthnError::CertificateException {
                reason: "certificate chain does not terminate at a trusted anchor".into(),
            });
        }

        debug!(hops = parsed.len(), "certificate chain validated against trust anchor");
        Ok(())
    }
}

fn infer_alg_from_signature_algorithm(cert: &X509Certificate<'_>) -> Option<CoseAlgorithm> {
    let oid = cert.signature_algorithm.algorithm.to_id_string();
    match oid.as_str() {
        "1.2.840.10045.4.3.2" => Some(CoseAlgorithm::ES256),
        "1.2.840.10045.4.3.3" => Some(CoseAlgorithm::ES384),
        "1.2.840.113549.1.1.11" => Some(CoseAlgorithm::RS256),
        "1.2.840.113549.1.1.12" => Some(CoseAlgorithm::RS384),
        "1.2.840.113549.1.1.13" => Some(CoseAlgorithm::RS512),
        _ => {
            warn!(%oid, "unrecognised certificate signature algorithm OID");
            None
        }
    }
}

/// Checks whether an X.509 cert's Basic Constraints CA flag is false, as
/// several attestation certificate chains require of their leaf.
pub fn require_not_ca(cert: &X509Certificate<'_>) -> WebauthnResult<()> {
    let is_ca = cert.basic_constraints().ok().flatten().map(|bc| bc.value.ca).unwrap_or(false);
    if is_ca {
        Err(WebauthnError::BadAttestationStatement {
            reason: "attestation certificate must not be a CA".into(),
        })
    } else {
        Ok(())
    }
}

pub fn require_version_3(cert: &X509Certificate<'_>) -> WebauthnResult<()> {
    if cert.version == X509Version::V3 {
        Ok(())
    } else {
        Err(WebauthnError::BadAttestationStatement {
            reason: "attestation certificate must be X.509 version 3".into(),
        })
    }
}

/// Unwraps the inner DER OCTET STRING some extensions (e.g.
/// `id-fido-gen-ce-aaguid`) carry as their extnValue content, rather than
/// raw bytes. `ext.value` here is already past the outer extnValue OCTET
/// STRING x509-parser strips; this strips the second, inner one.
pub fn unwrap_octet_string_extension_value(value: &[u8]) -> WebauthnResult<Vec<u8>> {
    use x509_parser::der_parser::der::parse_der_octetstring;
    let (_, obj) = parse_der_octetstring(value).map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "extension value is not a DER OCTET STRING".into(),
    })?;
    let slice = obj.as_slice().map_err(|_| WebauthnError::BadAttestationStatement {
        reason: "extension value OCTET STRING has no content".into(),
    })?;
    Ok(slice.to_vec())
}
