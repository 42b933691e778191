//! The ceremony object graph.
//!
//! Everything here is already-decoded: the core never touches raw CBOR,
//! JSON, or DER bytes directly except where a byte-exact concatenation is
//! part of the signed-data definition (see `crypto::signed_data`).

use std::collections::BTreeMap;
use std::fmt;

/// Minimal macro to get a bitflags-shaped type without pulling in the
/// `bitflags` crate for eight single bits.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub $repr);

        impl $name {
            $(pub const $flag: Self = Self($value);)*

            pub const fn from_bits_truncate(bits: $repr) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

/// COSE algorithm identifiers relevant to WebAuthn (RFC 8152).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CoseAlgorithm {
    ES256,
    ES384,
    ES512,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    EdDSA,
}

impl CoseAlgorithm {
    /// The IANA COSE algorithm integer for this identifier.
    pub const fn iana_value(self) -> i64 {
        match self {
            CoseAlgorithm::ES256 => -7,
            CoseAlgorithm::ES384 => -35,
            CoseAlgorithm::ES512 => -36,
            CoseAlgorithm::PS256 => -37,
            CoseAlgorithm::PS384 => -38,
            CoseAlgorithm::PS512 => -39,
            CoseAlgorithm::RS256 => -257,
            CoseAlgorithm::RS384 => -258,
            CoseAlgorithm::RS512 => -259,
            CoseAlgorithm::EdDSA => -8,
        }
    }

    pub const fn from_iana_value(value: i64) -> Option<Self> {
        Some(match value {
            -7 => CoseAlgorithm::ES256,
            -35 => CoseAlgorithm::ES384,
            -36 => CoseAlgorithm::ES512,
            -37 => CoseAlgorithm::PS256,
            -38 => CoseAlgorithm::PS384,
            -39 => CoseAlgorithm::PS512,
            -257 => CoseAlgorithm::RS256,
            -258 => CoseAlgorithm::RS384,
            -259 => CoseAlgorithm::RS512,
            -8 => CoseAlgorithm::EdDSA,
            _ => return None,
        })
    }
}

/// The named NIST curves used by COSE EC2 keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcdsaCurve {
    Secp256r1,
    Secp384r1,
    Secp521r1,
}

impl EcdsaCurve {
    pub const fn coordinate_size(self) -> usize {
        match self {
            EcdsaCurve::Secp256r1 => 32,
            EcdsaCurve::Secp384r1 => 48,
            EcdsaCurve::Secp521r1 => 66,
        }
    }
}

/// A COSE_Key's EC2 (elliptic curve, two coordinates) key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseEc2Key {
    pub curve: EcdsaCurve,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
}

/// A COSE_Key's RSA key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseRsaKey {
    pub n: Vec<u8>,
    /// Public exponent. An empty vector means "unspecified", which
    /// tpm handling defaults to 65537.
    pub e: Vec<u8>,
}

/// A COSE_Key's OKP (octet key pair, e.g. Ed25519) key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseOkpKey {
    pub x: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKeyMaterial {
    Ec2(CoseEc2Key),
    Rsa(CoseRsaKey),
    Okp(CoseOkpKey),
}

/// A polymorphic, already-decoded credential public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    pub alg: CoseAlgorithm,
    pub material: CoseKeyMaterial,
}

impl CoseKey {
    pub fn new_ec2(alg: CoseAlgorithm, curve: EcdsaCurve, x: Vec<u8>, y: Vec<u8>) -> Self {
        Self {
            alg,
            material: CoseKeyMaterial::Ec2(CoseEc2Key { curve, x, y }),
        }
    }

    pub fn new_rsa(alg: CoseAlgorithm, n: Vec<u8>, e: Vec<u8>) -> Self {
        Self {
            alg,
            material: CoseKeyMaterial::Rsa(CoseRsaKey { n, e }),
        }
    }

    pub fn new_okp(alg: CoseAlgorithm, x: Vec<u8>) -> Self {
        Self {
            alg,
            material: CoseKeyMaterial::Okp(CoseOkpKey { x }),
        }
    }

    /// Uncompressed SEC1 point `0x04 || X || Y`, required by the FIDO-U2F
    /// raw signed-data format. Only meaningful for EC2 keys.
    pub fn ec_uncompressed_point(&self) -> Option<Vec<u8>> {
        match &self.material {
            CoseKeyMaterial::Ec2(k) => {
                let mut out = Vec::with_capacity(1 + k.x.len() + k.y.len());
                out.push(0x04);
                out.extend_from_slice(&k.x);
                out.extend_from_slice(&k.y);
                Some(out)
            }
            _ => None,
        }
    }
}

/// 16-byte authenticator model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Aaguid(pub [u8; 16]);

impl fmt::Display for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// The attested-credential-data portion of authenticator data, present only
/// during registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: Aaguid,
    pub credential_id: Vec<u8>,
    pub credential_public_key: CoseKey,
}

bitflags_like! {
    /// Authenticator data flag bits (WebAuthn).
    pub struct AuthenticatorDataFlags: u8 {
        const UP = 0x01;
        const RESERVED_1 = 0x02;
        const UV = 0x04;
        const BE = 0x08;
        const BS = 0x10;
        const RESERVED_5 = 0x20;
        const AT = 0x40;
        const ED = 0x80;
    }
}

/// A single authenticator- or client-extension output. Unknown identifiers
/// are a first-class error rather than silently ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionOutput {
    Boolean(bool),
    Bytes(Vec<u8>),
    Text(String),
}

pub type ExtensionOutputs = BTreeMap<String, ExtensionOutput>;

/// Decoded authenticator data (WebAuthn).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorDataFlags,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions: ExtensionOutputs,
}

impl AuthenticatorData {
    pub fn user_present(&self) -> bool {
        self.flags.contains(AuthenticatorDataFlags::UP)
    }

    pub fn user_verified(&self) -> bool {
        self.flags.contains(AuthenticatorDataFlags::UV)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientDataType {
    Create,
    Get,
}

impl ClientDataType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ClientDataType::Create => "webauthn.create",
            ClientDataType::Get => "webauthn.get",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBindingStatus {
    Present,
    Supported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBinding {
    pub status: TokenBindingStatus,
    pub id: Option<Vec<u8>>,
}

/// The decoded client-data JSON (WebAuthn).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedClientData {
    pub ty: ClientDataType,
    pub challenge: Vec<u8>,
    pub origin: String,
    pub cross_origin: Option<bool>,
    pub token_binding: Option<TokenBinding>,
}

/// Trust model of an attestation, per WebAuthn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationType {
    Basic,
    SelfAttestation,
    AttCa,
    AnonCa,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationCertificate(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedAttestationStatement {
    pub alg: CoseAlgorithm,
    pub sig: Vec<u8>,
    pub x5c: Vec<AttestationCertificate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmNameAlg {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmCertInfo {
    pub magic: u32,
    pub ty: u16,
    pub extra_data: Vec<u8>,
    pub attested_name: Vec<u8>,
    pub name_alg: TpmNameAlg,
    pub raw: Vec<u8>,
}

/// The key material carried inside a TPMT_PUBLIC `pubArea`, in the subset
/// WebAuthn attestation actually exercises (RSA or ECC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmPublicKey {
    Rsa { modulus: Vec<u8>, exponent: u32 },
    Ecc { curve: EcdsaCurve, x: Vec<u8>, y: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmPubArea {
    /// Exact encoded bytes, hashed with `nameAlg` to produce `certInfo.attested.name`.
    pub raw: Vec<u8>,
    pub public_key: TpmPublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmAttestationStatement {
    pub ver: String,
    pub alg: CoseAlgorithm,
    pub sig: Vec<u8>,
    pub x5c: Vec<AttestationCertificate>,
    pub cert_info: TpmCertInfo,
    pub pub_area: TpmPubArea,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidKeyAttestationStatement {
    pub alg: CoseAlgorithm,
    pub sig: Vec<u8>,
    pub x5c: Vec<AttestationCertificate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidSafetyNetAttestationStatement {
    pub ver: String,
    /// Raw compact JWS: `header.payload.signature`.
    pub response: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleAttestationStatement {
    pub x5c: Vec<AttestationCertificate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FidoU2fAttestationStatement {
    pub sig: Vec<u8>,
    pub x5c: Vec<AttestationCertificate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatement {
    Packed(PackedAttestationStatement),
    Tpm(TpmAttestationStatement),
    AndroidKey(AndroidKeyAttestationStatement),
    AndroidSafetyNet(AndroidSafetyNetAttestationStatement),
    Apple(AppleAttestationStatement),
    FidoU2f(FidoU2fAttestationStatement),
    None,
}

impl AttestationStatement {
    pub const fn fmt(&self) -> &'static str {
        match self {
            AttestationStatement::Packed(_) => "packed",
            AttestationStatement::Tpm(_) => "tpm",
            AttestationStatement::AndroidKey(_) => "android-key",
            AttestationStatement::AndroidSafetyNet(_) => "android-safetynet",
            AttestationStatement::Apple(_) => "apple",
            AttestationStatement::FidoU2f(_) => "fido-u2f",
            AttestationStatement::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationObject {
    pub auth_data: AuthenticatorData,
    pub att_stmt: AttestationStatement,
}

/// RP-side ceremony configuration: origins, effective domain, challenge.
#[derive(Debug, Clone)]
pub struct ServerProperty {
    pub origins: Vec<String>,
    pub rp_id: String,
    pub challenge: Vec<u8>,
    pub token_binding_id: Option<Vec<u8>>,
}

/// Everything the caller supplies to validate one registration ceremony.
#[derive(Debug, Clone)]
pub struct RegistrationData {
    pub authenticator_data_bytes: Vec<u8>,
    pub client_data_json_bytes: Vec<u8>,
    pub collected_client_data: CollectedClientData,
    pub attestation_object: AttestationObject,
}

/// Everything the caller supplies to validate one authentication ceremony.
#[derive(Debug, Clone)]
pub struct AuthenticationData {
    pub credential_id: Vec<u8>,
    pub authenticator_data_bytes: Vec<u8>,
    pub client_data_json_bytes: Vec<u8>,
    pub collected_client_data: CollectedClientData,
    pub authenticator_data: AuthenticatorData,
    pub signature: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}

/// The caller-owned record of a previously-registered authenticator.
/// `sign_count` is mutated in-place by `AuthenticationValidator::validate`.
#[derive(Debug, Clone)]
pub struct Authenticator {
    pub credential_id: Vec<u8>,
    pub credential_public_key: CoseKey,
    pub aaguid: Aaguid,
    pub sign_count: u32,
    pub transports: Vec<String>,
}