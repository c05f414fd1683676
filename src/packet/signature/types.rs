use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::signature::SignatureConfig;
use crate::packet::{PacketHeader, SubpacketData};
use crate::ser::Serialize;
use crate::types::{KeyId, Mpi, PublicKeyTrait, Tag};

use super::subpacket::RevocationCode;

/// First match in the hashed subpacket area.
macro_rules! hashed_lookup {
    ($(#[$doc:meta])* $vis:vis fn $name:ident -> $ret:ty, $variant:ident($($bind:pat),+) => $out:expr) => {
        $(#[$doc])*
        $vis fn $name(&self) -> Option<$ret> {
            self.config.hashed_subpackets().find_map(|p| match &p.data {
                SubpacketData::$variant($($bind),+) => Some($out),
                _ => None,
            })
        }
    };
}

/// Signature Packet
/// <https://tools.ietf.org/html/rfc4880.html#section-5.2>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Signature {
    pub(crate) packet_header: PacketHeader,

    pub config: SignatureConfig,
    #[debug("{}", hex::encode(signed_hash_value))]
    pub signed_hash_value: [u8; 2],
    pub signature: Vec<Mpi>,
}

impl Signature {
    /// Constructor for a V3 signature packet.
    #[allow(clippy::too_many_arguments)]
    pub fn v3(
        packet_header: PacketHeader,
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
        created: DateTime<Utc>,
        issuer: KeyId,
        signed_hash_value: [u8; 2],
        signature: Vec<Mpi>,
    ) -> Self {
        Signature {
            packet_header,
            config: SignatureConfig {
                typ,
                pub_alg,
                hash_alg,
                hashed_subpackets: vec![],
                unhashed_subpackets: vec![],
                version_specific: super::SignatureVersionSpecific::V3 {
                    version: SignatureVersion::V3,
                    created,
                    issuer,
                },
            },
            signed_hash_value,
            signature,
        }
    }

    /// Wraps a freshly made signature into an old format packet.
    pub fn from_config(
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: Vec<Mpi>,
    ) -> Result<Self> {
        let mut sig = Signature {
            packet_header: PacketHeader::new_fixed(Tag::Signature, 0),
            config,
            signed_hash_value,
            signature,
        };
        sig.packet_header = PacketHeader::for_new_packet(Tag::Signature, sig.write_len())?;
        Ok(sig)
    }

    pub fn version(&self) -> SignatureVersion {
        self.config.version()
    }

    pub fn typ(&self) -> SignatureType {
        self.config.typ()
    }

    pub fn pub_alg(&self) -> PublicKeyAlgorithm {
        self.config.pub_alg
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        self.config.hash_alg
    }

    fn check_digest(&self, signer: &impl PublicKeyTrait, digest: &[u8]) -> Result<bool> {
        if self.signed_hash_value != digest[0..2] {
            debug!(
                "quick check mismatch for {:?} signature by {:?}",
                self.typ(),
                self.issuer()
            );
            return Ok(false);
        }
        signer.verify_signature(self.config.hash_alg, digest, &self.signature)
    }

    fn expect_type(&self, ok: bool, what: &str) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(Error::Verification {
                message: format!("{:?} signature is not a {}", self.typ(), what),
            })
        }
    }

    /// Verifies a certification (0x10..=0x13) or certification revocation (0x30)
    /// made by `signer` over `signee` and a user id or attribute.
    pub fn verify_certification(
        &self,
        signer: &impl PublicKeyTrait,
        signee: &impl PublicKeyTrait,
        tag: Tag,
        id: &[u8],
    ) -> Result<bool> {
        self.expect_type(
            self.is_certification() || self.typ() == SignatureType::CertRevocation,
            "certification",
        )?;
        debug!("verifying certification of {} by {}", signee.key_id(), signer.key_id());

        let digest = self.config.hash_certification(signee, tag, id)?;
        self.check_digest(signer, &digest)
    }

    /// Verifies a subkey binding (0x18, 0x19) or subkey revocation (0x28).
    pub fn verify_key_binding(
        &self,
        primary: &impl PublicKeyTrait,
        subkey: &impl PublicKeyTrait,
    ) -> Result<bool> {
        self.expect_type(
            matches!(
                self.typ(),
                SignatureType::SubkeyBinding
                    | SignatureType::KeyBinding
                    | SignatureType::SubkeyRevocation
            ),
            "key binding",
        )?;
        debug!("verifying key binding of {} to {}", subkey.key_id(), primary.key_id());

        let digest = self.config.hash_key_binding(primary, subkey)?;
        self.check_digest(primary, &digest)
    }

    /// Verifies a key revocation (0x20) or direct key signature (0x1F) made by `signer`.
    pub fn verify_key(
        &self,
        signer: &impl PublicKeyTrait,
        key: &impl PublicKeyTrait,
    ) -> Result<bool> {
        self.expect_type(
            matches!(self.typ(), SignatureType::KeyRevocation | SignatureType::Key),
            "key signature",
        )?;
        debug!("verifying key signature on {} by {}", key.key_id(), signer.key_id());

        let digest = self.config.hash_key(key)?;
        self.check_digest(signer, &digest)
    }

    /// One of the user id certification types 0x10 to 0x13.
    pub fn is_certification(&self) -> bool {
        self.config.is_certification()
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.config.created()
    }

    pub fn issuer(&self) -> Option<KeyId> {
        self.config.issuer()
    }

    hashed_lookup!(pub fn key_expiration_time -> &Duration, KeyExpirationTime(d) => d);
    hashed_lookup!(pub fn signature_expiration_time -> &Duration, SignatureExpirationTime(d) => d);
    hashed_lookup!(
        /// Depth and amount of a trust signature.
        pub fn trust_signature -> (u8, u8), TrustSignature(depth, amount) => (*depth, *amount)
    );
    hashed_lookup!(pub fn regular_expression -> &Bytes, RegularExpression(re) => re);
    hashed_lookup!(
        pub fn revocation_reason -> (RevocationCode, &Bytes), RevocationReason(code, text) => (*code, text)
    );
    hashed_lookup!(fn primary_flag -> bool, IsPrimary(b) => *b);
    hashed_lookup!(fn revocable_flag -> bool, Revocable(b) => *b);
    hashed_lookup!(fn exportable_flag -> bool, ExportableCertification(b) => *b);
    hashed_lookup!(fn symmetric_prefs -> &[SymmetricKeyAlgorithm], PreferredSymmetricAlgorithms(v) => &v[..]);
    hashed_lookup!(fn hash_prefs -> &[HashAlgorithm], PreferredHashAlgorithms(v) => &v[..]);
    hashed_lookup!(fn flags -> &[u8], KeyFlags(v) => &v[..]);

    /// Has the signature's own validity period ended at `now`?
    pub fn is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        match (self.created(), self.signature_expiration_time()) {
            (Some(created), Some(validity)) if !validity.is_zero() => *created + *validity <= *now,
            _ => false,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.primary_flag().unwrap_or(false)
    }

    pub fn is_revocable(&self) -> bool {
        self.revocable_flag().unwrap_or(true)
    }

    /// Local (non-exportable) certifications stay in the keyring they were made in.
    pub fn exportable_certification(&self) -> bool {
        self.exportable_flag().unwrap_or(true)
    }

    pub fn preferred_symmetric_algs(&self) -> &[SymmetricKeyAlgorithm] {
        self.symmetric_prefs().unwrap_or_default()
    }

    pub fn preferred_hash_algs(&self) -> &[HashAlgorithm] {
        self.hash_prefs().unwrap_or_default()
    }

    pub fn key_flags(&self) -> &[u8] {
        self.flags().unwrap_or_default()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureVersion {
    /// Deprecated
    V2 = 2,
    V3 = 3,
    V4 = 4,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for SignatureVersion {
    fn default() -> Self {
        Self::V4
    }
}

/// Signature types, RFC 4880 section 5.2.1. Keyrings hold 0x10 to 0x30;
/// document signatures only show up as stray packets.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    Binary = 0x00,
    Text = 0x01,
    Standalone = 0x02,
    /// No statement about how well the signer checked the identity.
    CertGeneric = 0x10,
    /// No identity check at all.
    CertPersona = 0x11,
    CertCasual = 0x12,
    /// Substantial verification; also what self-signatures use.
    CertPositive = 0x13,
    SubkeyBinding = 0x18,
    /// Back signature made by a signing subkey.
    KeyBinding = 0x19,
    Key = 0x1F,
    KeyRevocation = 0x20,
    SubkeyRevocation = 0x28,
    CertRevocation = 0x30,
    Timestamp = 0x40,
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

impl SignatureType {
    /// The user id certification types, 0x10 to 0x13.
    pub fn is_certification(self) -> bool {
        matches!(
            self,
            Self::CertGeneric | Self::CertPersona | Self::CertCasual | Self::CertPositive
        )
    }

    pub fn is_revocation(self) -> bool {
        matches!(
            self,
            Self::KeyRevocation | Self::SubkeyRevocation | Self::CertRevocation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_type_classes() {
        assert!(SignatureType::from(0x12).is_certification());
        assert!(!SignatureType::SubkeyBinding.is_certification());
        assert!(SignatureType::from(0x30).is_revocation());
        assert_eq!(SignatureType::from(0x77), SignatureType::Other(0x77));
    }
}
