use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Utc};
use log::debug;

use crate::crypto::hash::{HashAlgorithm, Hasher};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{bail, ensure, Error, Result};
use crate::packet::{Signature, SignatureType, SignatureVersion, Subpacket, SubpacketData};
use crate::ser::Serialize;
use crate::types::{KeyId, PublicKeyTrait, SecretKeyTrait, Tag};
use crate::util::dt_to_timestamp;

/// Fields that only exist in some signature versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureVersionSpecific {
    /// V2 and V3 carry creation time and issuer outside of subpackets.
    V3 {
        version: SignatureVersion,
        created: DateTime<Utc>,
        issuer: KeyId,
    },
    V4,
}

/// Everything a signature covers except the cryptographic values themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureConfig {
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,

    pub hashed_subpackets: Vec<Subpacket>,
    pub unhashed_subpackets: Vec<Subpacket>,

    pub version_specific: SignatureVersionSpecific,
}

impl SignatureConfig {
    pub fn new_v4(
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
        hashed_subpackets: Vec<Subpacket>,
        unhashed_subpackets: Vec<Subpacket>,
    ) -> Self {
        SignatureConfig {
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets,
            unhashed_subpackets,
            version_specific: SignatureVersionSpecific::V4,
        }
    }

    /// A V4 config made by `signer` at `created`, with the creation time hashed
    /// and the issuer in the unhashed area.
    pub fn from_signer(
        signer: &impl PublicKeyTrait,
        typ: SignatureType,
        hash_alg: HashAlgorithm,
        created: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self::new_v4(
            typ,
            signer.algorithm(),
            hash_alg,
            vec![Subpacket::regular(SubpacketData::SignatureCreationTime(created))?],
            vec![Subpacket::regular(SubpacketData::Issuer(signer.key_id()))?],
        ))
    }

    pub fn version(&self) -> SignatureVersion {
        match &self.version_specific {
            SignatureVersionSpecific::V3 { version, .. } => *version,
            SignatureVersionSpecific::V4 => SignatureVersion::V4,
        }
    }

    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    pub fn is_certification(&self) -> bool {
        self.typ.is_certification()
    }

    pub fn hashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets.iter()
    }

    pub fn unhashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.unhashed_subpackets.iter()
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        match &self.version_specific {
            SignatureVersionSpecific::V3 { created, .. } => Some(created),
            SignatureVersionSpecific::V4 => self.hashed_subpackets().find_map(|p| match &p.data {
                SubpacketData::SignatureCreationTime(d) => Some(d),
                _ => None,
            }),
        }
    }

    /// The issuer key id, looked up in both subpacket areas for V4.
    pub fn issuer(&self) -> Option<KeyId> {
        match &self.version_specific {
            SignatureVersionSpecific::V3 { issuer, .. } => Some(*issuer),
            SignatureVersionSpecific::V4 => self
                .hashed_subpackets()
                .chain(self.unhashed_subpackets())
                .find_map(|p| match &p.data {
                    SubpacketData::Issuer(id) => Some(*id),
                    _ => None,
                }),
        }
    }

    /// Hashes the signature fields covered by the signature, returns the number of bytes hashed.
    pub fn hash_signature_data(&self, hasher: &mut Hasher) -> Result<usize> {
        match &self.version_specific {
            SignatureVersionSpecific::V3 { created, .. } => {
                let mut buf = [0u8; 5];
                buf[0] = self.typ.into();
                BigEndian::write_u32(&mut buf[1..], dt_to_timestamp(created));
                hasher.update(&buf);
                Ok(buf.len())
            }
            SignatureVersionSpecific::V4 => {
                let mut res = vec![
                    // version
                    0x04,
                    self.typ.into(),
                    self.pub_alg.into(),
                    self.hash_alg.into(),
                    // placeholder for the hashed area length
                    0,
                    0,
                ];

                self.hashed_subpackets.to_writer(&mut res)?;
                let area_len = u16::try_from(res.len() - 6)?;
                BigEndian::write_u16(&mut res[4..6], area_len);

                hasher.update(&res);
                Ok(res.len())
            }
        }
    }

    /// The final bytes hashed after the signature data.
    pub fn trailer(&self, len: usize) -> Result<Vec<u8>> {
        match self.version_specific {
            SignatureVersionSpecific::V3 { .. } => Ok(Vec::new()),
            SignatureVersionSpecific::V4 => {
                let mut trailer = vec![0x04, 0xFF, 0, 0, 0, 0];
                BigEndian::write_u32(&mut trailer[2..], len.try_into()?);
                Ok(trailer)
            }
        }
    }

    fn finish(&self, mut hasher: Hasher) -> Result<Vec<u8>> {
        let len = self.hash_signature_data(&mut hasher)?;
        hasher.update(&self.trailer(len)?);
        Ok(hasher.finish())
    }

    /// Digest of a certification over `signee` and a user id or attribute.
    pub fn hash_certification(
        &self,
        signee: &impl PublicKeyTrait,
        tag: Tag,
        id: &[u8],
    ) -> Result<Vec<u8>> {
        let mut hasher = self.hash_alg.hasher()?;
        signee.serialize_for_hashing(&mut hasher)?;

        if self.version() == SignatureVersion::V4 {
            let prefix = match tag {
                Tag::UserId => 0xB4,
                Tag::UserAttribute => 0xD1,
                _ => bail!("invalid tag for certification: {:?}", tag),
            };
            let mut prefix_buf = [prefix, 0u8, 0u8, 0u8, 0u8];
            BigEndian::write_u32(&mut prefix_buf[1..], id.len().try_into()?);
            hasher.update(&prefix_buf);
        }
        hasher.update(id);

        self.finish(hasher)
    }

    /// Digest over a primary key and one of its subkeys, used by subkey
    /// bindings and subkey revocations.
    pub fn hash_key_binding(
        &self,
        primary: &impl PublicKeyTrait,
        subkey: &impl PublicKeyTrait,
    ) -> Result<Vec<u8>> {
        let mut hasher = self.hash_alg.hasher()?;
        primary.serialize_for_hashing(&mut hasher)?;
        subkey.serialize_for_hashing(&mut hasher)?;

        self.finish(hasher)
    }

    /// Digest over a single key, used by key revocations and direct key signatures.
    pub fn hash_key(&self, key: &impl PublicKeyTrait) -> Result<Vec<u8>> {
        let mut hasher = self.hash_alg.hasher()?;
        key.serialize_for_hashing(&mut hasher)?;

        self.finish(hasher)
    }

    fn into_signature(
        self,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        digest: &[u8],
    ) -> Result<Signature> {
        ensure!(
            self.pub_alg == key.algorithm(),
            "signature algorithm {:?} does not match key {:?}",
            self.pub_alg,
            key.algorithm()
        );
        let signed_hash_value = [digest[0], digest[1]];
        let signature = key.create_signature(passphrase, self.hash_alg, digest)?;
        Signature::from_config(self, signed_hash_value, signature)
    }

    /// Certifies the binding between `signee` and a user id or attribute.
    pub fn sign_certification(
        self,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        signee: &impl PublicKeyTrait,
        tag: Tag,
        id: &[u8],
    ) -> Result<Signature> {
        if !(self.is_certification() || self.typ == SignatureType::CertRevocation) {
            return Err(Error::Verification {
                message: format!("{:?} is not a certification", self.typ),
            });
        }
        debug!("signing certification {:?} for {}", self.typ, signee.key_id());

        let digest = self.hash_certification(signee, tag, id)?;
        self.into_signature(key, passphrase, &digest)
    }

    /// Binds `subkey` to the primary `key` (or revokes that binding).
    pub fn sign_key_binding(
        self,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        subkey: &impl PublicKeyTrait,
    ) -> Result<Signature> {
        debug!("signing key binding {:?} for {}", self.typ, subkey.key_id());

        let digest = self.hash_key_binding(key, subkey)?;
        self.into_signature(key, passphrase, &digest)
    }

    /// Signs `target` directly, e.g. to revoke it.
    pub fn sign_key(
        self,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        target: &impl PublicKeyTrait,
    ) -> Result<Signature> {
        debug!("signing key {:?} for {}", self.typ, target.key_id());

        let digest = self.hash_key(target)?;
        self.into_signature(key, passphrase, &digest)
    }
}
