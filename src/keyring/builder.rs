use bytes::Bytes;
use chrono::Duration;
use log::{debug, info};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{format_err, Error, Result};
use crate::keyring::{CertSignature, KeyStore, PrimaryKey, SigRef, SigSite, SignerRef};
use crate::packet::{
    RevocationCode, SecretKey, SignatureConfig, SignatureType, Subpacket, SubpacketData,
};
use crate::types::KeyId;
use crate::util::now;

/// Hash used for signatures created by the store.
const SIGNING_HASH: HashAlgorithm = HashAlgorithm::Sha256;

fn secret_of(key: &PrimaryKey) -> Result<&SecretKey> {
    key.secret_key().ok_or_else(|| Error::KeyMismatch {
        message: format!("no secret key for {}", key.key_id()),
    })
}

fn reason_subpacket(code: RevocationCode, reason: &str) -> Result<Subpacket> {
    Subpacket::regular(SubpacketData::RevocationReason(
        code,
        Bytes::copy_from_slice(reason.as_bytes()),
    ))
}

impl KeyStore {
    /// Certifies the `user`th binding of `target` with the primary key of
    /// `signer`, which must be a key pair in the store.
    ///
    /// With `trust` set to `(depth, amount)` the certification also is a trust
    /// signature.
    pub fn certify(
        &mut self,
        signer: &KeyId,
        passphrase: &str,
        target: &KeyId,
        user: usize,
        trust: Option<(u8, u8)>,
    ) -> Result<SigRef> {
        let signer_key = self
            .key_by_long_id(signer)
            .ok_or(Error::MissingKey { key_id: *signer })?;
        let secret = secret_of(signer_key)?;
        let target_key = self
            .key_by_long_id(target)
            .ok_or(Error::MissingKey { key_id: *target })?;
        if target_key.is_revoked() {
            return Err(Error::Revocation {
                message: format!("{} is revoked", target),
            });
        }
        let binding = target_key
            .users()
            .get(user)
            .ok_or_else(|| format_err!("{} has no user binding {}", target, user))?;

        let typ = if signer == target {
            SignatureType::CertPositive
        } else {
            SignatureType::CertGeneric
        };
        let mut config = SignatureConfig::from_signer(secret, typ, SIGNING_HASH, now())?;
        if let Some((depth, amount)) = trust {
            config
                .hashed_subpackets
                .push(Subpacket::regular(SubpacketData::TrustSignature(depth, amount))?);
        }
        let sig = config.sign_certification(
            secret,
            passphrase,
            target_key.public_key(),
            binding.user().tag(),
            binding.user().data(),
        )?;
        info!("{} certified {:?} of {}", signer, binding.id_string(), target);

        let signer_ref = if signer == target {
            SignerRef::SelfSigned
        } else {
            SignerRef::Key(*signer)
        };
        let signatures = self
            .key_by_long_id_mut(target)
            .and_then(|k| k.users_mut().get_mut(user))
            .map(|b| b.signatures_mut())
            .ok_or(Error::MissingKey { key_id: *target })?;
        signatures.push(CertSignature::created_here(sig, signer_ref));

        Ok(SigRef {
            key: *target,
            site: SigSite::User {
                user,
                sig: signatures.len() - 1,
            },
        })
    }

    /// Revokes a key pair of the store with a self-signed key revocation.
    pub fn revoke_key(
        &mut self,
        key_id: &KeyId,
        passphrase: &str,
        code: RevocationCode,
        reason: &str,
    ) -> Result<()> {
        let key = self
            .key_by_long_id(key_id)
            .ok_or(Error::MissingKey { key_id: *key_id })?;
        if key.is_revoked() {
            return Err(Error::Revocation {
                message: format!("{} is already revoked", key_id),
            });
        }
        let secret = secret_of(key)?;

        let mut config =
            SignatureConfig::from_signer(secret, SignatureType::KeyRevocation, SIGNING_HASH, now())?;
        config.hashed_subpackets.push(reason_subpacket(code, reason)?);
        let sig = config.sign_key(secret, passphrase, key.public_key())?;
        info!("revoked key {}", key_id);

        if let Some(key) = self.key_by_long_id_mut(key_id) {
            key.set_revocation(CertSignature::created_here(sig, SignerRef::SelfSigned));
        }
        Ok(())
    }

    /// Revokes one subkey of a key pair.
    pub fn revoke_subkey(
        &mut self,
        primary: &KeyId,
        subkey: &KeyId,
        passphrase: &str,
        code: RevocationCode,
        reason: &str,
    ) -> Result<()> {
        let key = self
            .key_by_long_id(primary)
            .ok_or(Error::MissingKey { key_id: *primary })?;
        let i = key
            .subkeys()
            .iter()
            .position(|s| s.key_id() == *subkey)
            .ok_or(Error::MissingKey { key_id: *subkey })?;
        if key.subkeys()[i].is_revoked() {
            return Err(Error::Revocation {
                message: format!("subkey {} is already revoked", subkey),
            });
        }
        let secret = secret_of(key)?;

        let mut config = SignatureConfig::from_signer(
            secret,
            SignatureType::SubkeyRevocation,
            SIGNING_HASH,
            now(),
        )?;
        config.hashed_subpackets.push(reason_subpacket(code, reason)?);
        let sig = config.sign_key_binding(secret, passphrase, key.subkeys()[i].public_key())?;
        info!("revoked subkey {} of {}", subkey, primary);

        if let Some(sub) = self
            .key_by_long_id_mut(primary)
            .and_then(|k| k.subkeys_mut().get_mut(i))
        {
            sub.set_revocation(CertSignature::created_here(sig, SignerRef::SelfSigned));
        }
        Ok(())
    }

    /// Revokes a certification made by a key pair of the store.
    ///
    /// The revocation is dated after the certification it revokes, even when
    /// the clock says otherwise.
    pub fn revoke_certification(&mut self, sig_ref: &SigRef, passphrase: &str) -> Result<()> {
        let SigSite::User { user, .. } = sig_ref.site else {
            return Err(Error::Revocation {
                message: format!("{:?} is not a certification", sig_ref.site),
            });
        };
        let target = self
            .key_by_long_id(&sig_ref.key)
            .ok_or(Error::MissingKey { key_id: sig_ref.key })?;
        let cert = self
            .signature(sig_ref)
            .ok_or_else(|| format_err!("no signature at {:?}", sig_ref.site))?;
        if !cert.signature().is_certification() {
            return Err(Error::Revocation {
                message: format!("{:?} signatures cannot be revoked", cert.typ()),
            });
        }
        if cert.is_revoked() {
            return Err(Error::Revocation {
                message: "certification is already revoked".to_string(),
            });
        }
        let issuer = cert.issuer().ok_or_else(|| Error::KeyMismatch {
            message: "certification names no issuer".to_string(),
        })?;
        let signer = self
            .key_by_long_id(&issuer)
            .ok_or(Error::MissingKey { key_id: issuer })?;
        let secret = secret_of(signer)?;
        let binding = target
            .users()
            .get(user)
            .ok_or_else(|| format_err!("no user binding at {}", user))?;

        let mut created = now();
        if let Some(certified) = cert.created() {
            created = created.max(*certified + Duration::seconds(1));
        }
        let config = SignatureConfig::from_signer(
            secret,
            SignatureType::CertRevocation,
            SIGNING_HASH,
            created,
        )?;
        let sig = config.sign_certification(
            secret,
            passphrase,
            target.public_key(),
            binding.user().tag(),
            binding.user().data(),
        )?;
        debug!("revoked certification by {} on {}", issuer, sig_ref.key);

        let signer_ref = if issuer == sig_ref.key {
            SignerRef::SelfSigned
        } else {
            SignerRef::Key(issuer)
        };
        if let Some(cert) = self.signature_mut(sig_ref) {
            cert.set_revocation(CertSignature::created_here(sig, signer_ref));
        }
        Ok(())
    }
}
