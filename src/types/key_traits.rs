use std::io;

use chrono::{DateTime, Duration, Utc};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::types::{Fingerprint, KeyId, KeyVersion, Mpi, PublicParams, SecretParams};

/// Everything a public key packet can tell about itself.
pub trait PublicKeyTrait: std::fmt::Debug {
    fn version(&self) -> KeyVersion;

    fn fingerprint(&self) -> Fingerprint;

    /// The low 64 bits of the fingerprint for V4 keys, of the modulus for V3 keys.
    fn key_id(&self) -> KeyId;

    fn algorithm(&self) -> PublicKeyAlgorithm;

    fn created_at(&self) -> &DateTime<Utc>;

    /// Validity in days, only carried by V2 and V3 keys. Zero means no expiry.
    fn v3_expiration_days(&self) -> Option<u16>;

    fn public_params(&self) -> &PublicParams;

    /// Verifies `sig` over the already hashed data.
    ///
    /// `Ok(false)` means the signature is well formed but does not match.
    fn verify_signature(&self, hash: HashAlgorithm, hashed: &[u8], sig: &[Mpi]) -> Result<bool>;

    /// Writes the key the way it is framed inside signature hashes:
    /// `0x99`, a two octet length and the public key body.
    fn serialize_for_hashing(&self, writer: &mut impl io::Write) -> Result<()>;

    /// Expiry of a V3 key, derived from its validity period.
    fn v3_expires_at(&self) -> Option<DateTime<Utc>> {
        match self.v3_expiration_days() {
            None | Some(0) => None,
            Some(days) => Some(*self.created_at() + Duration::days(i64::from(days))),
        }
    }
}

/// A key that holds secret material and can therefore sign.
pub trait SecretKeyTrait: PublicKeyTrait {
    fn secret_params(&self) -> &SecretParams;

    /// Unlocks the secret material with `passphrase` and signs `digest`.
    fn create_signature(
        &self,
        passphrase: &str,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<Mpi>>;
}

impl<T: PublicKeyTrait> PublicKeyTrait for &T {
    fn version(&self) -> KeyVersion {
        (*self).version()
    }

    fn fingerprint(&self) -> Fingerprint {
        (*self).fingerprint()
    }

    fn key_id(&self) -> KeyId {
        (*self).key_id()
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        (*self).algorithm()
    }

    fn created_at(&self) -> &DateTime<Utc> {
        (*self).created_at()
    }

    fn v3_expiration_days(&self) -> Option<u16> {
        (*self).v3_expiration_days()
    }

    fn public_params(&self) -> &PublicParams {
        (*self).public_params()
    }

    fn verify_signature(&self, hash: HashAlgorithm, hashed: &[u8], sig: &[Mpi]) -> Result<bool> {
        (*self).verify_signature(hash, hashed, sig)
    }

    fn serialize_for_hashing(&self, writer: &mut impl io::Write) -> Result<()> {
        (*self).serialize_for_hashing(writer)
    }
}
