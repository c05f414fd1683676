//! # Key generation module
//!
//! RSA key pairs with a self certified primary user id and an optional
//! encryption subkey. Generation is blocking; [`KeyGenTask`] moves it onto the
//! tokio blocking pool and makes it cancellable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use derive_builder::Builder;
use log::{debug, info};
use rand::{CryptoRng, Rng};
use smallvec::smallvec;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::rsa;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{format_err, Error, Result};
use crate::keyring::{CertSignature, PrimaryKey, SignerRef, Subkey, UserBinding, UserPacket};
use crate::packet::{
    PubKeyInner, SecretKey, SecretSubkey, SignatureConfig, SignatureType, Subpacket,
    SubpacketData, UserId,
};
use crate::types::{
    KeyVersion, PlainSecretParams, SecretParams, StringToKey, Tag, TrustByte, DEFAULT_ITER_COUNT,
};

/// Key flags: certify and sign.
const PRIMARY_FLAGS: u8 = 0x03;
/// Key flags: encrypt communications and storage.
const SUBKEY_FLAGS: u8 = 0x0C;

const PROTECTION_ALG: SymmetricKeyAlgorithm = SymmetricKeyAlgorithm::AES128;

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "Error"))]
pub struct KeyGenParams {
    /// RSA modulus size.
    #[builder(default = "2048")]
    bits: usize,
    #[builder(setter(into))]
    primary_user_id: String,
    /// Protects the secret key material; empty leaves it unprotected.
    #[builder(default, setter(into))]
    passphrase: String,
    #[builder(default = "chrono::Utc::now().trunc_subsecs(0)")]
    created_at: DateTime<Utc>,
    #[builder(default = "HashAlgorithm::Sha256")]
    hash_alg: HashAlgorithm,
    /// Also create an encryption subkey.
    #[builder(default = "true")]
    subkey: bool,
}

impl KeyGenParamsBuilder {
    fn validate(&self) -> Result<()> {
        if let Some(bits) = self.bits {
            if bits < 1024 {
                return Err(Error::Message {
                    message: format!("RSA keys need at least 1024 bits, got {bits}"),
                });
            }
            if bits > rsa::MAX_KEY_SIZE {
                return Err(Error::Message {
                    message: format!("RSA keys are limited to {} bits", rsa::MAX_KEY_SIZE),
                });
            }
        }
        if self.primary_user_id.as_ref().is_some_and(|id| id.is_empty()) {
            return Err(Error::Message {
                message: "primary user id must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl KeyGenParams {
    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn primary_user_id(&self) -> &str {
        &self.primary_user_id
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }
}

fn protect<R: Rng + CryptoRng>(
    rng: &mut R,
    plain: PlainSecretParams,
    passphrase: &str,
) -> Result<SecretParams> {
    if passphrase.is_empty() {
        return Ok(SecretParams::Plain(plain));
    }
    let s2k = StringToKey::new_iterated(&mut *rng, HashAlgorithm::Sha1, DEFAULT_ITER_COUNT);
    let encrypted = plain.encrypt(&mut *rng, passphrase, s2k, PROTECTION_ALG)?;
    Ok(SecretParams::Encrypted(encrypted))
}

fn check_cancelled(cancelled: &AtomicBool) -> Result<()> {
    if cancelled.load(Ordering::SeqCst) {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Generates a key pair. Blocks for as long as prime generation takes.
pub fn generate_key<R: Rng + CryptoRng>(params: &KeyGenParams, rng: &mut R) -> Result<PrimaryKey> {
    generate_until(params, rng, &AtomicBool::new(false))
}

fn generate_until<R: Rng + CryptoRng>(
    params: &KeyGenParams,
    rng: &mut R,
    cancelled: &AtomicBool,
) -> Result<PrimaryKey> {
    check_cancelled(cancelled)?;
    let passphrase = params.passphrase.as_str();

    debug!("generating {} bit primary key", params.bits);
    let (public_params, plain) = rsa::generate_key(rng, params.bits)?;
    check_cancelled(cancelled)?;

    let details = PubKeyInner::new(
        KeyVersion::V4,
        PublicKeyAlgorithm::RSA,
        params.created_at,
        None,
        public_params,
    )?;
    let secret = SecretKey::new(details, protect(rng, plain, passphrase)?)?;
    let public = secret.public_key()?;

    let user_id = UserId::from_str(&params.primary_user_id)?;
    let mut config = SignatureConfig::from_signer(
        &public,
        SignatureType::CertPositive,
        params.hash_alg,
        params.created_at,
    )?;
    config.hashed_subpackets.extend([
        Subpacket::regular(SubpacketData::KeyFlags(smallvec![PRIMARY_FLAGS]))?,
        Subpacket::regular(SubpacketData::IsPrimary(true))?,
        Subpacket::regular(SubpacketData::PreferredSymmetricAlgorithms(smallvec![
            SymmetricKeyAlgorithm::AES256,
            SymmetricKeyAlgorithm::AES128,
            SymmetricKeyAlgorithm::CAST5,
        ]))?,
        Subpacket::regular(SubpacketData::PreferredHashAlgorithms(smallvec![
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha1,
        ]))?,
    ]);
    let self_sig =
        config.sign_certification(&secret, passphrase, &public, Tag::UserId, user_id.id())?;

    let subkey = if params.subkey {
        check_cancelled(cancelled)?;
        debug!("generating {} bit subkey", params.bits);
        let (sub_params, sub_plain) = rsa::generate_key(rng, params.bits)?;
        check_cancelled(cancelled)?;

        let details = PubKeyInner::new(
            KeyVersion::V4,
            PublicKeyAlgorithm::RSA,
            params.created_at,
            None,
            sub_params,
        )?;
        let sub_secret = SecretSubkey::new(details, protect(rng, sub_plain, passphrase)?)?;
        let sub_public = sub_secret.public_key()?;

        let mut config = SignatureConfig::from_signer(
            &public,
            SignatureType::SubkeyBinding,
            params.hash_alg,
            params.created_at,
        )?;
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::KeyFlags(smallvec![SUBKEY_FLAGS]))?);
        let binding = config.sign_key_binding(&secret, passphrase, &sub_public)?;

        let mut subkey = Subkey::from_secret(sub_secret, TrustByte::default())?;
        subkey.set_binding(CertSignature::created_here(binding, SignerRef::SelfSigned));
        Some(subkey)
    } else {
        None
    };

    let mut key = PrimaryKey::from_key_pair(secret)?;
    let mut binding = UserBinding::new(UserPacket::Id(user_id), TrustByte::default());
    binding
        .signatures_mut()
        .push(CertSignature::created_here(self_sig, SignerRef::SelfSigned));
    key.users_mut().push(binding);
    key.subkeys_mut().extend(subkey);
    key.mark_public_read();

    info!("generated key {} for {:?}", key.key_id(), params.primary_user_id);
    Ok(key)
}

/// Key generation running on the tokio blocking pool.
///
/// Prime generation itself cannot be interrupted: a cancelled task stops at
/// the next step boundary and its result is discarded.
#[derive(Debug)]
pub struct KeyGenTask {
    handle: JoinHandle<Result<PrimaryKey>>,
    notify: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
}

impl KeyGenTask {
    /// Starts generating. Must be called from within a tokio runtime.
    pub fn spawn<R>(params: KeyGenParams, mut rng: R) -> Self
    where
        R: Rng + CryptoRng + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let handle = tokio::task::spawn_blocking(move || generate_until(&params, &mut rng, &flag));

        KeyGenTask {
            handle,
            notify: Arc::new(Notify::new()),
            cancelled,
        }
    }

    /// Requests cancellation; a pending or later [`KeyGenTask::wait`] resolves
    /// with [`Error::Cancelled`].
    pub fn cancel(&self) {
        debug!("cancelling key generation");
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the generated key.
    pub async fn wait(mut self) -> Result<PrimaryKey> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.notify.notified() => Err(Error::Cancelled),
            res = &mut self.handle => match res {
                Ok(res) => res,
                Err(err) => Err(format_err!(format!("key generation failed: {err}"))),
            },
        }
    }

    /// Like [`KeyGenTask::wait`], giving up with [`Error::Timeout`] after
    /// `timeout`. The abandoned generation is cancelled.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<PrimaryKey> {
        let cancelled = self.cancelled.clone();
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(res) => res,
            Err(_) => {
                cancelled.store(true, Ordering::SeqCst);
                Err(Error::Timeout {
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn params(subkey: bool) -> KeyGenParams {
        KeyGenParamsBuilder::default()
            .bits(1024)
            .primary_user_id("Alice <alice@example.org>")
            .subkey(subkey)
            .build()
            .unwrap()
    }

    #[test]
    fn test_params_validation() {
        let err = KeyGenParamsBuilder::default()
            .bits(512)
            .primary_user_id("x")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("1024"), "{}", err);

        assert!(KeyGenParamsBuilder::default().build().is_err());
    }

    #[test]
    fn test_generate_key() {
        let _ = pretty_env_logger::try_init();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let key = generate_key(&params(true), &mut rng).unwrap();
        assert!(key.is_key_pair());
        assert_eq!(key.owner_trust(), crate::types::OwnerTrust::Ultimate);
        assert!(key.trust().is_buckstop());
        assert_eq!(
            key.primary_user_id().as_deref(),
            Some("Alice <alice@example.org>")
        );
        assert_eq!(key.subkeys().len(), 1);
        assert!(key.subkeys()[0].is_key_pair());

        let sig = key.users()[0].signatures()[0].signature();
        assert!(sig.is_primary());
        assert_eq!(sig.key_flags(), &[PRIMARY_FLAGS][..]);
        assert_eq!(sig.preferred_symmetric_algs()[0], SymmetricKeyAlgorithm::AES256);
        assert!(sig
            .verify_certification(key.public_key(), key.public_key(), Tag::UserId, key.users()[0].user().data())
            .unwrap());
        let binding = key.subkeys()[0].binding().unwrap().signature();
        assert_eq!(binding.key_flags(), &[SUBKEY_FLAGS][..]);
        assert!(binding
            .verify_key_binding(key.public_key(), key.subkeys()[0].public_key())
            .unwrap());
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancelled = AtomicBool::new(true);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generate_until(&params(false), &mut rng, &cancelled).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
