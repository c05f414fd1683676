use std::str::FromStr;

use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use camellia::{Camellia128, Camellia192, Camellia256};
use cast5::Cast5;
use cfb_mode::{
    cipher::{AsyncStreamCipher, KeyIvInit},
    Decryptor, Encryptor,
};
use cipher::{BlockCipher, BlockEncryptMut};
use des::TdesEde3;
use idea::Idea;
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use twofish::Twofish;
use zeroize::Zeroizing;

use crate::errors::{bail, unimplemented_err, Error, Result};

/// Length of the trailing modification detection code: tag, length and a SHA-1 digest.
const MDC_LEN: usize = 22;
const MDC_HEADER: [u8; 2] = [0xD3, 0x14];

/// Symmetric cipher ids, RFC 4880 section 9.2 and RFC 5581 for Camellia.
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, Hash)]
#[repr(u8)]
#[non_exhaustive]
pub enum SymmetricKeyAlgorithm {
    /// Unprotected secret key material.
    Plaintext = 0,
    /// The PGP 2.6 cipher.
    IDEA = 1,
    TripleDES = 2,
    CAST5 = 3,
    Blowfish = 4,
    AES128 = 7,
    AES192 = 8,
    AES256 = 9,
    Twofish = 10,
    Camellia128 = 11,
    Camellia192 = 12,
    Camellia256 = 13,

    #[num_enum(catch_all)]
    Other(u8),
}

/// Name, key size and block size in bytes of each known cipher.
pub const CIPHERS: [(SymmetricKeyAlgorithm, &str, usize, usize); 12] = [
    (SymmetricKeyAlgorithm::Plaintext, "PLAINTEXT", 0, 0),
    (SymmetricKeyAlgorithm::IDEA, "IDEA", 16, 8),
    (SymmetricKeyAlgorithm::TripleDES, "3DES", 24, 8),
    (SymmetricKeyAlgorithm::CAST5, "CAST5", 16, 8),
    (SymmetricKeyAlgorithm::Blowfish, "BLOWFISH", 16, 8),
    (SymmetricKeyAlgorithm::AES128, "AES", 16, 16),
    (SymmetricKeyAlgorithm::AES192, "AES192", 24, 16),
    (SymmetricKeyAlgorithm::AES256, "AES256", 32, 16),
    (SymmetricKeyAlgorithm::Twofish, "TWOFISH", 32, 16),
    (SymmetricKeyAlgorithm::Camellia128, "CAMELLIA128", 16, 16),
    (SymmetricKeyAlgorithm::Camellia192, "CAMELLIA192", 24, 16),
    (SymmetricKeyAlgorithm::Camellia256, "CAMELLIA256", 32, 16),
];

#[allow(clippy::derivable_impls)]
impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::AES128
    }
}

impl zeroize::DefaultIsZeroes for SymmetricKeyAlgorithm {}

impl FromStr for SymmetricKeyAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CIPHERS
            .iter()
            .find(|(_, name, _, _)| name.eq_ignore_ascii_case(s))
            .map(|(alg, ..)| *alg)
            .ok_or_else(|| Error::Message {
                message: format!("unknown symmetric algorithm {s}"),
            })
    }
}

fn cfb_encrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher,
    Encryptor<C>: KeyIvInit,
{
    Encryptor::<C>::new_from_slices(key, iv)?.encrypt(data);
    Ok(())
}

fn cfb_decrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher,
    Decryptor<C>: KeyIvInit,
{
    Decryptor::<C>::new_from_slices(key, iv)?.decrypt(data);
    Ok(())
}

/// Runs the given generic CFB routine with the block cipher matching `$alg`.
macro_rules! with_cipher {
    ($alg:expr, $f:ident($($arg:expr),*)) => {
        match $alg {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::IDEA => $f::<Idea>($($arg),*),
            SymmetricKeyAlgorithm::TripleDES => $f::<TdesEde3>($($arg),*),
            SymmetricKeyAlgorithm::CAST5 => $f::<Cast5>($($arg),*),
            SymmetricKeyAlgorithm::Blowfish => $f::<Blowfish>($($arg),*),
            SymmetricKeyAlgorithm::AES128 => $f::<Aes128>($($arg),*),
            SymmetricKeyAlgorithm::AES192 => $f::<Aes192>($($arg),*),
            SymmetricKeyAlgorithm::AES256 => $f::<Aes256>($($arg),*),
            SymmetricKeyAlgorithm::Twofish => $f::<Twofish>($($arg),*),
            SymmetricKeyAlgorithm::Camellia128 => $f::<Camellia128>($($arg),*),
            SymmetricKeyAlgorithm::Camellia192 => $f::<Camellia192>($($arg),*),
            SymmetricKeyAlgorithm::Camellia256 => $f::<Camellia256>($($arg),*),
            SymmetricKeyAlgorithm::Other(id) => {
                unimplemented_err!("SymmetricKeyAlgorithm {} is unsupported", id)
            }
        }
    };
}

impl SymmetricKeyAlgorithm {
    fn info(self) -> Option<&'static (SymmetricKeyAlgorithm, &'static str, usize, usize)> {
        CIPHERS.iter().find(|(alg, ..)| *alg == self)
    }

    /// Block size in bytes, 0 for plaintext and unknown ids.
    pub fn block_size(self) -> usize {
        self.info().map_or(0, |(_, _, _, block)| *block)
    }

    /// Key size in bytes, 0 for plaintext and unknown ids.
    pub fn key_size(self) -> usize {
        self.info().map_or(0, |(_, _, key, _)| *key)
    }

    pub fn name(self) -> Option<&'static str> {
        self.info().map(|(_, name, _, _)| *name)
    }

    /// Plain CFB decryption in place. No OpenPGP resync.
    pub fn decrypt_with_iv_regular(self, key: &[u8], iv: &[u8], ciphertext: &mut [u8]) -> Result<()> {
        with_cipher!(self, cfb_decrypt(key, iv, ciphertext))
    }

    /// Plain CFB encryption in place.
    pub fn encrypt_with_iv_regular(self, key: &[u8], iv: &[u8], plaintext: &mut [u8]) -> Result<()> {
        with_cipher!(self, cfb_encrypt(key, iv, plaintext))
    }

    /// Builds and encrypts `prefix || plaintext || 0xD3 0x14 || SHA1(..)` with a
    /// zero IV. The random prefix is one block followed by a repeat of its last
    /// two bytes.
    pub fn encrypt_protected<R: CryptoRng + Rng>(
        self,
        mut rng: R,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let bs = self.block_size();
        if bs == 0 {
            bail!("{:?} can not be used for encryption", self);
        }
        debug!("encrypting {} bytes with {:?}", plaintext.len(), self);

        let mut body = Vec::with_capacity(self.encrypted_protected_len(plaintext.len()));
        body.resize(bs, 0);
        rng.fill_bytes(&mut body);
        body.extend_from_within(bs - 2..bs);
        body.extend_from_slice(plaintext);
        body.extend_from_slice(&MDC_HEADER);
        let mdc = Sha1::digest(&body);
        body.extend_from_slice(&mdc);

        self.encrypt_with_iv_regular(key, &vec![0u8; bs], &mut body)?;
        Ok(body)
    }

    /// Reverses [`Self::encrypt_protected`], returning the inner plaintext.
    ///
    /// Fails with [`Error::Integrity`] if either the quick check or the modification
    /// detection code does not match; no plaintext is returned in that case.
    pub fn decrypt_protected(self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let bs = self.block_size();
        if bs == 0 {
            bail!("{:?} can not be used for decryption", self);
        }
        debug!("decrypting {} bytes with {:?}", ciphertext.len(), self);
        if ciphertext.len() < bs + 2 + MDC_LEN {
            return Err(Error::Integrity {
                reason: "encrypted container is too short",
            });
        }

        let mut plaintext = Zeroizing::new(ciphertext.to_vec());
        let iv = vec![0u8; bs];
        self.decrypt_with_iv_regular(key, &iv, &mut plaintext)?;

        if plaintext[bs - 2..bs] != plaintext[bs..bs + 2] {
            return Err(Error::Integrity {
                reason: "quick check",
            });
        }

        let (hashed, expected) = plaintext.split_at(plaintext.len() - 20);
        let actual = Sha1::digest(hashed);
        let header_ok = hashed[hashed.len() - 2..].ct_eq(&MDC_HEADER[..]);
        let digest_ok = actual.as_slice().ct_eq(expected);
        if !bool::from(header_ok & digest_ok) {
            return Err(Error::Integrity {
                reason: "modification detection code",
            });
        }

        Ok(hashed[bs + 2..hashed.len() - 2].to_vec())
    }

    pub fn encrypted_protected_len(&self, plaintext_len: usize) -> usize {
        self.block_size() + 2 + plaintext_len + MDC_LEN
    }

    /// Random key of [`Self::key_size`] bytes.
    pub fn new_session_key<R: Rng + CryptoRng>(self, mut rng: R) -> Zeroizing<Vec<u8>> {
        let mut session_key = Zeroizing::new(vec![0u8; self.key_size()]);
        rng.fill_bytes(&mut session_key);
        session_key
    }
}
