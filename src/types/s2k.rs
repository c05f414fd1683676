use std::io;

use bytes::{Buf, Bytes};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{format_err, unsupported_err, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;

/// Coded iteration count used for newly created specifiers, 16777216 octets.
pub const DEFAULT_ITER_COUNT: u8 = 0xE0;

/// A string-to-key specifier: how a passphrase becomes a symmetric key.
///
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-3.7>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub enum StringToKey {
    Simple {
        hash_alg: HashAlgorithm,
    },
    Salted {
        hash_alg: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
    },
    IteratedAndSalted {
        hash_alg: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
        count: u8,
    },
    /// Private or experimental types (100..=110), e.g. GnuPG's "gnu-dummy" stubs.
    /// Everything following the type octet is kept as is.
    Private {
        typ: u8,
        #[debug("{}", hex::encode(unknown))]
        unknown: Bytes,
    },
}

impl StringToKey {
    pub fn new_iterated<R: CryptoRng + Rng>(mut rng: R, hash_alg: HashAlgorithm, count: u8) -> Self {
        let mut salt = [0u8; 8];
        rng.fill(&mut salt[..]);

        StringToKey::IteratedAndSalted {
            hash_alg,
            salt,
            count,
        }
    }

    /// Converts a coded count into the number of octets to hash.
    /// Ref: <https://tools.ietf.org/html/rfc4880.html#section-3.7.1.3>
    pub fn coded_count(c: u8) -> usize {
        ((16u32 + u32::from(c & 15)) << (u32::from(c >> 4) + EXPBIAS)) as usize
    }

    pub fn typ(&self) -> u8 {
        match self {
            Self::Simple { .. } => 0,
            Self::Salted { .. } => 1,
            Self::IteratedAndSalted { .. } => 3,
            Self::Private { typ, .. } => *typ,
        }
    }

    pub fn hash_alg(&self) -> Option<HashAlgorithm> {
        match self {
            Self::Simple { hash_alg }
            | Self::Salted { hash_alg, .. }
            | Self::IteratedAndSalted { hash_alg, .. } => Some(*hash_alg),
            Self::Private { .. } => None,
        }
    }

    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let typ = i.read_u8()?;
        match typ {
            0 => {
                let hash_alg = i.read_u8()?.into();
                Ok(Self::Simple { hash_alg })
            }
            1 => {
                let hash_alg = i.read_u8()?.into();
                let salt = i.read_array::<8>()?;
                Ok(Self::Salted { hash_alg, salt })
            }
            3 => {
                let hash_alg = i.read_u8()?.into();
                let salt = i.read_array::<8>()?;
                let count = i.read_u8()?;
                Ok(Self::IteratedAndSalted {
                    hash_alg,
                    salt,
                    count,
                })
            }
            100..=110 => Ok(Self::Private {
                typ,
                unknown: i.rest(),
            }),
            _ => unsupported_err!("string to key type {}", typ),
        }
    }

    /// Derives a key of `key_size` bytes from the passphrase.
    ///
    /// When one digest is not enough, further passes are hashed with an increasing
    /// number of zero bytes in front and the outputs are concatenated.
    pub fn derive_key(&self, passphrase: &[u8], key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        let hash_alg = match self.hash_alg() {
            Some(alg) => alg,
            None => unsupported_err!("deriving a key from string to key type {}", self.typ()),
        };
        let digest_size = hash_alg
            .digest_size()
            .ok_or_else(|| format_err!("unsupported hash {:?}", hash_alg))?;

        let rounds = key_size.div_ceil(digest_size);
        let mut key = Zeroizing::new(Vec::with_capacity(rounds * digest_size));
        let zeros = vec![0u8; rounds];

        for round in 0..rounds {
            let mut hasher = hash_alg.hasher()?;
            hasher.update(&zeros[..round]);

            match self {
                Self::Simple { .. } => hasher.update(passphrase),
                Self::Salted { salt, .. } => {
                    hasher.update(salt);
                    hasher.update(passphrase);
                }
                Self::IteratedAndSalted { salt, count, .. } => {
                    let data_len = salt.len() + passphrase.len();
                    let count = Self::coded_count(*count).max(data_len);

                    for _ in 0..count / data_len {
                        hasher.update(salt);
                        hasher.update(passphrase);
                    }

                    // a final partial block, salt first
                    let tail = count % data_len;
                    if tail <= salt.len() {
                        hasher.update(&salt[..tail]);
                    } else {
                        hasher.update(salt);
                        hasher.update(&passphrase[..tail - salt.len()]);
                    }
                }
                Self::Private { .. } => unreachable!("checked above"),
            }

            key.extend_from_slice(&hasher.finish());
        }

        key.truncate(key_size);
        Ok(key)
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.typ()])?;
        match self {
            Self::Simple { hash_alg } => {
                writer.write_all(&[u8::from(*hash_alg)])?;
            }
            Self::Salted { hash_alg, salt } => {
                writer.write_all(&[u8::from(*hash_alg)])?;
                writer.write_all(salt)?;
            }
            Self::IteratedAndSalted {
                hash_alg,
                salt,
                count,
            } => {
                writer.write_all(&[u8::from(*hash_alg)])?;
                writer.write_all(salt)?;
                writer.write_all(&[*count])?;
            }
            Self::Private { unknown, .. } => {
                writer.write_all(unknown)?;
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::Simple { .. } => 2,
            Self::Salted { .. } => 10,
            Self::IteratedAndSalted { .. } => 11,
            Self::Private { unknown, .. } => 1 + unknown.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_coded_count() {
        assert_eq!(StringToKey::coded_count(0), 1024);
        assert_eq!(StringToKey::coded_count(96), 65536);
        assert_eq!(StringToKey::coded_count(DEFAULT_ITER_COUNT), 16_777_216);
        assert_eq!(StringToKey::coded_count(255), 65_011_712);
    }

    #[test]
    fn test_simple_and_salted() {
        let s2k = StringToKey::Simple {
            hash_alg: HashAlgorithm::Sha1,
        };
        let key = s2k.derive_key(b"hello", 16).unwrap();
        assert_eq!(&key[..], &HashAlgorithm::Sha1.digest(b"hello").unwrap()[..16]);

        let s2k = StringToKey::Salted {
            hash_alg: HashAlgorithm::Sha256,
            salt: *b"saltsalt",
        };
        let key = s2k.derive_key(b"pw", 32).unwrap();
        assert_eq!(&key[..], &HashAlgorithm::Sha256.digest(b"saltsaltpw").unwrap()[..]);
    }

    #[test]
    fn test_zero_prefix_passes() {
        // MD5 gives 16 bytes, a 24 byte key needs a second pass
        let s2k = StringToKey::Simple {
            hash_alg: HashAlgorithm::Md5,
        };
        let key = s2k.derive_key(b"passphrase", 24).unwrap();

        let mut expected = HashAlgorithm::Md5.digest(b"passphrase").unwrap();
        expected.extend_from_slice(&HashAlgorithm::Md5.digest(b"\x00passphrase").unwrap()[..8]);
        assert_eq!(&key[..], &expected[..]);
    }

    #[test]
    fn test_iterated_partial_block() {
        let salt = *b"12345678";
        let s2k = StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha1,
            salt,
            count: 0,
        };
        let key = s2k.derive_key(b"abc", 20).unwrap();

        // 1024 octets of "12345678abc" repeated, cut in the middle of the salt
        let data: Vec<u8> = b"12345678abc".iter().copied().cycle().take(1024).collect();
        assert_eq!(&key[..], &HashAlgorithm::Sha1.digest(&data).unwrap()[..]);
    }

    #[test]
    fn test_iterated_count_below_data_len() {
        let salt = *b"saltsalt";
        let passphrase = vec![b'x'; 2000];
        let iterated = StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha256,
            salt,
            count: 0,
        };
        let salted = StringToKey::Salted {
            hash_alg: HashAlgorithm::Sha256,
            salt,
        };

        assert_eq!(
            iterated.derive_key(&passphrase, 32).unwrap(),
            salted.derive_key(&passphrase, 32).unwrap()
        );
    }

    #[test]
    fn test_parse_private() {
        // gnu-dummy
        let raw = hex::decode("6502474e5501").unwrap();
        let s2k = StringToKey::from_buf(&mut &raw[..]).unwrap();
        assert_eq!(s2k.typ(), 101);
        assert_eq!(s2k.to_bytes().unwrap(), raw);
        assert!(s2k.derive_key(b"", 16).is_err());

        assert!(StringToKey::from_buf(&mut &[2u8, 2][..]).is_err());
    }

    fn arb_s2k() -> impl Strategy<Value = StringToKey> {
        let hash = prop_oneof![
            Just(HashAlgorithm::Md5),
            Just(HashAlgorithm::Sha1),
            Just(HashAlgorithm::Ripemd160),
            Just(HashAlgorithm::Sha256),
            Just(HashAlgorithm::Sha512),
        ];
        (hash, any::<[u8; 8]>(), 0u8..64, 0u8..3).prop_map(|(hash_alg, salt, count, typ)| match typ {
            0 => StringToKey::Simple { hash_alg },
            1 => StringToKey::Salted { hash_alg, salt },
            _ => StringToKey::IteratedAndSalted {
                hash_alg,
                salt,
                count,
            },
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn derive_key_is_deterministic(s2k in arb_s2k(), passphrase: Vec<u8>, key_size in 1usize..80) {
            let a = s2k.derive_key(&passphrase, key_size)?;
            let b = s2k.derive_key(&passphrase, key_size)?;
            prop_assert_eq!(a.len(), key_size);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn s2k_roundtrip(s2k in arb_s2k()) {
            let buf = s2k.to_bytes()?;
            prop_assert_eq!(buf.len(), s2k.write_len());
            let back = StringToKey::from_buf(&mut &buf[..])?;
            prop_assert_eq!(s2k, back);
        }
    }
}
