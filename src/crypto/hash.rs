use std::io;
use std::str::FromStr;

use digest::{Digest, DynDigest};
use md5::Md5;
use num_enum::{FromPrimitive, IntoPrimitive};
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::errors::{unsupported_err, Error, Result};

/// Hash algorithm ids, RFC 4880 section 9.4.
#[derive(
    Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, Hash, derive_more::Display,
)]
#[repr(u8)]
pub enum HashAlgorithm {
    #[display("NONE")]
    None = 0,
    #[display("MD5")]
    Md5 = 1,
    #[display("SHA1")]
    Sha1 = 2,
    #[display("RIPEMD160")]
    Ripemd160 = 3,
    #[display("SHA256")]
    Sha256 = 8,
    #[display("SHA384")]
    Sha384 = 9,
    #[display("SHA512")]
    Sha512 = 10,
    #[display("SHA224")]
    Sha224 = 11,
    /// GnuPG private id, never computed.
    #[display("PRIVATE10")]
    Private10 = 110,
    #[num_enum(catch_all)]
    #[display("HASH{_0}")]
    Other(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

impl zeroize::DefaultIsZeroes for HashAlgorithm {}

/// Algorithms this crate can compute, with their digest lengths.
const DIGESTS: [(HashAlgorithm, usize); 7] = [
    (HashAlgorithm::Md5, 16),
    (HashAlgorithm::Sha1, 20),
    (HashAlgorithm::Ripemd160, 20),
    (HashAlgorithm::Sha256, 32),
    (HashAlgorithm::Sha384, 48),
    (HashAlgorithm::Sha512, 64),
    (HashAlgorithm::Sha224, 28),
];

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_ascii_uppercase();
        DIGESTS
            .iter()
            .map(|(alg, _)| *alg)
            .chain([HashAlgorithm::None, HashAlgorithm::Private10])
            .find(|alg| alg.to_string() == wanted)
            .ok_or_else(|| Error::Message {
                message: format!("unknown hash {s}"),
            })
    }
}

impl HashAlgorithm {
    /// Length of the digest, `None` for algorithms that cannot be computed.
    pub fn digest_size(self) -> Option<usize> {
        DIGESTS
            .iter()
            .find(|(alg, _)| *alg == self)
            .map(|(_, size)| *size)
    }

    /// Starts an incremental digest.
    pub fn hasher(self) -> Result<Hasher> {
        let inner: Box<dyn DynDigest> = match self {
            HashAlgorithm::Md5 => Box::new(Md5::new()),
            HashAlgorithm::Sha1 => Box::new(Sha1::new()),
            HashAlgorithm::Ripemd160 => Box::new(Ripemd160::new()),
            HashAlgorithm::Sha256 => Box::new(Sha256::new()),
            HashAlgorithm::Sha384 => Box::new(Sha384::new()),
            HashAlgorithm::Sha512 => Box::new(Sha512::new()),
            HashAlgorithm::Sha224 => Box::new(Sha224::new()),
            _ => unsupported_err!("hash algorithm {}", self),
        };
        Ok(Hasher { alg: self, inner })
    }

    /// One shot digest of `data`.
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = self.hasher()?;
        hasher.update(data);
        Ok(hasher.finish())
    }
}

/// A running digest. Also accepts input through [`io::Write`], so packets can
/// be serialized straight into it.
pub struct Hasher {
    alg: HashAlgorithm,
    inner: Box<dyn DynDigest>,
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Hasher").field(&self.alg).finish()
    }
}

impl Hasher {
    pub fn algorithm(&self) -> HashAlgorithm {
        self.alg
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finish(self) -> Vec<u8> {
        self.inner.finalize().into_vec()
    }
}

impl io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(HashAlgorithm::Sha256.to_string(), "SHA256");
        assert_eq!(HashAlgorithm::Other(42).to_string(), "HASH42");
        assert_eq!("ripemd160".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Ripemd160);
        assert!("whirlpool".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        for (alg, size) in DIGESTS {
            let mut hasher = alg.hasher().unwrap();
            hasher.write_all(b"hello ").unwrap();
            hasher.update(b"world");
            let streamed = hasher.finish();

            assert_eq!(streamed, alg.digest(b"hello world").unwrap(), "{alg}");
            assert_eq!(streamed.len(), size, "{alg}");
        }
    }

    #[test]
    fn test_uncomputable() {
        assert_eq!(HashAlgorithm::from(42), HashAlgorithm::Other(42));
        assert!(HashAlgorithm::Other(42).hasher().is_err());
        assert!(HashAlgorithm::Private10.digest(b"").is_err());
        assert_eq!(HashAlgorithm::None.digest_size(), None);
    }
}
