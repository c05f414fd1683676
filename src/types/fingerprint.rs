use std::fmt;

use crate::errors::{bail, Error, Result};
use crate::types::KeyVersion;

/// Represents a Fingerprint.
#[derive(Clone, Eq, PartialEq, Hash, derive_more::Debug)]
pub enum Fingerprint {
    /// MD5 over the RSA modulus and exponent
    #[debug("{}", hex::encode(_0))]
    V3([u8; 16]),
    /// SHA1 over the framed public key packet
    #[debug("{}", hex::encode(_0))]
    V4([u8; 20]),
}

impl Fingerprint {
    pub fn new(version: KeyVersion, fp: &[u8]) -> Result<Self> {
        let invalid = |_| Error::Message {
            message: format!("invalid fingerprint length {} for {:?}", fp.len(), version),
        };
        let fp = match version {
            KeyVersion::V2 | KeyVersion::V3 => Fingerprint::V3(fp.try_into().map_err(invalid)?),
            KeyVersion::V4 => Fingerprint::V4(fp.try_into().map_err(invalid)?),
            KeyVersion::Other(v) => bail!("Unsupported version {}", v),
        };

        Ok(fp)
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::V3(fp) => &fp[..],
            Self::V4(fp) => &fp[..],
        }
    }
}

/// Groups of four hex digits, the way fingerprints are read out loud.
impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode_upper(self.as_bytes());
        for (i, chunk) in hex.as_bytes().chunks(4).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            // hex output is ascii
            f.write_str(std::str::from_utf8(chunk).map_err(|_| fmt::Error)?)?;
        }
        Ok(())
    }
}
