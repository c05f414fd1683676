use std::fmt;

use crate::errors::{ensure_eq, Result};

/// Represents a long (8 byte) Key ID.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, derive_more::Debug)]
#[debug("KeyId({})", hex::encode(_0))]
pub struct KeyId([u8; 8]);

/// The last four bytes of a long key id, as shown by PGP 2.6 era tools.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, derive_more::Debug)]
#[debug("ShortKeyId({})", hex::encode(_0))]
pub struct ShortKeyId([u8; 4]);

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<[u8; 8]> for KeyId {
    fn from(value: [u8; 8]) -> Self {
        KeyId(value)
    }
}

impl KeyId {
    pub fn from_slice(input: &[u8]) -> Result<KeyId> {
        ensure_eq!(input.len(), 8, "invalid input length");
        let mut r = [0u8; 8];
        r.copy_from_slice(input);

        Ok(KeyId(r))
    }

    /// Parses 16 hex digits, with or without a `0x` prefix.
    pub fn from_hex(input: &str) -> Result<KeyId> {
        let input = input.trim_start_matches("0x");
        let raw = hex::decode(input).map_err(|_| crate::errors::Error::InvalidInput)?;
        Self::from_slice(&raw)
    }

    pub fn short(&self) -> ShortKeyId {
        let mut r = [0u8; 4];
        r.copy_from_slice(&self.0[4..]);
        ShortKeyId(r)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl AsRef<[u8]> for ShortKeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Display for ShortKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_display() {
        let id = KeyId::from_hex("0x4c073ae0c8445c0c").unwrap();
        assert_eq!(id.to_string(), "4C073AE0C8445C0C");
        assert_eq!(id.short().to_string(), "C8445C0C");
        assert_eq!(format!("{id:?}"), "KeyId(4c073ae0c8445c0c)");

        assert!(KeyId::from_slice(&[1, 2, 3]).is_err());
        assert!(KeyId::from_hex("zz").is_err());
    }
}
