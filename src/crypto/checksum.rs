use byteorder::{BigEndian, ByteOrder};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use crate::errors::{Error, Result};

/// Two octet checksum: sum of all octets mod 65536.
#[inline]
pub fn calculate_simple(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, v| acc.wrapping_add(u16::from(*v)))
}

/// Validates the two octet checksum in `actual` against `data`.
#[inline]
pub fn simple(actual: &[u8], data: &[u8]) -> Result<()> {
    if actual.len() != 2 || BigEndian::read_u16(actual) != calculate_simple(data) {
        return Err(Error::InvalidPassphrase);
    }

    Ok(())
}

/// SHA1 checksum, 20 octets.
#[inline]
pub fn calculate_sha1(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Sha1::digest(data));
    out
}

/// Validates the SHA1 checksum in `hash` against `data`.
#[inline]
pub fn sha1(hash: &[u8], data: &[u8]) -> Result<()> {
    if !bool::from(hash.ct_eq(&calculate_sha1(data)[..])) {
        return Err(Error::InvalidPassphrase);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_checksum_wraps() {
        let data = vec![0xFFu8; 300];
        // 300 * 255 = 76500 = 0x12AD4
        assert_eq!(calculate_simple(&data), 0x2AD4);
        assert!(simple(&[0x2A, 0xD4], &data).is_ok());
        assert!(simple(&[0x2A, 0xD5], &data).is_err());
    }

    #[test]
    fn test_sha1_checksum() {
        let data = b"secret key material";
        let hash = calculate_sha1(data);
        assert!(sha1(&hash, data).is_ok());
        assert!(sha1(&hash[..19], data).is_err());
        assert!(matches!(sha1(&[0u8; 20], data), Err(Error::InvalidPassphrase)));
    }
}
