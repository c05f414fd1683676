use std::io;

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};
use log::debug;
use zeroize::Zeroizing;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure, unsupported_err, Error, Result};
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{SkeskVersion, StringToKey, Tag};

/// Symmetric-Key Encrypted Session Key Packet, version 4
/// <https://tools.ietf.org/html/rfc4880.html#section-5.3>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct SymKeyEncryptedSessionKey {
    packet_header: PacketHeader,
    sym_algorithm: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    /// Absent when the S2K output is the session key itself.
    #[debug("{:?}", encrypted_key.as_ref().map(hex::encode))]
    encrypted_key: Option<Bytes>,
}

impl SymKeyEncryptedSessionKey {
    /// Parses a `SymKeyEncryptedSessionKey` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut i: B) -> Result<Self> {
        let version = SkeskVersion::from(i.read_u8()?);
        if version != SkeskVersion::V4 {
            unsupported_err!("SKESK {:?}", version);
        }
        let sym_algorithm = SymmetricKeyAlgorithm::from(i.read_u8()?);
        let s2k = StringToKey::from_buf(&mut i)?;
        let rest = i.rest();
        let encrypted_key = if rest.is_empty() { None } else { Some(rest) };

        Ok(SymKeyEncryptedSessionKey {
            packet_header,
            sym_algorithm,
            s2k,
            encrypted_key,
        })
    }

    /// Encrypts `session_key` for `session_alg` under a key derived from `passphrase`.
    pub fn encrypt(
        passphrase: &str,
        session_alg: SymmetricKeyAlgorithm,
        session_key: &[u8],
        s2k: StringToKey,
        sym_algorithm: SymmetricKeyAlgorithm,
    ) -> Result<Self> {
        ensure!(
            session_key.len() == session_alg.key_size(),
            "session key length {} does not match {:?}",
            session_key.len(),
            session_alg
        );
        let key = s2k.derive_key(passphrase.as_bytes(), sym_algorithm.key_size())?;

        let mut data = Zeroizing::new(Vec::with_capacity(session_key.len() + 1));
        data.push(session_alg.into());
        data.extend_from_slice(session_key);

        let iv = vec![0u8; sym_algorithm.block_size()];
        sym_algorithm.encrypt_with_iv_regular(&key, &iv, &mut data)?;

        let encrypted_key = Bytes::copy_from_slice(&data);
        let len = 2 + s2k.write_len() + encrypted_key.len();
        Ok(SymKeyEncryptedSessionKey {
            packet_header: PacketHeader::for_new_packet(Tag::SymKeyEncryptedSessionKey, len)?,
            sym_algorithm,
            s2k,
            encrypted_key: Some(encrypted_key),
        })
    }

    pub fn sym_algorithm(&self) -> SymmetricKeyAlgorithm {
        self.sym_algorithm
    }

    pub fn s2k(&self) -> &StringToKey {
        &self.s2k
    }

    /// Recovers the session key and the algorithm it is meant for.
    ///
    /// A wrong passphrase is only noticed when the algorithm octet comes out
    /// unknown or the key length does not fit it.
    pub fn decrypt_session_key(
        &self,
        passphrase: &str,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)> {
        debug!("decrypting SKESK with {:?}", self.sym_algorithm);
        let key = self
            .s2k
            .derive_key(passphrase.as_bytes(), self.sym_algorithm.key_size())?;

        let Some(encrypted_key) = &self.encrypted_key else {
            return Ok((self.sym_algorithm, key));
        };

        let mut data = Zeroizing::new(encrypted_key.to_vec());
        let iv = vec![0u8; self.sym_algorithm.block_size()];
        self.sym_algorithm
            .decrypt_with_iv_regular(&key, &iv, &mut data)?;

        let session_alg = SymmetricKeyAlgorithm::from(data[0]);
        if session_alg.key_size() == 0 || session_alg.key_size() != data.len() - 1 {
            return Err(Error::InvalidPassphrase);
        }
        Ok((session_alg, Zeroizing::new(data[1..].to_vec())))
    }
}

impl Serialize for SymKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(SkeskVersion::V4.into())?;
        writer.write_u8(self.sym_algorithm.into())?;
        self.s2k.to_writer(writer)?;
        if let Some(key) = &self.encrypted_key {
            writer.write_all(key)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.s2k.write_len() + self.encrypted_key.as_ref().map(|k| k.len()).unwrap_or(0)
    }
}

impl PacketTrait for SymKeyEncryptedSessionKey {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;

    #[test]
    fn test_session_key_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let session_key = SymmetricKeyAlgorithm::AES128.new_session_key(&mut rng);
        let s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha1, 0x60);

        let skesk = SymKeyEncryptedSessionKey::encrypt(
            "hunter2",
            SymmetricKeyAlgorithm::AES128,
            &session_key,
            s2k,
            SymmetricKeyAlgorithm::CAST5,
        )
        .unwrap();

        let bytes = skesk.to_bytes().unwrap();
        let parsed =
            SymKeyEncryptedSessionKey::from_buf(*skesk.packet_header(), &bytes[..]).unwrap();
        assert_eq!(parsed, skesk);

        let (alg, key) = parsed.decrypt_session_key("hunter2").unwrap();
        assert_eq!(alg, SymmetricKeyAlgorithm::AES128);
        assert_eq!(&key[..], &session_key[..]);
    }

    #[test]
    fn test_session_key_from_s2k() {
        let s2k = StringToKey::Simple {
            hash_alg: HashAlgorithm::Md5,
        };
        let body = [&[4u8, 3][..], &s2k.to_bytes().unwrap()].concat();
        let header = PacketHeader::new_fixed(Tag::SymKeyEncryptedSessionKey, body.len() as u32);
        let skesk = SymKeyEncryptedSessionKey::from_buf(header, &body[..]).unwrap();

        let (alg, key) = skesk.decrypt_session_key("secret").unwrap();
        assert_eq!(alg, SymmetricKeyAlgorithm::CAST5);
        assert_eq!(key.len(), 16);
    }
}
