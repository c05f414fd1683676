use std::io;

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};
use log::debug;
use rand::{CryptoRng, Rng};

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::packet::{Packet, PacketHeader, PacketParser, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// Symmetrically Encrypted Integrity Protected Data Packet, version 1
/// <https://tools.ietf.org/html/rfc4880.html#section-5.13>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct SymEncryptedProtectedData {
    packet_header: PacketHeader,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

impl SymEncryptedProtectedData {
    /// Parses a `SymEncryptedProtectedData` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 1 {
            unsupported_err!("SEIPD version {}", version);
        }
        Ok(SymEncryptedProtectedData {
            packet_header,
            data: i.rest(),
        })
    }

    /// Encrypts the given packets under `key`, appending a modification detection code.
    pub fn encrypt_with_rng<R: CryptoRng + Rng>(
        rng: R,
        alg: SymmetricKeyAlgorithm,
        key: &[u8],
        packets: &[Packet],
    ) -> Result<Self> {
        let plaintext = packets.to_bytes()?;
        let data = Bytes::from(alg.encrypt_protected(rng, key, &plaintext)?);
        debug!("encrypted {} packets into {} bytes", packets.len(), data.len());

        Ok(SymEncryptedProtectedData {
            packet_header: PacketHeader::for_new_packet(
                Tag::SymEncryptedProtectedData,
                1 + data.len(),
            )?,
            data,
        })
    }

    /// Decrypts the container and parses the packets inside.
    ///
    /// Nothing is returned unless both the quick check and the modification
    /// detection code match.
    pub fn decrypt(&self, alg: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Vec<Packet>> {
        let plaintext = alg.decrypt_protected(key, &self.data)?;
        PacketParser::new(Bytes::from(plaintext)).collect()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for SymEncryptedProtectedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(1)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.data.len()
    }
}

impl PacketTrait for SymEncryptedProtectedData {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::packet::LiteralData;

    fn sealed(rng: &mut ChaCha8Rng) -> (Vec<u8>, Vec<Packet>, SymEncryptedProtectedData) {
        let key = SymmetricKeyAlgorithm::AES128.new_session_key(&mut *rng).to_vec();
        let created = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let lit = LiteralData::from_bytes(b"msg", created, Bytes::from_static(b"attack at dawn"))
            .unwrap();
        let packets = vec![Packet::from(lit)];
        let seipd = SymEncryptedProtectedData::encrypt_with_rng(
            &mut *rng,
            SymmetricKeyAlgorithm::AES128,
            &key,
            &packets,
        )
        .unwrap();
        (key, packets, seipd)
    }

    #[test]
    fn test_encrypt_decrypt() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (key, packets, seipd) = sealed(&mut rng);

        let bytes = seipd.to_bytes().unwrap();
        let parsed = SymEncryptedProtectedData::from_buf(*seipd.packet_header(), &bytes[..]).unwrap();
        let decrypted = parsed.decrypt(SymmetricKeyAlgorithm::AES128, &key).unwrap();
        assert_eq!(decrypted, packets);
    }

    #[test]
    fn test_tampering_detected() {
        let _ = pretty_env_logger::try_init();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (key, _, seipd) = sealed(&mut rng);

        for pos in 0..seipd.data.len() {
            let mut data = seipd.data.to_vec();
            data[pos] ^= 0x01;
            let tampered = SymEncryptedProtectedData {
                packet_header: seipd.packet_header,
                data: data.into(),
            };
            let err = tampered
                .decrypt(SymmetricKeyAlgorithm::AES128, &key)
                .unwrap_err();
            assert!(err.is_integrity(), "byte {}: {:?}", pos, err);
        }
    }
}
